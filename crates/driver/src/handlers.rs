//! The `handlers` module evaluates a single watched game for one tick.

use crate::{
    chain::{ChainClient, ChainError},
    state::{GamePhase, GameWatch},
};
use fault_challenger_solvers::fault::{
    ClaimTree, ClockPolicy, FaultError, PreimageOracle, Response, Solver,
};

/// Evaluates `watch` at `tick`: reads the game, submits every response it needs, and resolves it
/// once nothing can be answered anymore.
///
/// Errors never escape a game. Transient chain failures put the game into backoff; everything
/// else is logged and retried on the next tick.
pub async fn handle_game<C, T>(
    chain: &C,
    solver: &Solver<T>,
    clock: ClockPolicy,
    mut watch: GameWatch,
    tick: u64,
) -> GameWatch
where
    C: ChainClient,
    T: PreimageOracle,
{
    if watch.should_skip(tick) {
        tracing::trace!(target: "challenger-handler", "Game {:?} backing off, skipped", watch.address);
        return watch;
    }

    match evaluate(chain, solver, clock, &mut watch).await {
        Ok(()) => watch.reset_backoff(),
        Err(e) if e.is_transient() => {
            tracing::warn!(target: "challenger-handler", "Transient failure in game {:?}: {}", watch.address, e);
            watch.record_failure(tick);
        }
        Err(e) => {
            tracing::error!(target: "challenger-handler", "Error in game {:?}: {}", watch.address, e);
        }
    }
    watch
}

async fn evaluate<C, T>(
    chain: &C,
    solver: &Solver<T>,
    clock: ClockPolicy,
    watch: &mut GameWatch,
) -> Result<(), ChainError>
where
    C: ChainClient,
    T: PreimageOracle,
{
    let address = watch.address;
    watch.status = chain.get_status(address).await?;
    if watch.status.is_resolved() {
        tracing::info!(target: "challenger-handler", "Game {:?} resolved: {:?}", address, watch.status);
        watch.phase = GamePhase::Resolved;
        return Ok(());
    }

    // One read per tick; every decision below uses this snapshot.
    let claims = chain.get_claims(address).await?;
    watch.observe(&claims);
    let tree = ClaimTree::from_claims(solver.max_depth(), claims)
        .map_err(|e| ChainError::Other(e.into()))?;
    let now = chain.timestamp().await?;

    let mut submitted = 0;
    for response in solver
        .actionable(&tree)
        .map_err(|e| ChainError::Other(e.into()))?
    {
        let target = match &response {
            Response::DoNothing => continue,
            Response::Move { parent_index, .. } => *parent_index,
            Response::Step { claim_index, .. } => *claim_index,
        };
        let position = tree
            .claim(target)
            .map_err(|e| ChainError::Other(e.into()))?
            .position;
        if watch.is_expired(position) || clock.is_expired(&tree, target, now) {
            watch.mark_expired(position);
            continue;
        }

        let result = match response {
            Response::Move {
                parent_index,
                kind,
                claim,
            } => chain.submit_move(address, parent_index, kind, claim).await,
            Response::Step {
                claim_index,
                kind,
                state_data,
                proof,
            } => {
                chain
                    .submit_step(address, claim_index, kind, state_data, proof)
                    .await
            }
            Response::DoNothing => continue,
        };

        match result {
            Ok(tx) => {
                tracing::info!(target: "challenger-handler", "Countered claim {} in game {:?}, tx {:?}", target, address, tx.hash);
                submitted += 1;
                watch.moves_submitted += 1;
            }
            Err(ChainError::Rejected(FaultError::InvalidMove(reason))) => {
                tracing::debug!(target: "challenger-handler", "Counter to claim {} already made: {}", target, reason);
            }
            Err(ChainError::Rejected(e @ FaultError::ClockExpired { .. })) => {
                tracing::debug!(target: "challenger-handler", "Claim {} can no longer be countered: {}", target, e);
                watch.mark_expired(position);
            }
            Err(ChainError::Rejected(e)) => {
                tracing::warn!(target: "challenger-handler", "Counter to claim {} in game {:?} rejected: {}", target, address, e);
            }
            Err(ChainError::Reverted(reason)) => {
                tracing::warn!(target: "challenger-handler", "Counter to claim {} in game {:?} reverted: {}", target, address, reason);
            }
            Err(e) => return Err(e),
        }
    }

    if submitted > 0 {
        watch.phase = GamePhase::Responding;
        return Ok(());
    }
    if !clock.is_resolvable(&tree, now) {
        watch.phase = GamePhase::Monitoring;
        return Ok(());
    }

    watch.phase = GamePhase::AwaitingResolution;
    match chain.submit_resolve(address).await {
        Ok(_) => {
            watch.status = chain.get_status(address).await?;
            if watch.status.is_resolved() {
                tracing::info!(target: "challenger-handler", "Resolved game {:?}: {:?}", address, watch.status);
                watch.phase = GamePhase::Resolved;
            }
            Ok(())
        }
        Err(ChainError::Rejected(FaultError::NotResolvable)) => {
            tracing::debug!(target: "challenger-handler", "Game {:?} not resolvable yet", address);
            Ok(())
        }
        Err(ChainError::Rejected(e)) => {
            tracing::warn!(target: "challenger-handler", "Resolution of game {:?} rejected: {}", address, e);
            Ok(())
        }
        Err(ChainError::Reverted(reason)) => {
            tracing::warn!(target: "challenger-handler", "Resolution of game {:?} reverted: {}", address, reason);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
