use super::{ChainClient, ChainError};
use crate::{
    bindings::{DisputeGameFactory, FaultDisputeGame},
    types::{GameRef, TxOutcome},
};
use anyhow::Result;
use async_trait::async_trait;
use ethers::{
    abi::Detokenize,
    contract::{ContractCall, ContractError},
    middleware::SignerMiddleware,
    providers::{Middleware, Provider, Ws},
    signers::{LocalWallet, Signer},
    types::{Address, BlockNumber, Bytes, U256, U64},
    utils::id,
};
use fault_challenger_solvers::fault::{
    Claim, ClaimData, Clock, FaultError, GameStatus, MoveKind,
};
use std::{sync::Arc, time::Duration};

/// The middleware used to sign and send transactions over a websocket provider.
pub type SignerMiddlewareWS = SignerMiddleware<Provider<Ws>, LocalWallet>;

/// Parent index the contract stores for the root claim.
const NO_PARENT: u32 = u32::MAX;

/// Custom errors of the game contract the agent reacts to.
const GAME_ERRORS: [&str; 10] = [
    "ClaimAlreadyExists()",
    "InvalidParent()",
    "CannotDefendRootClaim()",
    "GameDepthExceeded()",
    "ClockTimeExceeded()",
    "ClockNotExpired()",
    "OutOfOrderResolution()",
    "GameNotInProgress()",
    "ValidStep()",
    "InvalidPrestate()",
];

/// The [RpcChain] talks to the dispute game factory and its games over a websocket RPC endpoint.
#[derive(Clone)]
pub struct RpcChain {
    client: Arc<SignerMiddlewareWS>,
    factory: DisputeGameFactory<SignerMiddlewareWS>,
    max_clock_duration: Duration,
}

impl RpcChain {
    /// Connects to `ws_endpoint` and signs transactions with `private_key`. Games are expected to
    /// run with `max_clock_duration` per side.
    pub async fn connect(
        ws_endpoint: &str,
        private_key: &str,
        factory: Address,
        max_clock_duration: Duration,
    ) -> Result<Self> {
        let provider = Provider::<Ws>::connect(ws_endpoint).await?;
        let chain_id = provider.get_chainid().await?;
        let wallet = private_key
            .parse::<LocalWallet>()?
            .with_chain_id(chain_id.as_u64());
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        tracing::info!(target: "rpc-chain", "Connected to chain {} as {:?}", chain_id, client.address());
        Ok(Self {
            factory: DisputeGameFactory::new(factory, Arc::clone(&client)),
            client,
            max_clock_duration,
        })
    }

    fn game(&self, address: Address) -> FaultDisputeGame<SignerMiddlewareWS> {
        FaultDisputeGame::new(address, Arc::clone(&self.client))
    }
}

/// Maps the revert data of a game call onto a [FaultError], if it carries one of the game's custom
/// errors. The contract does not report the time used, so an exceeded clock reports `max`.
fn decode_revert(data: &[u8], max: Duration) -> Option<FaultError> {
    let selector = data.get(..4)?;
    let name = GAME_ERRORS
        .iter()
        .find(|signature| id(signature)[..] == *selector)?;
    let error = match *name {
        "ClockTimeExceeded()" => FaultError::ClockExpired { used: max, max },
        "ClockNotExpired()" | "OutOfOrderResolution()" => FaultError::NotResolvable,
        "GameNotInProgress()" => FaultError::GameNotInProgress,
        "ValidStep()" => FaultError::ValidStep,
        "InvalidPrestate()" => FaultError::InvalidPrestate,
        other => FaultError::InvalidMove(other.trim_end_matches("()").to_string()),
    };
    Some(error)
}

/// Buckets a contract call failure into a [ChainError]. Reverts with a known game error become
/// [ChainError::Rejected].
fn classify<M: Middleware>(err: ContractError<M>, max_clock_duration: Duration) -> ChainError {
    if let Some(data) = err.as_revert() {
        return match decode_revert(data, max_clock_duration) {
            Some(e) => ChainError::Rejected(e),
            None => ChainError::Reverted(data.to_string()),
        };
    }
    match err {
        ContractError::MiddlewareError { .. } | ContractError::ProviderError { .. } => {
            ChainError::Transport(err.to_string())
        }
        ContractError::ContractNotDeployed => ChainError::NotFound(err.to_string()),
        err => ChainError::Other(anyhow::anyhow!(err.to_string())),
    }
}

/// Sends `call` and waits for its receipt.
async fn send<D: Detokenize + Send + Sync>(
    call: ContractCall<SignerMiddlewareWS, D>,
    max_clock_duration: Duration,
) -> Result<TxOutcome, ChainError> {
    let pending = call
        .send()
        .await
        .map_err(|e| classify(e, max_clock_duration))?;
    let hash = pending.tx_hash();
    tracing::debug!(target: "rpc-chain", "Transaction {:?} sent, awaiting receipt", hash);
    match pending.await {
        Ok(Some(receipt)) if receipt.status == Some(U64::one()) => Ok(TxOutcome { hash }),
        Ok(Some(_)) => Err(ChainError::Reverted(format!("transaction {hash:?} reverted"))),
        Ok(None) => Err(ChainError::Transport(format!("transaction {hash:?} was dropped"))),
        Err(e) => Err(ChainError::Transport(e.to_string())),
    }
}

#[async_trait]
impl ChainClient for RpcChain {
    async fn fetch_games(&self, from: usize) -> Result<Vec<GameRef>, ChainError> {
        let count = self
            .factory
            .game_count()
            .call()
            .await
            .map_err(|e| classify(e, self.max_clock_duration))?;
        let mut games = Vec::new();
        for index in from..count.as_usize() {
            let (game_type, created_at, address) = self
                .factory
                .game_at_index(U256::from(index))
                .call()
                .await
                .map_err(|e| classify(e, self.max_clock_duration))?;
            games.push(GameRef {
                game_type,
                created_at,
                address,
            });
        }
        Ok(games)
    }

    async fn create_game(
        &self,
        game_type: u8,
        root_claim: Claim,
        extra_data: Bytes,
    ) -> Result<Address, ChainError> {
        let call = self.factory.create(game_type, root_claim.0, extra_data);
        // The proxy address is only returned to callers, so simulate first.
        let address = call
            .call()
            .await
            .map_err(|e| classify(e, self.max_clock_duration))?;
        send(call, self.max_clock_duration).await?;
        tracing::info!(target: "rpc-chain", "Created game {:?} of type {}", address, game_type);
        Ok(address)
    }

    async fn get_claims(&self, game: Address) -> Result<Vec<ClaimData>, ChainError> {
        let contract = self.game(game);
        // Pin every read to one block so the list is a consistent snapshot.
        let block = self
            .client
            .get_block_number()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        let len = contract
            .claim_data_len()
            .block(block)
            .call()
            .await
            .map_err(|e| classify(e, self.max_clock_duration))?;

        let mut claims = Vec::with_capacity(len.as_usize());
        for index in 0..len.as_usize() {
            let (parent_index, countered, claim, position, clock) = contract
                .claim_data(U256::from(index))
                .block(block)
                .call()
                .await
                .map_err(|e| classify(e, self.max_clock_duration))?;
            claims.push(ClaimData {
                parent_index: (parent_index != NO_PARENT).then_some(parent_index as usize),
                countered,
                claim: Claim::from(claim),
                position,
                // Claim data does not carry the claimant.
                claimant: Address::zero(),
                clock: Clock::from_packed(clock),
            });
        }
        Ok(claims)
    }

    async fn submit_move(
        &self,
        game: Address,
        parent_index: usize,
        kind: MoveKind,
        value: Claim,
    ) -> Result<TxOutcome, ChainError> {
        let contract = self.game(game);
        let parent = U256::from(parent_index);
        let call = match kind {
            MoveKind::Attack => contract.attack(parent, value.0),
            MoveKind::Defend => contract.defend(parent, value.0),
        };
        send(call, self.max_clock_duration).await
    }

    async fn submit_step(
        &self,
        game: Address,
        claim_index: usize,
        kind: MoveKind,
        state_data: Bytes,
        proof: Bytes,
    ) -> Result<TxOutcome, ChainError> {
        let call = self.game(game).step(
            U256::from(claim_index),
            kind.is_attack(),
            state_data,
            proof,
        );
        send(call, self.max_clock_duration).await
    }

    async fn submit_resolve(&self, game: Address) -> Result<TxOutcome, ChainError> {
        send(self.game(game).resolve(), self.max_clock_duration).await
    }

    async fn get_status(&self, game: Address) -> Result<GameStatus, ChainError> {
        let status = self
            .game(game)
            .status()
            .call()
            .await
            .map_err(|e| classify(e, self.max_clock_duration))?;
        GameStatus::try_from(status).map_err(|e| ChainError::Other(e.into()))
    }

    async fn timestamp(&self) -> Result<u64, ChainError> {
        let block = self
            .client
            .get_block(BlockNumber::Latest)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?
            .ok_or_else(|| ChainError::NotFound("latest block".to_string()))?;
        Ok(block.timestamp.as_u64())
    }
}
