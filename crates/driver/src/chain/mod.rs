//! The `chain` module defines the boundary between the agent and the chain hosting the games.

use crate::{
    metrics::ErrorClass,
    types::{GameRef, TxOutcome},
};
use async_trait::async_trait;
use ethers::types::{Address, Bytes};
use fault_challenger_solvers::fault::{Claim, ClaimData, FaultError, GameStatus, MoveKind};
use std::time::Duration;
use thiserror::Error;

mod instrumented;
pub use instrumented::InstrumentedChain;

mod memory;
pub use memory::{MemoryChain, MemoryChainConfig};

mod rpc;
pub use rpc::{RpcChain, SignerMiddlewareWS};

/// Errors returned by a [ChainClient].
#[derive(Debug, Error)]
pub enum ChainError {
    /// The game rejected the call.
    #[error("rejected by game: {0}")]
    Rejected(#[from] FaultError),
    /// The contract reverted; the revert reason could not be decoded into a [FaultError].
    #[error("transaction reverted: {0}")]
    Reverted(String),
    /// The request did not reach the chain, or no answer came back.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The call did not complete within the configured timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    /// The game or data requested does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChainError {
    /// Buckets the error into the recorder taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            ChainError::Rejected(_) | ChainError::Reverted(_) => ErrorClass::Protocol,
            ChainError::Transport(_) | ChainError::Timeout(_) => ErrorClass::Transport,
            ChainError::NotFound(_) => ErrorClass::NotFound,
            ChainError::Other(_) => ErrorClass::Unclassified,
        }
    }

    /// Returns true if retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChainError::Transport(_) | ChainError::Timeout(_) | ChainError::Other(_)
        )
    }
}

/// The [ChainClient] trait is everything the agent needs from the chain: factory discovery, game
/// reads and game transactions. Every call is network I/O and may fail transiently.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Returns the games recorded by the factory at index `from` and later, in factory order.
    async fn fetch_games(&self, from: usize) -> Result<Vec<GameRef>, ChainError>;

    /// Creates a new game through the factory and returns its address.
    async fn create_game(
        &self,
        game_type: u8,
        root_claim: Claim,
        extra_data: Bytes,
    ) -> Result<Address, ChainError>;

    /// Reads the full claim list of `game` in a single snapshot.
    async fn get_claims(&self, game: Address) -> Result<Vec<ClaimData>, ChainError>;

    /// Submits an attack or defense against the claim at `parent_index`.
    async fn submit_move(
        &self,
        game: Address,
        parent_index: usize,
        kind: MoveKind,
        value: Claim,
    ) -> Result<TxOutcome, ChainError>;

    /// Submits a one-step proof against the leaf claim at `claim_index`.
    async fn submit_step(
        &self,
        game: Address,
        claim_index: usize,
        kind: MoveKind,
        state_data: Bytes,
        proof: Bytes,
    ) -> Result<TxOutcome, ChainError>;

    /// Submits the resolution of `game`.
    async fn submit_resolve(&self, game: Address) -> Result<TxOutcome, ChainError>;

    /// Reads the status of `game`.
    async fn get_status(&self, game: Address) -> Result<GameStatus, ChainError>;

    /// Returns the timestamp of the latest block.
    async fn timestamp(&self) -> Result<u64, ChainError>;
}
