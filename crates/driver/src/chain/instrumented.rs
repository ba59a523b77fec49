use super::{ChainClient, ChainError};
use crate::{
    metrics::{ErrorClass, RpcRecorder},
    types::{GameRef, TxOutcome},
};
use async_trait::async_trait;
use ethers::types::{Address, Bytes};
use fault_challenger_solvers::fault::{Claim, ClaimData, GameStatus, MoveKind};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::Instant;

/// The [InstrumentedChain] wraps a [ChainClient], bounding every call with a timeout and reporting
/// every call to a [RpcRecorder].
pub struct InstrumentedChain<C> {
    inner: C,
    recorder: Arc<dyn RpcRecorder>,
    timeout: Duration,
}

impl<C: ChainClient> InstrumentedChain<C> {
    /// Creates a new [InstrumentedChain].
    pub fn new(inner: C, recorder: Arc<dyn RpcRecorder>, timeout: Duration) -> Self {
        Self {
            inner,
            recorder,
            timeout,
        }
    }

    /// Returns the wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn observe<T, F>(&self, method: &'static str, call: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>> + Send,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Timeout(self.timeout)),
        };
        let class = result.as_ref().map_or_else(ChainError::class, |_| ErrorClass::None);
        self.recorder.record_request(method, start.elapsed(), class);
        result
    }
}

#[async_trait]
impl<C: ChainClient> ChainClient for InstrumentedChain<C> {
    async fn fetch_games(&self, from: usize) -> Result<Vec<GameRef>, ChainError> {
        self.observe("fetch_games", self.inner.fetch_games(from)).await
    }

    async fn create_game(
        &self,
        game_type: u8,
        root_claim: Claim,
        extra_data: Bytes,
    ) -> Result<Address, ChainError> {
        self.observe(
            "create_game",
            self.inner.create_game(game_type, root_claim, extra_data),
        )
        .await
    }

    async fn get_claims(&self, game: Address) -> Result<Vec<ClaimData>, ChainError> {
        self.observe("get_claims", self.inner.get_claims(game)).await
    }

    async fn submit_move(
        &self,
        game: Address,
        parent_index: usize,
        kind: MoveKind,
        value: Claim,
    ) -> Result<TxOutcome, ChainError> {
        self.observe(
            "submit_move",
            self.inner.submit_move(game, parent_index, kind, value),
        )
        .await
    }

    async fn submit_step(
        &self,
        game: Address,
        claim_index: usize,
        kind: MoveKind,
        state_data: Bytes,
        proof: Bytes,
    ) -> Result<TxOutcome, ChainError> {
        self.observe(
            "submit_step",
            self.inner
                .submit_step(game, claim_index, kind, state_data, proof),
        )
        .await
    }

    async fn submit_resolve(&self, game: Address) -> Result<TxOutcome, ChainError> {
        self.observe("submit_resolve", self.inner.submit_resolve(game))
            .await
    }

    async fn get_status(&self, game: Address) -> Result<GameStatus, ChainError> {
        self.observe("get_status", self.inner.get_status(game)).await
    }

    async fn timestamp(&self) -> Result<u64, ChainError> {
        self.observe("timestamp", self.inner.timestamp()).await
    }
}
