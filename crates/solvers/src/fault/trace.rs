//! Traits for the sources of trace commitments and the one-step VM.

use super::{Claim, FaultResult};
use ethers::types::Bytes;
use std::sync::Arc;

/// The [TraceProvider] trait is the participant's view of the execution trace.
///
/// Answers must be deterministic: the solver asks for the same index many times over the life of a
/// game and relies on getting the same commitment back.
pub trait TraceProvider: Send + Sync {
    /// Returns the commitment to the state at `trace_index`.
    fn get(&self, trace_index: u64) -> FaultResult<Claim>;
}

/// A [TraceProvider] that can also reveal the states behind its commitments, which is required to
/// counter leaf claims with a one-step proof.
pub trait PreimageOracle: TraceProvider {
    /// Returns the preimage of the commitment at `trace_index`.
    fn preimage(&self, trace_index: u64) -> FaultResult<Bytes>;

    /// Returns the preimage of the absolute pre-state, the state before trace index 0.
    fn absolute_prestate(&self) -> Bytes;
}

/// The [StepVerifier] trait is the boundary to the one-step VM that adjudicates a single step.
pub trait StepVerifier: Send + Sync {
    /// Executes one step from `state_data` and returns the commitment to the post-state.
    fn step(&self, state_data: &[u8], proof: &[u8]) -> FaultResult<Claim>;
}

impl<T: TraceProvider + ?Sized> TraceProvider for Arc<T> {
    fn get(&self, trace_index: u64) -> FaultResult<Claim> {
        (**self).get(trace_index)
    }
}

impl<T: PreimageOracle + ?Sized> PreimageOracle for Arc<T> {
    fn preimage(&self, trace_index: u64) -> FaultResult<Bytes> {
        (**self).preimage(trace_index)
    }

    fn absolute_prestate(&self) -> Bytes {
        (**self).absolute_prestate()
    }
}

impl<T: StepVerifier + ?Sized> StepVerifier for Arc<T> {
    fn step(&self, state_data: &[u8], proof: &[u8]) -> FaultResult<Claim> {
        (**self).step(state_data, proof)
    }
}
