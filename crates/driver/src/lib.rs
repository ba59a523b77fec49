//! The driver crate runs the fault challenger agent: it discovers dispute games through the
//! factory, keeps a watch on each of them and submits the moves, steps and resolutions the
//! solver decides on.

use anyhow::Result;
use async_trait::async_trait;

/// Contains the smart contract bindings used by the [RpcChain].
mod bindings;

mod chain;
pub use chain::{
    ChainClient, ChainError, InstrumentedChain, MemoryChain, MemoryChainConfig, RpcChain,
    SignerMiddlewareWS,
};

mod config;
pub use config::{ConfigError, DriverConfig, MAX_SUPPORTED_DEPTH};

mod drivers;
pub use drivers::ChallengerDriver;

mod handlers;
pub use handlers::handle_game;

mod metrics;
pub use metrics::{ErrorClass, NoopRecorder, RpcRecorder, TracingRecorder};

mod state;
pub use state::{GamePhase, GameReport, GameWatch, MAX_BACKOFF_TICKS};

mod types;
pub use types::{GameRef, GameType, TxOutcome};

/// The [Driver] trait defines the interface for all driver loops that are ran by the
/// `fault-challenger` binary.
#[async_trait]
pub trait Driver {
    /// Runs the driver until shutdown is requested.
    async fn start_loop(self) -> Result<()>;
}
