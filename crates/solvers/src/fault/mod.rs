//! Data structures, types, and the game solver implementation for the fault dispute game.

mod position;
pub use position::{compute_gindex, Position, ROOT_POSITION};

mod types;
pub use types::*;

mod error;
pub use error::{FaultError, FaultResult};

mod tree;
pub use tree::ClaimTree;

mod clock;
pub use clock::ClockPolicy;

mod game;
pub use game::FaultDisputeGame;

mod trace;
pub use trace::{PreimageOracle, StepVerifier, TraceProvider};

pub mod alphabet;
pub use alphabet::{AlphabetTraceProvider, AlphabetVm};

mod solver;
pub use solver::Solver;
