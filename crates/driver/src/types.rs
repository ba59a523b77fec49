use crate::config::ConfigError;
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};

/// The [GameType] enum defines the different types of dispute games with cloneable
/// implementations in the dispute game factory contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameType {
    /// An interactive bisection game settled by a one-step proof.
    Fault = 0,
    /// A game settled by a validity proof.
    Validity = 1,
    /// A game settled by signatures of a trusted attestor set.
    OutputAttestation = 2,
}

impl TryFrom<u8> for GameType {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameType::Fault),
            1 => Ok(GameType::Validity),
            2 => Ok(GameType::OutputAttestation),
            _ => Err(ConfigError::UnknownGameType(value)),
        }
    }
}

/// A game proxy recorded by the dispute game factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRef {
    /// The raw game type. Unknown types are kept so the factory cursor can skip over them.
    pub game_type: u8,
    /// The block timestamp the game was created at.
    pub created_at: u64,
    /// The address of the game proxy.
    pub address: Address,
}

/// The outcome of a transaction accepted by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    /// The transaction hash.
    pub hash: H256,
}
