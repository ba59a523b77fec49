//! The `config` module contains the [DriverConfig].

use crate::types::GameType;
use std::time::Duration;
use thiserror::Error;

/// The deepest game tree the agent will play. Trace indices must fit in a `u64`.
pub const MAX_SUPPORTED_DEPTH: u64 = 63;

/// Configuration errors. These are only ever raised at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The game type byte is not one the factory knows.
    #[error("unknown game type {0}")]
    UnknownGameType(u8),
    /// The game type exists, but the agent cannot play it.
    #[error("game type {0:?} is not supported by the challenger")]
    UnsupportedGameType(GameType),
    /// No trace was configured for the game type.
    #[error("no trace provider configured for game type {0:?}")]
    MissingTraceProvider(GameType),
    /// The max depth is zero or does not fit a generalized index.
    #[error("max depth must be between 1 and 63, got {0}")]
    InvalidMaxDepth(u64),
    /// The named duration or limit is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// The [DriverConfig] struct contains the configuration for the
/// [ChallengerDriver](crate::ChallengerDriver).
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// The type of game to watch in the dispute game factory.
    pub game_type: GameType,
    /// The maximum depth of the watched games.
    pub max_depth: u64,
    /// The time budget of each side of a watched game.
    pub max_clock_duration: Duration,
    /// Whether the agent sides with the root claim (the proposed output).
    pub agree_with_proposed_output: bool,
    /// How often the watch set is polled.
    pub poll_interval: Duration,
    /// The timeout applied to every chain call.
    pub call_timeout: Duration,
    /// The maximum number of games evaluated concurrently within one tick.
    pub max_concurrency: usize,
    /// How long an in-flight tick may run after shutdown is requested.
    pub shutdown_grace: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            game_type: GameType::Fault,
            max_depth: 4,
            max_clock_duration: Duration::from_secs(3_600),
            agree_with_proposed_output: false,
            poll_interval: Duration::from_secs(12),
            call_timeout: Duration::from_secs(10),
            max_concurrency: 16,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl DriverConfig {
    /// Creates a new [DriverConfig] with the given game parameters and default timings.
    pub fn new(
        game_type: GameType,
        max_depth: u64,
        max_clock_duration: Duration,
        agree_with_proposed_output: bool,
    ) -> Self {
        Self {
            game_type,
            max_depth,
            max_clock_duration,
            agree_with_proposed_output,
            ..Default::default()
        }
    }

    /// Checks the configuration before the agent touches the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game_type != GameType::Fault {
            return Err(ConfigError::UnsupportedGameType(self.game_type));
        }
        if self.max_depth == 0 || self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(ConfigError::InvalidMaxDepth(self.max_depth));
        }
        for (name, duration) in [
            ("max clock duration", self.max_clock_duration),
            ("poll interval", self.poll_interval),
            ("call timeout", self.call_timeout),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Zero("max concurrency"));
        }
        Ok(())
    }
}
