//! The `drivers` module contains implementations of the [Driver] trait.

use crate::{
    chain::{ChainClient, InstrumentedChain},
    config::{ConfigError, DriverConfig},
    handlers,
    metrics::RpcRecorder,
    state::{GameReport, GameWatch},
    Driver,
};
use anyhow::Result;
use async_trait::async_trait;
use ethers::types::Address;
use fault_challenger_solvers::fault::{ClockPolicy, PreimageOracle, Solver};
use futures::StreamExt;
use std::{collections::BTreeMap, sync::Arc};
use tokio::{sync::watch, time::MissedTickBehavior};

/// The [ChallengerDriver] polls the dispute game factory for games of the configured type and
/// plays every one of them until it resolves.
pub struct ChallengerDriver<C> {
    /// The configuration of the driver.
    pub config: Arc<DriverConfig>,
    chain: InstrumentedChain<C>,
    solver: Solver<Arc<dyn PreimageOracle>>,
    /// Every admitted game, keyed by address.
    watches: BTreeMap<Address, GameWatch>,
    /// Index of the next factory entry to read.
    cursor: usize,
    tick: u64,
    shutdown: watch::Receiver<bool>,
}

impl<C: ChainClient> ChallengerDriver<C> {
    /// Creates a new [ChallengerDriver]. The configuration is validated before anything else.
    pub fn new(
        config: DriverConfig,
        chain: C,
        trace: Arc<dyn PreimageOracle>,
        recorder: Arc<dyn RpcRecorder>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let solver = Solver::new(trace, config.max_depth, config.agree_with_proposed_output);
        Ok(Self {
            chain: InstrumentedChain::new(chain, recorder, config.call_timeout),
            config: Arc::new(config),
            solver,
            watches: BTreeMap::new(),
            cursor: 0,
            tick: 0,
            shutdown,
        })
    }

    /// Returns the instrumented chain client.
    pub fn chain(&self) -> &InstrumentedChain<C> {
        &self.chain
    }

    /// Returns the watch state of the game at `address`, if it was admitted.
    pub fn watch(&self, address: &Address) -> Option<&GameWatch> {
        self.watches.get(address)
    }

    /// Returns a summary of every admitted game.
    pub fn report(&self) -> Vec<GameReport> {
        self.watches.values().map(GameWatch::report).collect()
    }

    /// Admits the factory entries recorded since the last discovery.
    async fn discover(&mut self) {
        let games = match self.chain.fetch_games(self.cursor).await {
            Ok(games) => games,
            Err(e) => {
                tracing::warn!(target: "challenger-driver", "Game discovery failed: {}", e);
                return;
            }
        };

        for game in games {
            self.cursor += 1;
            if game.game_type != self.config.game_type as u8 {
                tracing::debug!(target: "challenger-driver", "Skipping game {:?} of type {}", game.address, game.game_type);
                continue;
            }
            tracing::info!(target: "challenger-driver", "Discovered game {:?}", game.address);
            self.watches
                .entry(game.address)
                .or_insert_with(|| GameWatch::new(game.address, game.created_at));
        }
    }

    /// Runs a single poll: discovery, then every unresolved game evaluated concurrently.
    pub async fn tick(&mut self) {
        self.tick += 1;
        self.discover().await;

        let active: Vec<GameWatch> = self
            .watches
            .values()
            .filter(|watch| !watch.is_resolved())
            .cloned()
            .collect();
        tracing::debug!(target: "challenger-driver", "Tick {}: evaluating {} games", self.tick, active.len());

        let (chain, solver, tick) = (&self.chain, &self.solver, self.tick);
        let clock = ClockPolicy::new(self.config.max_clock_duration);
        let updated: Vec<GameWatch> = futures::stream::iter(active)
            .map(|watch| handlers::handle_game(chain, solver, clock, watch, tick))
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        for watch in updated {
            self.watches.insert(watch.address, watch);
        }
    }
}

#[async_trait]
impl<C: ChainClient + 'static> Driver for ChallengerDriver<C> {
    async fn start_loop(mut self) -> Result<()> {
        tracing::info!(target: "challenger-driver", "Starting challenger driver, polling every {:?}", self.config.poll_interval);
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();
        let grace = self.config.shutdown_grace;

        loop {
            let stopped = *shutdown.borrow();
            if stopped {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {}
                Ok(()) = shutdown.changed() => break,
            }

            let mut stop = shutdown.clone();
            let tick = self.tick();
            tokio::pin!(tick);
            tokio::select! {
                _ = &mut tick => {}
                Ok(()) = stop.changed() => {
                    tracing::info!(target: "challenger-driver", "Shutdown requested, finishing tick within {:?}", grace);
                    if tokio::time::timeout(grace, &mut tick).await.is_err() {
                        tracing::warn!(target: "challenger-driver", "Tick abandoned after grace period");
                    }
                    break;
                }
            }
        }

        let report = serde_json::to_string(&self.report())?;
        tracing::info!(target: "challenger-driver", "Challenger driver stopped. Games: {}", report);
        Ok(())
    }
}
