use super::{ChainClient, ChainError};
use crate::types::{GameRef, GameType, TxOutcome};
use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};
use fault_challenger_solvers::fault::{
    alphabet::{absolute_prestate_claim, AlphabetVm},
    Claim, ClaimData, FaultDisputeGame, GameStatus, MoveKind, StepVerifier,
};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

/// Parameters shared by every game created on a [MemoryChain].
#[derive(Clone)]
pub struct MemoryChainConfig {
    /// The maximum depth of every game.
    pub max_depth: u64,
    /// The time budget of each side.
    pub max_clock_duration: Duration,
    /// The commitment to the state before the first instruction.
    pub absolute_prestate: Claim,
    /// The one-step VM that adjudicates steps.
    pub vm: Arc<dyn StepVerifier>,
}

impl MemoryChainConfig {
    /// Returns a config for alphabet games.
    pub fn alphabet(max_depth: u64, max_clock_duration: Duration) -> Self {
        Self {
            max_depth,
            max_clock_duration,
            absolute_prestate: absolute_prestate_claim(),
            vm: Arc::new(AlphabetVm),
        }
    }
}

struct Ledger {
    config: MemoryChainConfig,
    now: u64,
    nonce: u64,
    games: Vec<GameRef>,
    instances: HashMap<Address, FaultDisputeGame>,
    unavailable: HashSet<Address>,
}

impl Ledger {
    fn tx(&mut self) -> TxOutcome {
        self.nonce += 1;
        TxOutcome {
            hash: H256::from_low_u64_be(self.nonce),
        }
    }

    fn game(&mut self, address: Address) -> Result<&mut FaultDisputeGame, ChainError> {
        if self.unavailable.contains(&address) {
            return Err(ChainError::Transport(format!("game {address:?} is unreachable")));
        }
        self.instances
            .get_mut(&address)
            .ok_or_else(|| ChainError::NotFound(format!("no game at {address:?}")))
    }
}

/// The [MemoryChain] is an in-process ledger of fault dispute games with a controllable block
/// clock. Clones share the ledger; each clone may send from its own address.
#[derive(Clone)]
pub struct MemoryChain {
    inner: Arc<Mutex<Ledger>>,
    sender: Address,
}

impl MemoryChain {
    /// Creates an empty ledger whose block clock starts at `genesis`.
    pub fn new(config: MemoryChainConfig, genesis: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Ledger {
                config,
                now: genesis,
                nonce: 0,
                games: Vec::new(),
                instances: HashMap::new(),
                unavailable: HashSet::new(),
            })),
            sender: Address::zero(),
        }
    }

    /// Returns a handle to the same ledger that sends transactions from `sender`.
    pub fn with_sender(&self, sender: Address) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            sender,
        }
    }

    /// Returns the address transactions are sent from.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Returns the current block time.
    pub fn now(&self) -> u64 {
        self.inner.lock().now
    }

    /// Moves the block clock forward by `secs`.
    pub fn advance_time(&self, secs: u64) {
        self.inner.lock().now += secs;
    }

    /// Sets the block clock.
    pub fn set_time(&self, now: u64) {
        self.inner.lock().now = now;
    }

    /// Rolls `game` back to its first `keep` claims.
    pub fn reorg(&self, game: Address, keep: usize) -> Result<(), ChainError> {
        let mut ledger = self.inner.lock();
        ledger.game(game)?.truncate(keep);
        tracing::debug!(target: "memory-chain", "Reorged game {:?} to {} claims", game, keep);
        Ok(())
    }

    /// Makes every call touching `game` fail with a transport error while `unavailable` is set.
    pub fn set_unavailable(&self, game: Address, unavailable: bool) {
        let mut ledger = self.inner.lock();
        if unavailable {
            ledger.unavailable.insert(game);
        } else {
            ledger.unavailable.remove(&game);
        }
    }

    /// Returns a copy of the claims of `game`.
    pub fn claims(&self, game: Address) -> Result<Vec<ClaimData>, ChainError> {
        let mut ledger = self.inner.lock();
        Ok(ledger.game(game)?.claims().to_vec())
    }
}

#[async_trait]
impl ChainClient for MemoryChain {
    async fn fetch_games(&self, from: usize) -> Result<Vec<GameRef>, ChainError> {
        let ledger = self.inner.lock();
        Ok(ledger.games.iter().skip(from).copied().collect())
    }

    async fn create_game(
        &self,
        game_type: u8,
        root_claim: Claim,
        _extra_data: Bytes,
    ) -> Result<Address, ChainError> {
        let mut ledger = self.inner.lock();
        let address = Address::from_low_u64_be(ledger.games.len() as u64 + 1);
        let created_at = ledger.now;
        ledger.games.push(GameRef {
            game_type,
            created_at,
            address,
        });
        // Only fault games have an implementation; other types are recorded for discovery only.
        if game_type == GameType::Fault as u8 {
            let config = &ledger.config;
            let game = FaultDisputeGame::new(
                address,
                root_claim,
                self.sender,
                config.max_depth,
                config.max_clock_duration,
                config.absolute_prestate,
                created_at,
            );
            ledger.instances.insert(address, game);
        }
        ledger.tx();
        Ok(address)
    }

    async fn get_claims(&self, game: Address) -> Result<Vec<ClaimData>, ChainError> {
        self.claims(game)
    }

    async fn submit_move(
        &self,
        game: Address,
        parent_index: usize,
        kind: MoveKind,
        value: Claim,
    ) -> Result<TxOutcome, ChainError> {
        let mut ledger = self.inner.lock();
        let now = ledger.now;
        ledger
            .game(game)?
            .make_move(parent_index, kind, value, self.sender, now)?;
        Ok(ledger.tx())
    }

    async fn submit_step(
        &self,
        game: Address,
        claim_index: usize,
        kind: MoveKind,
        state_data: Bytes,
        proof: Bytes,
    ) -> Result<TxOutcome, ChainError> {
        let mut ledger = self.inner.lock();
        let now = ledger.now;
        let vm = Arc::clone(&ledger.config.vm);
        ledger
            .game(game)?
            .step(claim_index, kind, &state_data, &proof, vm.as_ref(), now)?;
        Ok(ledger.tx())
    }

    async fn submit_resolve(&self, game: Address) -> Result<TxOutcome, ChainError> {
        let mut ledger = self.inner.lock();
        let now = ledger.now;
        ledger.game(game)?.resolve(now)?;
        Ok(ledger.tx())
    }

    async fn get_status(&self, game: Address) -> Result<GameStatus, ChainError> {
        let mut ledger = self.inner.lock();
        Ok(ledger.game(game)?.status())
    }

    async fn timestamp(&self) -> Result<u64, ChainError> {
        Ok(self.now())
    }
}
