use async_trait::async_trait;
use ethers::types::{Address, Bytes};
use fault_challenger_driver::{
    ChainClient, ChainError, ChallengerDriver, Driver, DriverConfig, GamePhase, GameRef, GameType,
    MemoryChain, MemoryChainConfig, NoopRecorder, TxOutcome,
};
use fault_challenger_solvers::fault::{
    AlphabetTraceProvider, Claim, ClaimData, FaultError, GameStatus, MoveKind, Position,
    TraceProvider, ROOT_POSITION,
};
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::sync::watch;

const MAX_DEPTH: u64 = 4;
const MAX_CLOCK: Duration = Duration::from_secs(1_000);
const HONEST: &str = "abcdefghijklmnop";
const DISHONEST: &str = "abcdezzzzzzzzzzz";

fn ledger() -> MemoryChain {
    MemoryChain::new(MemoryChainConfig::alphabet(MAX_DEPTH, MAX_CLOCK), 1_000)
}

fn trace(alphabet: &str) -> AlphabetTraceProvider {
    AlphabetTraceProvider::new(alphabet, MAX_DEPTH).unwrap()
}

fn claim_at(alphabet: &str, position: u128) -> Claim {
    trace(alphabet).get(position.trace_index(MAX_DEPTH)).unwrap()
}

fn agent(
    chain: &MemoryChain,
    sender: u8,
    alphabet: &str,
    agree_with_proposed_output: bool,
) -> (ChallengerDriver<MemoryChain>, watch::Sender<bool>) {
    driver(
        chain.with_sender(Address::repeat_byte(sender)),
        alphabet,
        agree_with_proposed_output,
    )
}

fn driver<C: ChainClient>(
    chain: C,
    alphabet: &str,
    agree_with_proposed_output: bool,
) -> (ChallengerDriver<C>, watch::Sender<bool>) {
    let config = DriverConfig {
        poll_interval: Duration::from_secs(1),
        max_concurrency: 4,
        ..DriverConfig::new(GameType::Fault, MAX_DEPTH, MAX_CLOCK, agree_with_proposed_output)
    };
    let (tx, rx) = watch::channel(false);
    let driver = ChallengerDriver::new(
        config,
        chain,
        Arc::new(trace(alphabet)),
        Arc::new(NoopRecorder),
        rx,
    )
    .unwrap();
    (driver, tx)
}

/// A [MemoryChain] that fails the next move submissions with queued errors, and can hang every
/// claim read of one game.
struct Faulty {
    inner: MemoryChain,
    move_errors: Mutex<VecDeque<ChainError>>,
    moves: Mutex<usize>,
    stalled: Option<Address>,
}

impl Faulty {
    fn new(inner: MemoryChain) -> Self {
        Self {
            inner,
            move_errors: Mutex::new(VecDeque::new()),
            moves: Mutex::new(0),
            stalled: None,
        }
    }

    fn failing_next_move(self, error: ChainError) -> Self {
        self.move_errors.lock().push_back(error);
        self
    }

    fn stalling(mut self, game: Address) -> Self {
        self.stalled = Some(game);
        self
    }

    fn moves(&self) -> usize {
        *self.moves.lock()
    }
}

#[async_trait]
impl ChainClient for Faulty {
    async fn fetch_games(&self, from: usize) -> Result<Vec<GameRef>, ChainError> {
        self.inner.fetch_games(from).await
    }

    async fn create_game(
        &self,
        game_type: u8,
        root_claim: Claim,
        extra_data: Bytes,
    ) -> Result<Address, ChainError> {
        self.inner.create_game(game_type, root_claim, extra_data).await
    }

    async fn get_claims(&self, game: Address) -> Result<Vec<ClaimData>, ChainError> {
        if self.stalled == Some(game) {
            std::future::pending::<()>().await;
        }
        self.inner.get_claims(game).await
    }

    async fn submit_move(
        &self,
        game: Address,
        parent_index: usize,
        kind: MoveKind,
        value: Claim,
    ) -> Result<TxOutcome, ChainError> {
        *self.moves.lock() += 1;
        let queued = self.move_errors.lock().pop_front();
        match queued {
            Some(error) => Err(error),
            None => self.inner.submit_move(game, parent_index, kind, value).await,
        }
    }

    async fn submit_step(
        &self,
        game: Address,
        claim_index: usize,
        kind: MoveKind,
        state_data: Bytes,
        proof: Bytes,
    ) -> Result<TxOutcome, ChainError> {
        self.inner
            .submit_step(game, claim_index, kind, state_data, proof)
            .await
    }

    async fn submit_resolve(&self, game: Address) -> Result<TxOutcome, ChainError> {
        self.inner.submit_resolve(game).await
    }

    async fn get_status(&self, game: Address) -> Result<GameStatus, ChainError> {
        self.inner.get_status(game).await
    }

    async fn timestamp(&self) -> Result<u64, ChainError> {
        self.inner.timestamp().await
    }
}

/// Creates a game whose depth-1 claim is ours and has two opposing children, at positions 4 and
/// 6, that both need an answer.
async fn split_game(chain: &MemoryChain) -> Address {
    let game = create(chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let ours = chain.with_sender(Address::repeat_byte(0xC));
    let theirs = chain.with_sender(Address::repeat_byte(0xD));
    let parent = ROOT_POSITION.attack();
    ours.submit_move(game, 0, MoveKind::Attack, claim_at(HONEST, parent))
        .await
        .unwrap();
    theirs
        .submit_move(game, 1, MoveKind::Attack, claim_at(DISHONEST, parent.attack()))
        .await
        .unwrap();
    theirs
        .submit_move(game, 1, MoveKind::Defend, claim_at(DISHONEST, parent.defend()))
        .await
        .unwrap();
    let claims = chain.claims(game).unwrap();
    assert_eq!(claims[2].position, 4);
    assert_eq!(claims[3].position, 6);
    game
}

async fn create(chain: &MemoryChain, root: Claim) -> Address {
    chain
        .with_sender(Address::repeat_byte(0xAA))
        .create_game(GameType::Fault as u8, root, Bytes::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn one_counter_per_claim_per_tick() {
    let chain = ledger();
    let game = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let (mut challenger, _tx) = agent(&chain, 0xC, HONEST, false);

    challenger.tick().await;
    let claims = chain.claims(game).unwrap();
    assert_eq!(claims.len(), 2);
    assert_eq!(claims[1].position, ROOT_POSITION.attack());
    assert_eq!(claims[1].claim, claim_at(HONEST, ROOT_POSITION.attack()));
    let watch = challenger.watch(&game).unwrap();
    assert_eq!(watch.phase, GamePhase::Responding);
    assert_eq!(watch.moves_submitted, 1);

    // Our own claim needs no answer.
    chain.advance_time(10);
    challenger.tick().await;
    assert_eq!(chain.claims(game).unwrap().len(), 2);
    assert_eq!(challenger.watch(&game).unwrap().phase, GamePhase::Monitoring);
}

#[tokio::test]
async fn games_of_other_types_are_ignored() {
    let chain = ledger();
    let other = chain
        .create_game(GameType::Validity as u8, Claim::repeat_byte(1), Bytes::default())
        .await
        .unwrap();
    let game = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let (mut challenger, _tx) = agent(&chain, 0xC, HONEST, false);

    challenger.tick().await;
    assert!(challenger.watch(&other).is_none());
    assert!(challenger.watch(&game).is_some());
    assert_eq!(challenger.report().len(), 1);
}

#[tokio::test]
async fn dishonest_root_is_defeated() {
    let chain = ledger();
    let game = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let (mut challenger, _c) = agent(&chain, 0xC, HONEST, false);
    let (mut defender, _d) = agent(&chain, 0xD, DISHONEST, true);

    for _ in 0..20 {
        chain.advance_time(10);
        challenger.tick().await;
        defender.tick().await;
        if challenger.watch(&game).unwrap().is_resolved() {
            break;
        }
    }

    let claims = chain.claims(game).unwrap();
    let leaf = claims.last().unwrap();
    assert_eq!(leaf.position.depth(), MAX_DEPTH);
    assert!(leaf.countered);
    assert_eq!(chain.get_status(game).await.unwrap(), GameStatus::ChallengerWins);

    defender.tick().await;
    let watch = challenger.watch(&game).unwrap();
    assert_eq!(watch.status, GameStatus::ChallengerWins);
    assert_eq!(defender.watch(&game).unwrap().phase, GamePhase::Resolved);
}

#[tokio::test]
async fn honest_root_stands_after_clock_expiry() {
    let chain = ledger();
    let game = create(&chain, claim_at(HONEST, ROOT_POSITION)).await;
    let (mut challenger, _tx) = agent(&chain, 0xC, HONEST, false);

    challenger.tick().await;
    assert_eq!(chain.claims(game).unwrap().len(), 1);
    assert_eq!(challenger.watch(&game).unwrap().phase, GamePhase::Monitoring);

    chain.advance_time(MAX_CLOCK.as_secs() + 1);
    challenger.tick().await;
    let watch = challenger.watch(&game).unwrap();
    assert_eq!(watch.phase, GamePhase::Resolved);
    assert_eq!(watch.status, GameStatus::DefenderWins);
}

#[tokio::test]
async fn reorg_is_rederived_from_chain() {
    let chain = ledger();
    let game = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let (mut challenger, _tx) = agent(&chain, 0xC, HONEST, false);
    let defender = chain.with_sender(Address::repeat_byte(0xD));
    let counter = ROOT_POSITION.attack().attack();

    challenger.tick().await;
    defender
        .submit_move(game, 1, MoveKind::Attack, claim_at(DISHONEST, counter))
        .await
        .unwrap();
    challenger.tick().await;
    assert_eq!(chain.claims(game).unwrap().len(), 4);

    // The defender's counter and our answer to it are rolled back.
    chain.reorg(game, 2).unwrap();
    challenger.tick().await;
    let watch = challenger.watch(&game).unwrap();
    assert_eq!(watch.reorgs, 1);
    assert_eq!(watch.failures, 0);
    assert_eq!(watch.phase, GamePhase::Monitoring);
    assert_eq!(chain.claims(game).unwrap().len(), 2);

    defender
        .submit_move(game, 1, MoveKind::Attack, claim_at(DISHONEST, counter))
        .await
        .unwrap();
    challenger.tick().await;
    let claims = chain.claims(game).unwrap();
    assert_eq!(claims.len(), 4);
    assert_eq!(claims[3].position, counter.defend());
}

#[tokio::test]
async fn failing_game_backs_off_alone() {
    let chain = ledger();
    let flaky = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let healthy = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let (mut challenger, _tx) = agent(&chain, 0xC, HONEST, false);
    chain.set_unavailable(flaky, true);

    challenger.tick().await;
    assert_eq!(challenger.watch(&flaky).unwrap().failures, 1);
    assert_eq!(chain.claims(healthy).unwrap().len(), 2);

    // Retried on the next tick, then skipped for two.
    challenger.tick().await;
    assert_eq!(challenger.watch(&flaky).unwrap().failures, 2);
    challenger.tick().await;
    assert_eq!(challenger.watch(&flaky).unwrap().failures, 2);

    chain.set_unavailable(flaky, false);
    challenger.tick().await;
    let watch = challenger.watch(&flaky).unwrap();
    assert_eq!(watch.failures, 0);
    assert_eq!(watch.phase, GamePhase::Responding);
    assert_eq!(chain.claims(flaky).unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn loop_stops_on_shutdown() {
    let chain = ledger();
    let game = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let (challenger, tx) = agent(&chain, 0xC, HONEST, false);

    let handle = tokio::spawn(challenger.start_loop());
    tokio::time::sleep(Duration::from_secs(3)).await;
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(chain.claims(game).unwrap().len(), 2);
}

#[tokio::test]
async fn revert_does_not_drop_other_responses() {
    let chain = ledger();
    let game = split_game(&chain).await;
    let faulty = Faulty::new(chain.with_sender(Address::repeat_byte(0xC)))
        .failing_next_move(ChainError::Reverted("0xdeadbeef".to_string()));
    let (mut challenger, _tx) = driver(faulty, HONEST, false);

    challenger.tick().await;
    assert_eq!(challenger.chain().inner().moves(), 2);
    assert_eq!(chain.claims(game).unwrap().len(), 5);
    let watch = challenger.watch(&game).unwrap();
    assert_eq!(watch.moves_submitted, 1);
    assert_eq!(watch.failures, 0);
    assert_eq!(watch.phase, GamePhase::Responding);

    // The reverted response is simply derived again.
    challenger.tick().await;
    assert_eq!(chain.claims(game).unwrap().len(), 6);
}

#[tokio::test]
async fn invalid_move_is_ignored() {
    let chain = ledger();
    let game = split_game(&chain).await;
    let faulty = Faulty::new(chain.with_sender(Address::repeat_byte(0xC))).failing_next_move(
        ChainError::Rejected(FaultError::InvalidMove("ClaimAlreadyExists".to_string())),
    );
    let (mut challenger, _tx) = driver(faulty, HONEST, false);

    challenger.tick().await;
    assert_eq!(challenger.chain().inner().moves(), 2);
    assert_eq!(chain.claims(game).unwrap().len(), 5);
    let watch = challenger.watch(&game).unwrap();
    assert_eq!(watch.moves_submitted, 1);
    assert_eq!(watch.failures, 0);
}

#[tokio::test]
async fn expired_counter_is_not_retried() {
    let chain = ledger();
    let game = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let faulty = Faulty::new(chain.with_sender(Address::repeat_byte(0xC))).failing_next_move(
        ChainError::Rejected(FaultError::ClockExpired {
            used: MAX_CLOCK,
            max: MAX_CLOCK,
        }),
    );
    let (mut challenger, _tx) = driver(faulty, HONEST, false);

    challenger.tick().await;
    assert_eq!(challenger.chain().inner().moves(), 1);
    assert!(challenger.watch(&game).unwrap().is_expired(ROOT_POSITION));

    // The local clock still has time left; only the rejection keeps the root unanswered.
    for _ in 0..3 {
        chain.advance_time(10);
        challenger.tick().await;
    }
    assert_eq!(challenger.chain().inner().moves(), 1);
    assert_eq!(chain.claims(game).unwrap().len(), 1);
    let watch = challenger.watch(&game).unwrap();
    assert_eq!(watch.phase, GamePhase::Monitoring);
    assert_eq!(watch.failures, 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_game_does_not_hold_up_others() {
    let chain = ledger();
    let stuck = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let healthy = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let faulty = Faulty::new(chain.with_sender(Address::repeat_byte(0xC))).stalling(stuck);
    let (mut challenger, _tx) = driver(faulty, HONEST, false);

    challenger.tick().await;
    assert_eq!(chain.claims(healthy).unwrap().len(), 2);
    assert_eq!(challenger.watch(&healthy).unwrap().phase, GamePhase::Responding);
    assert_eq!(chain.claims(stuck).unwrap().len(), 1);
    let watch = challenger.watch(&stuck).unwrap();
    assert_eq!(watch.failures, 1);
    assert_eq!(watch.phase, GamePhase::Discovered);
}

#[tokio::test(start_paused = true)]
async fn loop_outlives_dropped_shutdown_sender() {
    let chain = ledger();
    let game = create(&chain, claim_at(DISHONEST, ROOT_POSITION)).await;
    let (challenger, tx) = agent(&chain, 0xC, HONEST, false);

    let handle = tokio::spawn(challenger.start_loop());
    drop(tx);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!handle.is_finished());
    assert_eq!(chain.claims(game).unwrap().len(), 2);
    handle.abort();
}
