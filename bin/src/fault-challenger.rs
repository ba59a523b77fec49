use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};
use ethers::types::Address;
use fault_challenger_driver::{
    ChallengerDriver, ConfigError, Driver, DriverConfig, GameType, RpcChain, TracingRecorder,
};
use fault_challenger_solvers::fault::AlphabetTraceProvider;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::Level;

/// Arguments for the `fault-challenger` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count, env = "VERBOSITY")]
    v: u8,

    /// The Websocket RPC endpoint used to index and send transactions.
    #[arg(
        long,
        short,
        help = "The Websocket RPC endpoint used to index and send transactions.",
        env = "FAULT_CHALLENGER_WS"
    )]
    ws_endpoint: String,

    /// The private key used for signing transactions.
    #[arg(
        long,
        short,
        help = "The private key used for signing transactions.",
        env = "FAULT_CHALLENGER_KEY"
    )]
    private_key: String,

    /// The address of the dispute game factory contract.
    #[arg(
        long,
        short,
        help = "The address of the dispute game factory contract.",
        env = "FAULT_CHALLENGER_DGF"
    )]
    dispute_game_factory: Address,

    /// The type of game to play.
    #[arg(long, default_value_t = 0, env = "FAULT_CHALLENGER_GAME_TYPE")]
    game_type: u8,

    /// The maximum depth of the games.
    #[arg(long, default_value_t = 4, env = "FAULT_CHALLENGER_MAX_DEPTH")]
    max_depth: u64,

    /// The time budget of each side of a game, in seconds.
    #[arg(long, default_value_t = 3_600, env = "FAULT_CHALLENGER_MAX_CLOCK")]
    max_clock_duration: u64,

    /// Side with the root claim instead of challenging it.
    #[arg(long, env = "FAULT_CHALLENGER_AGREE")]
    agree_with_proposed_output: bool,

    /// The letters of the alphabet trace to play with.
    #[arg(long, short, env = "FAULT_CHALLENGER_ALPHABET")]
    alphabet: Option<String>,

    /// Seconds between polls.
    #[arg(long, default_value_t = 12, env = "FAULT_CHALLENGER_POLL_INTERVAL")]
    poll_interval: u64,

    /// Timeout of every RPC call, in seconds.
    #[arg(long, default_value_t = 10, env = "FAULT_CHALLENGER_CALL_TIMEOUT")]
    call_timeout: u64,

    /// The maximum number of games evaluated at once.
    #[arg(long, default_value_t = 16, env = "FAULT_CHALLENGER_MAX_CONCURRENCY")]
    max_concurrency: usize,

    /// Seconds an in-flight poll may run after shutdown is requested.
    #[arg(long, default_value_t = 5, env = "FAULT_CHALLENGER_SHUTDOWN_GRACE")]
    shutdown_grace: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command arguments
    let Args {
        v,
        ws_endpoint,
        private_key,
        dispute_game_factory,
        game_type,
        max_depth,
        max_clock_duration,
        agree_with_proposed_output,
        alphabet,
        poll_interval,
        call_timeout,
        max_concurrency,
        shutdown_grace,
    } = Args::parse();

    // Initialize the tracing subscriber
    init_tracing_subscriber(v)?;

    // Create and check the driver config before touching the network.
    let game_type = GameType::try_from(game_type)?;
    let config = DriverConfig {
        game_type,
        max_depth,
        max_clock_duration: Duration::from_secs(max_clock_duration),
        agree_with_proposed_output,
        poll_interval: Duration::from_secs(poll_interval),
        call_timeout: Duration::from_secs(call_timeout),
        max_concurrency,
        shutdown_grace: Duration::from_secs(shutdown_grace),
    };
    config.validate()?;
    let alphabet = alphabet.ok_or(ConfigError::MissingTraceProvider(game_type))?;
    let trace = AlphabetTraceProvider::new(&alphabet, max_depth)?;
    tracing::info!(target: "challenger-cli", "Driver config created successfully.");

    tracing::debug!(target: "challenger-cli", "Connecting to websocket endpoint...");
    let chain = RpcChain::connect(
        &ws_endpoint,
        &private_key,
        dispute_game_factory,
        config.max_clock_duration,
    )
    .await?;
    tracing::info!(target: "challenger-cli", "Websocket connected @ {}", ws_endpoint);

    // Request a graceful shutdown on ctrl-c.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(target: "challenger-cli", "Failed to listen for ctrl-c: {}", e);
            // Keep the sender alive so the driver runs on without a shutdown signal.
            std::future::pending::<()>().await;
        }
        tracing::info!(target: "challenger-cli", "Shutdown requested.");
        if shutdown_tx.send(true).is_err() {
            tracing::debug!(target: "challenger-cli", "Driver already stopped.");
        }
    });

    let driver = ChallengerDriver::new(
        config,
        chain,
        Arc::new(trace),
        Arc::new(TracingRecorder),
        shutdown_rx,
    )?;

    // Start the driver loop.
    driver.start_loop().await
}

/// Initializes the tracing subscriber
///
/// # Arguments
/// * `verbosity_level` - The verbosity level (0-4)
///
/// # Returns
/// * `Result<()>` - Ok if successful, Err otherwise.
fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
