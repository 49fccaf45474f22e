//! SessionLab CLI — entry evaluation, position protection and gate bookkeeping.
//!
//! Commands:
//! - `evaluate` — run one tick over the configured assets and sessions
//! - `protect` — close/hold decision for one open position
//! - `record-trade` — count an executed trade against the session gate
//! - `demo` — tick over synthetic candles and print a summary
//! - `config` — print a runner config as TOML

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sessionlab_core::domain::{Position, Session, Side};
use sessionlab_core::StrategyPreset;
use sessionlab_runner::{
    build_feed, load_store, save_store, FeedSource, RunnerConfig, StateLock, TickReport,
    TickRunner,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// How long a run waits for another run to release the state file.
const STATE_LOCK_WAIT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(
    name = "sessionlab",
    about = "SessionLab CLI — session sweep / 2CR signals and position protection"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to a runner TOML config. Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Named strategy preset: classic, conservative, active. Overrides the file's strategy.
    #[arg(long)]
    preset: Option<StrategyPreset>,

    /// State file for foundations and trade counts. Overrides the file's `state_file`.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Use the seeded synthetic feed instead of CSV files.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Directory of `<ASSET>_<tf>.csv` files.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate entries for the configured (asset, session) pairs.
    Evaluate {
        #[command(flatten)]
        common: ConfigArgs,

        /// Restrict to these assets.
        #[arg(long = "asset")]
        assets: Vec<String>,

        /// Restrict to these sessions (ASIA, LONDON, NEW_YORK).
        #[arg(long = "session")]
        sessions: Vec<Session>,

        /// Evaluation time (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Decide whether an open position should be closed early.
    Protect {
        #[command(flatten)]
        common: ConfigArgs,

        #[arg(long)]
        asset: String,

        #[arg(long, value_enum)]
        side: SideArg,

        #[arg(long)]
        entry: f64,

        #[arg(long)]
        stop: f64,

        #[arg(long)]
        target: f64,

        /// Current mark price.
        #[arg(long)]
        mark: f64,

        #[arg(long)]
        at: Option<String>,
    },
    /// Record a confirmed executed trade against the session gate.
    RecordTrade {
        #[command(flatten)]
        common: ConfigArgs,

        #[arg(long)]
        asset: String,

        #[arg(long)]
        session: Session,

        /// Trading date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        date: Option<String>,
    },
    /// Run one tick over synthetic candles and print a readable summary.
    Demo {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long)]
        at: Option<String>,
    },
    /// Print the effective runner config as TOML.
    Config {
        #[command(flatten)]
        common: ConfigArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for Side {
    fn from(s: SideArg) -> Self {
        match s {
            SideArg::Buy => Side::Buy,
            SideArg::Sell => Side::Sell,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            common,
            assets,
            sessions,
            at,
        } => run_evaluate(common, assets, sessions, at),
        Commands::Protect {
            common,
            asset,
            side,
            entry,
            stop,
            target,
            mark,
            at,
        } => {
            let mut position = Position::new(asset, side.into(), entry, stop, target);
            position.update_mark(mark);
            run_protect(common, position, at)
        }
        Commands::RecordTrade {
            common,
            asset,
            session,
            date,
        } => run_record_trade(common, asset, session, date),
        Commands::Demo { seed, at } => run_demo(seed, at),
        Commands::Config { common } => {
            let config = load_config(&common)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(args: &ConfigArgs) -> Result<RunnerConfig> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunnerConfig::default(),
    };
    if let Some(preset) = args.preset {
        config.strategy = preset.to_config();
    }
    if let Some(state) = &args.state {
        config.state_file = Some(state.clone());
    }
    if args.synthetic {
        config.feed.source = FeedSource::Synthetic;
    }
    if let Some(dir) = &args.data_dir {
        config.feed.data_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn parse_at(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --at timestamp '{s}'"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

/// Lock the state file, if any, for the rest of a load → mutate → save run.
fn lock_state(config: &RunnerConfig) -> Result<Option<StateLock>> {
    config
        .state_file
        .as_deref()
        .map(|path| StateLock::acquire(path, STATE_LOCK_WAIT))
        .transpose()
        .context("locking state file")
}

fn open_store(config: &RunnerConfig) -> Result<Arc<sessionlab_core::store::InMemoryStore>> {
    let store = match &config.state_file {
        Some(path) => load_store(path)?,
        None => sessionlab_core::store::InMemoryStore::new(),
    };
    Ok(Arc::new(store))
}

/// Save the store, keeping only records from the day before `day` onwards.
fn persist(
    config: &RunnerConfig,
    store: &sessionlab_core::store::InMemoryStore,
    day: NaiveDate,
) -> Result<()> {
    if let Some(path) = &config.state_file {
        let pruned = store.prune_before(day - chrono::Duration::days(1));
        if pruned > 0 {
            info!(pruned, "dropped stale state records");
        }
        save_store(store, path)?;
    }
    Ok(())
}

fn run_evaluate(
    common: ConfigArgs,
    assets: Vec<String>,
    sessions: Vec<Session>,
    at: Option<String>,
) -> Result<()> {
    let mut config = load_config(&common)?;
    if !assets.is_empty() {
        config.assets = assets;
    }
    if !sessions.is_empty() {
        config.sessions = sessions;
    }
    let now = parse_at(at.as_deref())?;
    let _lock = lock_state(&config)?;
    let store = open_store(&config)?;
    let runner = TickRunner::new(&config, store.clone(), build_feed(&config, now));

    let report = runner.tick(now, 0, &[]);
    persist(&config, &store, now.date_naive())?;
    println!("{}", serde_json::to_string_pretty(&report.entries)?);
    Ok(())
}

fn run_protect(common: ConfigArgs, position: Position, at: Option<String>) -> Result<()> {
    let config = load_config(&common)?;
    let now = parse_at(at.as_deref())?;
    let store = open_store(&config)?;
    let runner = TickRunner::new(&config, store, build_feed(&config, now));

    let report = runner.check_positions(now, 0, &[position]);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_record_trade(
    common: ConfigArgs,
    asset: String,
    session: Session,
    date: Option<String>,
) -> Result<()> {
    let config = load_config(&common)?;
    if config.state_file.is_none() {
        bail!("record-trade needs --state or a config with state_file, otherwise the count is lost");
    }
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(&d, "%Y-%m-%d")
            .with_context(|| format!("invalid --date '{d}'"))?,
        None => Utc::now().date_naive(),
    };
    let _lock = lock_state(&config)?;
    let store = open_store(&config)?;
    let runner = TickRunner::new(&config, store.clone(), build_feed(&config, Utc::now()));
    let count = runner.engine().record_execution(&asset, session, date)?;
    persist(&config, &store, date.min(Utc::now().date_naive()))?;
    info!(%asset, %session, %date, count, "trade recorded");
    println!("{asset} {session} {date}: {count} executed trade(s)");
    Ok(())
}

fn run_demo(seed: u64, at: Option<String>) -> Result<()> {
    let now = parse_at(at.as_deref())?;
    let mut config = RunnerConfig {
        assets: vec!["BTCUSDT".into(), "ETHUSDT".into(), "SOLUSDT".into()],
        ..RunnerConfig::default()
    };
    config.feed.source = FeedSource::Synthetic;
    config.feed.seed = seed;

    let runner = TickRunner::new(
        &config,
        Arc::new(sessionlab_core::store::InMemoryStore::new()),
        build_feed(&config, now),
    );
    let mut position = Position::new("BTCUSDT", Side::Buy, 100.0, 98.0, 106.0);
    position.update_mark(102.4);
    let report = runner.tick(now, 0, &[position]);
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &TickReport) {
    let short_hash = report.config_hash.get(..12).unwrap_or(&report.config_hash);
    println!("Tick at {} (config {short_hash})", report.at);
    println!();
    println!("{:<10} {:<10} {:<9} REASON", "ASSET", "SESSION", "SIGNAL");
    for e in &report.entries {
        println!(
            "{:<10} {:<10} {:<9} {}",
            e.asset,
            e.session,
            e.decision.signal(),
            e.decision.reason()
        );
    }
    if !report.protections.is_empty() {
        println!();
        println!("{:<10} {:<7} {:<6} REASON", "ASSET", "RR", "ACTION");
        for p in &report.protections {
            let rr = p
                .decision
                .current_rr()
                .map_or_else(|| "-".to_string(), |rr| format!("{rr:.2}"));
            let action = if p.decision.should_close() { "CLOSE" } else { "HOLD" };
            println!("{:<10} {:<7} {:<6} {}", p.asset, rr, action, p.decision.reason());
        }
    }
}
