//! Stocktake CLI - browse inventory lists and drive inventory checks.
//!
//! # Usage
//!
//! ```bash
//! # Store a bearer token for later sessions
//! stocktake login --token "$TOKEN"
//!
//! # Page through items matching a search
//! stocktake list /items --search bolt --page 2
//!
//! # Count bins holding an item, then submit and complete a check
//! stocktake stock bins --item 10 --warehouse 2
//! stocktake check create --warehouse 2 --item 10 --count 100=7
//! stocktake check complete 42
//!
//! # Resolve the remaining discrepancies
//! stocktake check pending
//! stocktake check resolve 42 --detail 7 --action purchase_order --partner 5
//! ```
//!
//! # Commands
//!
//! - `list` - Filtered, paginated listing of any entity endpoint
//! - `check` - Inventory check workflow
//! - `stock` - Stock lookups
//! - `login` / `logout` - Bearer token management
//!
//! # Environment Variables
//!
//! Client settings are read by [`stocktake_client::ClientConfig::from_env`].
//! In addition:
//!
//! - `SENTRY_DSN` - Enables error reporting when set
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `STOCKTAKE_LOG_JSON` - Emit JSON log lines instead of text
//! - `RUST_LOG` - Log filter (default: `stocktake=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use stocktake_client::{ClientConfig, InventoryClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;
use commands::check::CheckAction;
use commands::list::ListArgs;
use commands::stock::StockAction;

#[derive(Parser)]
#[command(name = "stocktake")]
#[command(author, version, about = "Stocktake inventory tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List an entity endpoint with filters
    List(ListArgs),
    /// Manage inventory checks
    Check {
        #[command(subcommand)]
        action: CheckAction,
    },
    /// Look up stock
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },
    /// Store a bearer token for later sessions
    Login {
        /// Bearer token issued by the backend
        #[arg(short, long, env = "STOCKTAKE_TOKEN")]
        token: String,
    },
    /// Forget the stored bearer token
    Logout,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|s| !s.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SENTRY_ENVIRONMENT")
                .ok()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stocktake=info,stocktake_client=info".into());

    let json = std::env::var_os("STOCKTAKE_LOG_JSON").is_some();
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ClientConfig::from_env()?;
    let client = InventoryClient::connect(config).await?;

    match cli.command {
        Commands::List(args) => commands::list::run(&client, args).await?,
        Commands::Check { action } => commands::check::run(&client, action).await?,
        Commands::Stock { action } => commands::stock::run(&client, action).await?,
        Commands::Login { token } => commands::auth::login(&client, token).await?,
        Commands::Logout => commands::auth::logout(&client).await?,
    }
    Ok(())
}
