use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use quotefeed::core::log::init_logging;
use quotefeed::core::quote::{ProviderKind, SourcePreference};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch quotes for one or more symbols
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,
        /// History range, e.g. 1d, 5d, 1mo, 1y
        #[arg(short, long, default_value = "1d")]
        range: String,
        /// Bar interval; derived from the range when omitted
        #[arg(short, long)]
        interval: Option<String>,
        /// Prefer sources with candle history and print it
        #[arg(long)]
        history: bool,
    },
    /// Show the recent request success rate
    Stats {
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Manage stored preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),
    /// Run the local quote relay server
    Serve {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// Set the preferred source: auto, primary, backupA or backupB
    Source { source: SourcePreference },
    /// Store an API key for a backup provider
    Key { provider: ProviderKind, key: String },
}

impl From<Commands> for quotefeed::AppCommand {
    fn from(cmd: Commands) -> quotefeed::AppCommand {
        match cmd {
            Commands::Quote {
                symbols,
                range,
                interval,
                history,
            } => quotefeed::AppCommand::Quote {
                symbols,
                range,
                interval,
                history,
            },
            Commands::Stats { hours } => quotefeed::AppCommand::Stats { hours },
            Commands::Prefs(PrefsCommand::Source { source }) => {
                quotefeed::AppCommand::SetSource(source)
            }
            Commands::Prefs(PrefsCommand::Key { provider, key }) => {
                quotefeed::AppCommand::SetKey { provider, key }
            }
            Commands::Serve { port } => quotefeed::AppCommand::Serve { port },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => quotefeed::cli::setup::setup(),
        Some(cmd) => quotefeed::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
