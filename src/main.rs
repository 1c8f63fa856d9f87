use std::path::PathBuf;

use clap::{
    ArgAction, CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing::instrument::WithSubscriber;

use spintally::{
    Res, cli,
    config::{self, Settings},
    error,
    logging::Telemetry,
    tracking::RepeatPolicy,
    warning,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG wins when set
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify, then count plays until interrupted
    Track(TrackArgs),

    /// Run the Spotify authorization once and report the result
    Auth(AuthArgs),

    /// Show the most played tracks
    Stats(StatsArgs),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct TrackArgs {
    /// Progress in milliseconds a track must reach before it counts
    #[clap(long)]
    pub threshold_ms: Option<u64>,

    /// Seconds between two polls
    #[clap(long)]
    pub interval_secs: Option<u64>,

    /// How an immediate restart of a counted track is treated
    #[clap(long, value_parser = parse_repeat_policy)]
    pub repeat_policy: Option<RepeatPolicy>,

    /// Path of the track table (CSV)
    #[clap(long)]
    pub store: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct AuthArgs {
    /// Use the client credentials flow instead of the browser flow
    #[clap(long)]
    pub client_credentials: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Only tracks whose name or artists contain this text
    #[clap(long)]
    pub search: Option<String>,

    /// Number of tracks to show
    #[clap(long, default_value_t = 20)]
    pub limit: usize,

    /// Path of the track table (CSV)
    #[clap(long)]
    pub store: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn parse_repeat_policy(s: &str) -> Result<RepeatPolicy, String> {
    s.parse()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    let telemetry = Telemetry::new(cli.verbose);
    if let Err(e) = run(cli).with_subscriber(telemetry.dispatch().clone()).await {
        error!("{}", e);
    }
}

async fn run(cli: Cli) -> Res<()> {
    if let Err(e) = config::load_env().await {
        warning!("Cannot load environment. Err: {}", e);
    }

    match cli.command {
        Command::Track(opt) => {
            let options = cli::TrackOptions {
                threshold_ms: opt.threshold_ms,
                interval_secs: opt.interval_secs,
                repeat_policy: opt.repeat_policy,
                store: opt.store,
            };
            cli::track(Settings::from_env()?, options).await
        }
        Command::Auth(opt) => cli::auth(Settings::from_env()?, opt.client_credentials).await,
        Command::Stats(opt) => {
            let store = opt.store.unwrap_or_else(config::store_path);
            cli::stats(store, opt.search, opt.limit).await
        }
        Command::Completions(_) => Ok(()),
    }
}
