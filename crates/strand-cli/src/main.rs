use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use strand_cli::cli::{CliCommand, CliConfig, OutputFormat, Session};
use strand_core::models::FeedQuery;
use strand_core::stats::SharedFetchStats;
use strand_core::store::ProfileCache;
use strand_core::tracing_setup::init_tracing;
use strand_core::{FeedEngine, KeySigner, RelayGateway};

#[derive(Parser)]
#[command(name = "strand")]
#[command(about = "Read and write Nostr feeds from the terminal")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    /// Human-readable text instead of JSON
    #[arg(long, global = true)]
    text: bool,

    /// Path to JSON config file (contains engine settings, user, credentials)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Page size for feed commands
    #[arg(long, short = 'n', global = true)]
    limit: Option<usize>,

    /// Only records created at or before this unix timestamp
    #[arg(long, global = true)]
    before: Option<u64>,

    /// Secret key (nsec, hex) to sign with; overrides configured credentials
    #[arg(long, global = true, env = "STRAND_NSEC", hide_env_values = true)]
    nsec: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest text notes from everyone
    Global,

    /// Notes from the accounts a user follows
    Home {
        /// Pubkey (hex or npub); defaults to the signing key or configured user
        user: Option<String>,
    },

    /// Top-level notes from specific authors
    Feed {
        #[arg(required = true)]
        authors: Vec<String>,
    },

    /// Replies written by specific authors
    Replies {
        #[arg(required = true)]
        authors: Vec<String>,
    },

    /// Everything a single user has posted
    User { pubkey: String },

    /// A note with its full reply tree
    Thread {
        /// Event id (hex, note or nevent)
        id: String,
    },

    /// Accounts a user follows
    Following {
        user: Option<String>,
        /// Include accounts from older contact lists, ranked by last appearance
        #[arg(long)]
        history: bool,
    },

    /// Accounts following a user
    Followers { user: Option<String> },

    /// Profile metadata for one or more users
    Profile {
        #[arg(required = true)]
        pubkeys: Vec<String>,
    },

    /// Notes mentioning a user
    Notifications { user: Option<String> },

    /// Publish a text note
    Post { content: String },

    /// Reply to a note
    Reply {
        /// Event id being replied to
        id: String,
        content: String,
    },

    /// Add a user to your contact list
    Follow { pubkey: String },

    /// Remove a user from your contact list
    Unfollow { pubkey: String },

    /// Fetch raw events by id
    Events {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

impl From<Commands> for CliCommand {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Global => CliCommand::Global,
            Commands::Home { user } => CliCommand::Home { user },
            Commands::Feed { authors } => CliCommand::Feed { authors },
            Commands::Replies { authors } => CliCommand::Replies { authors },
            Commands::User { pubkey } => CliCommand::User { pubkey },
            Commands::Thread { id } => CliCommand::Thread { id },
            Commands::Following { user, history } => CliCommand::Following { user, history },
            Commands::Followers { user } => CliCommand::Followers { user },
            Commands::Profile { pubkeys } => CliCommand::Profile { pubkeys },
            Commands::Notifications { user } => CliCommand::Notifications { user },
            Commands::Post { content } => CliCommand::Post { content },
            Commands::Reply { id, content } => CliCommand::Reply { id, content },
            Commands::Follow { pubkey } => CliCommand::Follow { pubkey },
            Commands::Unfollow { pubkey } => CliCommand::Unfollow { pubkey },
            Commands::Events { ids } => CliCommand::Events { ids },
        }
    }
}

fn main() {
    let mut cli = Cli::parse();
    init_tracing();

    let Some(command) = cli.command.take().map(CliCommand::from) else {
        eprintln!("No command specified. Use --help for usage.");
        std::process::exit(1);
    };

    match run(&cli, command) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli, command: CliCommand) -> Result<String> {
    let config = CliConfig::resolve(cli.config.as_deref())?;
    let signer = config.signer(cli.nsec.as_deref())?;
    if command.needs_signer() && signer.is_none() {
        anyhow::bail!("This command needs a key. Pass --nsec or add credentials to the config");
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(execute(cli, &config, signer.as_ref(), command))
}

async fn execute(
    cli: &Cli,
    config: &CliConfig,
    signer: Option<&KeySigner>,
    command: CliCommand,
) -> Result<String> {
    let stats = SharedFetchStats::new();
    let gateway = RelayGateway::connect(&config.engine, stats.clone())
        .await
        .context("Failed to connect to relays")?;
    let engine = FeedEngine::with_parts(
        Arc::new(gateway),
        Arc::new(ProfileCache::new()),
        config.engine.clone(),
        stats.clone(),
    );

    let limit = cli.limit.unwrap_or(config.engine.default_limit);
    let session = Session {
        engine: &engine,
        signer,
        default_user: config.user.as_deref(),
        query: FeedQuery::new(limit).before(cli.before),
        format: OutputFormat {
            pretty: cli.pretty,
            text: cli.text,
        },
    };
    let output = session.execute(command).await;

    let snapshot = stats.snapshot();
    tracing::debug!(
        "Fetch stats: {} queries, {} records, {} duplicates dropped, {} timeouts, {} failures",
        snapshot.queries,
        snapshot.total,
        snapshot.duplicates_dropped,
        snapshot.timeouts,
        snapshot.failures
    );

    output
}
