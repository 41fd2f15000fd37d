//! Proof-of-existence CLI - command-line interface over a persistent front

use anyhow::Context;
use clap::Parser;
use poe_core::{Address, ContentHash, FileSubmission, Locator, PoeConfig, Tags, UpgradableFront};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "poe")]
#[command(about = "Proof-of-existence registry with upgradeable logic")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/poe.toml")]
    config: PathBuf,

    /// Identity the command acts as (defaults to the configured deployer)
    #[arg(long, global = true)]
    caller: Option<Address>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show registry and front status
    Status,
    /// Register a file (hashed with SHA-256) or an explicit content hash
    Add {
        /// File whose bytes are hashed
        #[arg(required_unless_present = "hash", conflicts_with = "hash")]
        file: Option<PathBuf>,
        /// Hex content hash to register instead of hashing a file
        #[arg(long)]
        hash: Option<ContentHash>,
        /// Locator of the bytes in the external content store
        #[arg(short, long)]
        locator: String,
        /// Free-form tags
        #[arg(short, long, default_value = "")]
        tags: String,
        /// Record owner (defaults to the caller)
        #[arg(long)]
        owner: Option<Address>,
        /// Creation timestamp in seconds (defaults to now)
        #[arg(long)]
        created_at: Option<u64>,
    },
    /// Look up a record by content hash
    Details { hash: ContentHash },
    /// Count the records of an owner (defaults to the caller)
    Count { owner: Option<Address> },
    /// Show the caller's record at an index
    Mine { index: u64 },
    /// Flip the circuit breaker
    Toggle,
    /// Transfer the registry owner slot, or the front slot with --front
    TransferOwnership {
        new_owner: Address,
        #[arg(long)]
        front: bool,
    },
    /// Activate a configured logic revision
    Upgrade { implementation: Address },
    /// Credit value to the front
    Deposit { amount: u128 },
    /// Pay the front balance out to the caller
    Withdraw,
    /// Print the Merkle root over all records
    Root,
    /// Print an inclusion proof for a record
    Prove { hash: ContentHash },
}

#[derive(Serialize)]
struct Status {
    implementation: Option<Address>,
    owner: Address,
    front_owner: Address,
    enabled: bool,
    total_count: u64,
    balance: u128,
    records_root: ContentHash,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn now() -> anyhow::Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = PoeConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let caller = cli.caller.unwrap_or(config.front.deployer);

    let Some(command) = cli.command else {
        println!("poe v{} - Use --help for commands", env!("CARGO_PKG_VERSION"));
        return Ok(());
    };

    let mut front = UpgradableFront::from_config(&config)
        .with_context(|| format!("opening {}", config.registry.db_path.display()))?;
    debug!("Acting as {}", caller);

    match command {
        Commands::Status => {
            let status = Status {
                implementation: front.implementation()?,
                owner: front.owner()?,
                front_owner: front.front_owner()?,
                enabled: front.is_enabled()?,
                total_count: front.total_count()?,
                balance: front.balance()?,
                records_root: ContentHash::new(front.records_root()),
            };
            print_json(&status)?;
        }
        Commands::Add {
            file,
            hash,
            locator,
            tags,
            owner,
            created_at,
        } => {
            let content_hash = match (hash, file) {
                (Some(hash), _) => hash,
                (None, Some(path)) => {
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    ContentHash::digest(&bytes)
                }
                (None, None) => anyhow::bail!("either a file or --hash is required"),
            };
            let submission = FileSubmission::new(
                created_at.map_or_else(now, Ok)?,
                content_hash,
                Tags::new(tags)?,
                Locator::new(locator),
            );
            let event = match owner {
                Some(owner) => front.add_file(owner, submission, &caller)?,
                None => front.add_my_file(submission, &caller)?,
            };
            print_json(&event)?;
        }
        Commands::Details { hash } => {
            let record = front.file_details(&hash)?;
            if record.is_empty() {
                anyhow::bail!("no record for {}", hash);
            }
            print_json(&record)?;
        }
        Commands::Count { owner } => {
            println!("{}", front.count_of_files(&owner.unwrap_or(caller))?);
        }
        Commands::Mine { index } => {
            print_json(&front.my_file_by_id(index, &caller)?)?;
        }
        Commands::Toggle => {
            print_json(&front.toggle_contract_state(&caller)?)?;
        }
        Commands::TransferOwnership { new_owner, front: true } => {
            print_json(&front.transfer_front_ownership(new_owner, &caller)?)?;
        }
        Commands::TransferOwnership { new_owner, front: false } => {
            print_json(&front.transfer_ownership(new_owner, &caller)?)?;
        }
        Commands::Upgrade { implementation } => {
            print_json(&front.upgrade_to(implementation, &caller)?)?;
        }
        Commands::Deposit { amount } => {
            print_json(&front.deposit(caller, amount)?)?;
        }
        Commands::Withdraw => {
            print_json(&front.withdraw(&caller)?)?;
        }
        Commands::Root => {
            println!("{}", ContentHash::new(front.records_root()));
        }
        Commands::Prove { hash } => {
            let proof = front
                .record_proof(&hash)
                .with_context(|| format!("no record for {}", hash))?;
            print_json(&proof)?;
        }
    }

    front.flush()?;
    Ok(())
}
