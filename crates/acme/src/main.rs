//! Certward - main entry point
//!
//! Inspects the account storage and configuration of a Certward deployment.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use certward_acme::{AccountStore, FileSystemAccountStore};
use certward_common::{init_logging, LogFormat};
use certward_config::{load_kdl_file, AcmeSettings, ConfigurationManager, DEFAULT_SECTION};

/// Certward - ACME account storage and live domain configuration
#[derive(Parser, Debug)]
#[command(name = "certward")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path (KDL)
    #[arg(short = 'c', long = "config", env = "CERTWARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Configuration section holding the ACME settings
    #[arg(long = "section", default_value = DEFAULT_SECTION, global = true)]
    section: String,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormatArg::Pretty, global = true)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect stored accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Load the configuration and print the resolved settings
    Check,
}

#[derive(Subcommand, Debug)]
enum AccountCommands {
    /// Print the stored account for the configured authority
    Show(AuthorityArgs),
    /// Print the account directory for the configured authority
    Path(AuthorityArgs),
}

#[derive(clap::Args, Debug)]
struct AuthorityArgs {
    /// ACME directory URL (overrides the configuration)
    #[arg(long = "directory")]
    directory: Option<Url>,

    /// Storage root (overrides the configuration)
    #[arg(long = "root")]
    root: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format.into());

    let settings = load_settings(cli.config.as_deref(), &cli.section)?;

    match cli.command {
        Commands::Check => check_config(&settings),
        Commands::Account { command } => match command {
            AccountCommands::Path(args) => print_account_dir(settings, args),
            AccountCommands::Show(args) => {
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(show_account(settings, args))
            }
        },
    }
}

/// Build the layered configuration and read the ACME section
fn load_settings(config_path: Option<&std::path::Path>, section: &str) -> Result<AcmeSettings> {
    let manager = ConfigurationManager::new();

    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            let source = load_kdl_file(path).context("Failed to load configuration file")?;
            manager.add_provider(Arc::new(source));
        }
        None => info!("No configuration specified, using defaults"),
    }

    AcmeSettings::from_configuration(&manager, section).context("Invalid ACME settings")
}

/// Apply command line overrides to the configured settings
fn resolve(mut settings: AcmeSettings, args: AuthorityArgs) -> Result<(AcmeSettings, PathBuf)> {
    if let Some(directory) = args.directory {
        settings.directory_url = directory;
    }

    let root = match args.root.or_else(|| settings.storage_root.clone()) {
        Some(root) => root,
        None => FileSystemAccountStore::default_root()
            .context("Failed to locate the running executable")?,
    };

    Ok((settings, root))
}

fn check_config(settings: &AcmeSettings) -> Result<()> {
    println!("directory-url: {}", settings.directory_url);
    match &settings.storage_root {
        Some(root) => println!("storage-root: {}", root.display()),
        None => println!("storage-root: (executable directory)"),
    }
    match &settings.email_address {
        Some(email) => println!("email-address: {email}"),
        None => println!("email-address: (none)"),
    }
    println!("domain-names: {}", settings.domain_names.len());
    for domain in &settings.domain_names {
        println!("  - {domain}");
    }

    if settings.domain_names.is_empty() {
        warn!("No domain names configured");
    }

    println!("certward: configuration test is successful");
    Ok(())
}

fn print_account_dir(settings: AcmeSettings, args: AuthorityArgs) -> Result<()> {
    let (settings, root) = resolve(settings, args)?;
    let dir = FileSystemAccountStore::account_dir_for(&root, &settings)
        .context("Failed to derive account directory")?;
    println!("{}", dir.display());
    Ok(())
}

async fn show_account(settings: AcmeSettings, args: AuthorityArgs) -> Result<()> {
    let (settings, root) = resolve(settings, args)?;
    let store = FileSystemAccountStore::open(&root, &settings)
        .context("Failed to open account store")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let account = store
        .get_account(&cancel)
        .await
        .context("Failed to read account")?;

    match account {
        Some(account) => {
            let summary = serde_json::json!({
                "id": account.id,
                "emailAddresses": account.email_addresses,
                "accountUrl": account.account_url,
                "createdAt": account.created_at,
                "hasPrivateKey": !account.private_key.is_empty(),
                "directory": store.account_dir().display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        None => {
            println!(
                "certward: no account stored for {} in {}",
                settings.directory_url,
                store.account_dir().display()
            );
        }
    }

    Ok(())
}
