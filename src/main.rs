//! davgate - Credential-Gated WebDAV File Server
//!
//! Serves `<storage root>/<identity>` to each user authenticated against a
//! flat credential file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use davgate::auth::AccessGate;
use davgate::config::DavGateConfig;
use davgate::credentials::{is_well_formed, CredentialStore, HashScheme};
use davgate::error::{Error, Result};
use davgate::server::{DavEngine, Dispatcher, HttpServer};

/// davgate - Credential-Gated WebDAV File Server
#[derive(Parser)]
#[command(name = "davgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start serving (default)
    Serve,

    /// Validate configuration and the credential file
    Check,

    /// Write a configuration file with the default settings
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "davgate.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = load_config(cli.config.as_deref())?;
            init_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level));
            run_serve(config).await
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            run_check(&config)
        }
        Commands::Init { output, force } => run_init(&output, force),
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load the configuration file, or the built-in defaults when none is given
fn load_config(path: Option<&Path>) -> Result<DavGateConfig> {
    let Some(path) = path else {
        return Ok(DavGateConfig::default());
    };

    DavGateConfig::from_file(path).map_err(|e| {
        eprintln!("Failed to load configuration from {}: {}", path.display(), e);
        e
    })
}

/// Start the server
async fn run_serve(config: DavGateConfig) -> Result<()> {
    tracing::info!("Starting davgate...");

    // A store that failed to load is never replaced by an empty one
    let store = match CredentialStore::from_file(
        &config.credentials.path,
        config.credentials.max_file_size,
    ) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to load credentials: {}", e);
            tracing::error!("Refusing to serve without a trusted credential store");
            return Err(e);
        }
    };
    tracing::info!(
        "Loaded {} credential records from {}",
        store.len(),
        config.credentials.path.display()
    );
    if store.is_empty() {
        tracing::warn!("Credential store is empty, every request will be rejected");
    }

    if !config.storage.root.is_dir() {
        tracing::warn!(
            "Storage root {} is not a directory",
            config.storage.root.display()
        );
    }

    let gate = AccessGate::new(Arc::new(store), config.access.max_path_segments)?;
    let engine = DavEngine::new(&config.storage.root);
    tracing::info!("Serving files from {}", engine.root().display());

    let dispatcher = Dispatcher::new(
        Arc::new(gate),
        Arc::new(engine),
        &config.server.realm,
        config.unimplemented_methods()?,
    )
    .ok_or_else(|| Error::Config("server.realm is not a valid header value".into()))?;

    let server = HttpServer::new(config.server.clone(), dispatcher);
    server.start().await?;

    tracing::info!("davgate stopped");
    Ok(())
}

/// Validate configuration and credentials
fn run_check(config: &DavGateConfig) -> Result<()> {
    println!("✓ Configuration is valid");
    println!("  Bind Address:  {}", config.server.bind_address);
    println!("  Storage Root:  {}", config.storage.root.display());
    println!("  Credentials:   {}", config.credentials.path.display());
    println!("  Max Depth:     {} path segments", config.access.max_path_segments);

    let store = match CredentialStore::from_file(
        &config.credentials.path,
        config.credentials.max_file_size,
    ) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("✗ Credential file error: {}", e);
            return Err(e);
        }
    };

    let mut bcrypt = 0;
    let mut argon2 = 0;
    let mut unsupported = Vec::new();
    for identity in store.identities() {
        let hash = store.lookup(identity).unwrap_or_default();
        match HashScheme::detect(hash) {
            Some(_) if !is_well_formed(hash) => unsupported.push(identity),
            Some(HashScheme::Bcrypt) => bcrypt += 1,
            Some(HashScheme::Argon2) => argon2 += 1,
            None => unsupported.push(identity),
        }
    }

    println!("✓ Credential file is valid");
    println!("  Records:       {}", store.len());
    println!("  bcrypt:        {}", bcrypt);
    println!("  argon2:        {}", argon2);
    for identity in &unsupported {
        println!("  ⚠ {} has an unsupported hash and can never log in", identity);
    }

    if !config.storage.root.is_dir() {
        println!("  ⚠ Storage root {} is not a directory", config.storage.root.display());
    }

    Ok(())
}

/// Write the default configuration
fn run_init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            output.display()
        )));
    }

    let rendered = DavGateConfig::default().to_toml()?;
    let content = format!("# davgate Configuration\n# Generated configuration file\n\n{}", rendered);
    std::fs::write(output, content)?;

    println!("Configuration written to {}", output.display());
    Ok(())
}
