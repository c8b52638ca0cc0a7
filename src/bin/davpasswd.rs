//! davpasswd - Manage davgate credential files
//!
//! Usage:
//!   davpasswd set alice          - Add or replace alice's password (read from stdin)
//!   davpasswd remove alice       - Remove alice
//!   davpasswd list               - List identities
//!   davpasswd verify alice       - Check a password against the file
//!
//! The serving process never modifies the credential file; restart it after
//! changes.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use davgate::auth::{AccessGate, MAX_PATH_SEGMENTS};
use davgate::credentials::{
    hash_bcrypt, CredentialStore, HashScheme, MAX_CREDENTIAL_FILE_SIZE,
};

/// davgate credential file tool
#[derive(Parser)]
#[command(name = "davpasswd")]
#[command(about = "Manage davgate credential files", long_about = None)]
struct Cli {
    /// Path to the credential file
    #[arg(short, long, default_value = "/etc/radicale/users")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an identity or replace its password
    Set {
        /// Identity (also the name of the user's top-level directory)
        identity: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Hash scheme: bcrypt or argon2
        #[arg(long, default_value = "bcrypt")]
        scheme: HashScheme,
        /// bcrypt cost
        #[arg(long)]
        cost: Option<u32>,
        /// Create the file if it does not exist
        #[arg(short, long)]
        create: bool,
    },
    /// Remove an identity
    Remove {
        identity: String,
    },
    /// List identities
    List,
    /// Check a password against the stored hash
    Verify {
        identity: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Set {
            identity,
            password,
            scheme,
            cost,
            create,
        } => set_password(&cli.file, &identity, password, scheme, cost, create),
        Commands::Remove { identity } => remove_identity(&cli.file, &identity),
        Commands::List => list_identities(&cli.file),
        Commands::Verify { identity, password } => verify_password(&cli.file, &identity, password),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load(path: &Path) -> Result<CredentialStore> {
    CredentialStore::from_file(path, MAX_CREDENTIAL_FILE_SIZE)
        .with_context(|| format!("failed to load {}", path.display()))
}

fn read_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("empty password");
    }
    Ok(password)
}

fn set_password(
    path: &Path,
    identity: &str,
    password: Option<String>,
    scheme: HashScheme,
    cost: Option<u32>,
    create: bool,
) -> Result<()> {
    let mut store = if create && !path.exists() {
        CredentialStore::new()
    } else {
        load(path)?
    };

    let password = read_password(password)?;
    let hash = match (scheme, cost) {
        (HashScheme::Bcrypt, Some(cost)) => hash_bcrypt(&password, cost)?,
        (scheme, _) => scheme.hash(&password)?,
    };

    let replaced = store.insert(identity, &hash)?.is_some();
    store
        .write_to_file(path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if replaced {
        println!("Updated password for {}", identity);
    } else {
        println!("Added {}", identity);
    }
    Ok(())
}

fn remove_identity(path: &Path, identity: &str) -> Result<()> {
    let mut store = load(path)?;
    if store.remove(identity).is_none() {
        bail!("{} is not in {}", identity, path.display());
    }
    store
        .write_to_file(path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Removed {}", identity);
    Ok(())
}

fn list_identities(path: &Path) -> Result<()> {
    let store = load(path)?;
    for identity in store.identities() {
        println!("{}", identity);
    }
    Ok(())
}

fn verify_password(path: &Path, identity: &str, password: Option<String>) -> Result<()> {
    let store = load(path)?;
    let gate = AccessGate::new(Arc::new(store), MAX_PATH_SEGMENTS)?;
    let password = read_password(password)?;

    if gate.authenticate(identity, &password).is_err() {
        bail!("password rejected for {}", identity);
    }
    println!("Password accepted for {}", identity);
    Ok(())
}
