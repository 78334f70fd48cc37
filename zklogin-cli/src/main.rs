//! Developer CLI for zkLogin sessions.

mod logging;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyre::{eyre, Context, Result};
use zklogin_core::address::derive_address;
use zklogin_core::defaults::{explorer_url, DefaultConfig};
use zklogin_core::jwt::IdentityToken;
use zklogin_core::ledger::TransactionDigest;
use zklogin_core::storage::SplitStorage;
use zklogin_core::{Config, Network, Phase, Session, U256Decimal, ZkLoginError};

/// Log in with an OpenID provider, obtain a zkLogin proof and submit a transfer.
#[derive(Parser)]
#[command(name = "zklogin", version)]
struct Cli {
    /// Network whose full node and prover are used.
    #[arg(long, env = "ZKLOGIN_NETWORK", default_value = "devnet")]
    network: Network,
    /// OAuth client id. Defaults to the demo client.
    #[arg(long, env = "ZKLOGIN_CLIENT_ID")]
    client_id: Option<String>,
    /// Redirect URI registered for the client.
    #[arg(long, env = "ZKLOGIN_REDIRECT_URI")]
    redirect_uri: Option<String>,
    /// Overrides the network's full node.
    #[arg(long, env = "ZKLOGIN_FULLNODE_URL")]
    fullnode_url: Option<String>,
    /// Overrides the network's prover.
    #[arg(long, env = "ZKLOGIN_PROVER_URL")]
    prover_url: Option<String>,
    /// JSON config file. Replaces every other connection option.
    #[arg(long, env = "ZKLOGIN_CONFIG")]
    config: Option<PathBuf>,
    /// Where session state is kept.
    #[arg(long, env = "ZKLOGIN_DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Commit to a fresh ephemeral key and print the login URL.
    Login,
    /// Hand over the location the provider redirected to.
    Callback {
        /// Full redirect URL, or just its `#id_token=...` fragment.
        location: String,
    },
    /// Retry the proof request after a failure.
    Advance,
    /// Submit the configured transfer, requesting a proof first if none is held.
    Submit,
    /// Print everything the session knows as JSON.
    Status,
    /// Replace the user salt with a decimal value.
    Salt {
        /// Decimal salt.
        value: U256Decimal,
    },
    /// Forget the session entirely.
    Reset,
    /// Derive an address offline from a token and a salt.
    Address {
        /// Identity token.
        #[arg(long)]
        jwt: String,
        /// Decimal salt.
        #[arg(long)]
        salt: U256Decimal,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    if let Command::Address { jwt, salt } = &cli.command {
        return print_address(jwt, salt);
    }

    let config = load_config(&cli)?;
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir(cli.network)?,
    };
    std::fs::create_dir_all(&data_dir)
        .wrap_err_with(|| format!("creating {}", data_dir.display()))?;
    tracing::debug!(dir = %data_dir.display(), "using session storage");

    let storage = SplitStorage::in_directory(&data_dir);
    let session = Session::connect(config, &storage)?;
    let result = run(&session, cli.network, cli.command).await;
    if let Err(report) = &result {
        if report
            .downcast_ref::<ZkLoginError>()
            .is_some_and(ZkLoginError::is_retryable)
        {
            eprintln!("The failure may be temporary; run the same command again to retry.");
        }
    }
    result
}

async fn run(session: &Session, network: Network, command: Command) -> Result<()> {
    match command {
        Command::Login => {
            let url = session.begin_login().await?;
            eprintln!("Open this URL and sign in, then pass the redirect to `zklogin callback`:");
            println!("{url}");
        }
        Command::Callback { location } => {
            if session.handle_redirect(&location).await?.is_none() {
                eprintln!("No id_token found in the location");
            }
            report(session)?;
        }
        Command::Advance => {
            session.advance().await?;
            report(session)?;
        }
        Command::Submit => match submit_transfer(session).await? {
            Some(digest) => {
                println!("{digest}");
                eprintln!("{}", explorer_url(network, &digest.0));
            }
            None => eprintln!("A submission is already in progress"),
        },
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
        }
        Command::Salt { value } => {
            session.import_salt(value)?;
            report(session)?;
        }
        Command::Reset => {
            session.reset()?;
            eprintln!("Session cleared");
        }
        Command::Address { jwt, salt } => print_address(&jwt, &salt)?,
    }
    Ok(())
}

/// Proofs are not persisted, so a session restored by this process proves again first.
async fn submit_transfer(session: &Session) -> Result<Option<TransactionDigest>> {
    let phase = session.advance().await?;
    tracing::debug!(%phase, "submitting transfer");
    Ok(session.submit().await?)
}

fn print_address(jwt: &str, salt: &U256Decimal) -> Result<()> {
    let token = IdentityToken::parse(jwt)?;
    println!("{}", derive_address(&token, salt)?);
    Ok(())
}

fn report(session: &Session) -> Result<()> {
    let snapshot = session.snapshot();
    if let Some(address) = snapshot.address {
        eprintln!("Address: {address}");
    }
    match snapshot.phase {
        Phase::Error { cause } => Err(eyre!(cause)),
        phase => {
            eprintln!("Phase: {phase}");
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    if let Some(path) = &cli.config {
        return read_config(path);
    }
    let mut config = Config::from_network(
        cli.network,
        cli.client_id.clone(),
        cli.redirect_uri.clone(),
    );
    if let Some(url) = &cli.fullnode_url {
        config.fullnode_url.clone_from(url);
    }
    if let Some(url) = &cli.prover_url {
        config.prover_url.clone_from(url);
    }
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config> {
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    Config::from_json(&json).wrap_err_with(|| format!("parsing {}", path.display()))
}

fn default_data_dir(network: Network) -> Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| eyre!("no local data directory"))?;
    Ok(base.join("zklogin").join(network.to_string()))
}
