mod config;
mod reconcile;
mod resolve;

use clap::{Parser, Subcommand};
use converge_azdo::{AzdoConfig, AzdoGateway};
use converge_core::{EntityKind, Identifier, Operation};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "converge")]
#[command(about = "Reconcile declared Azure DevOps entities", long_about = None)]
struct Cli {
    /// Engine settings file (YAML)
    #[arg(long, global = true, env = config::CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one operation for one entity and print the outcome as JSON
    Reconcile {
        /// feed, audit_stream, group_entitlement or feed_permission
        #[arg(long)]
        kind: String,

        /// create, read, update or delete
        #[arg(long)]
        op: String,

        /// Declared state JSON file
        #[arg(long)]
        state: PathBuf,

        /// Identifier from a previous run
        #[arg(long)]
        id: Option<String>,
    },
    /// Look up one principal and print it as JSON
    Resolve {
        #[command(flatten)]
        selector: resolve::Selector,
    },
    /// Print the effective engine settings
    Config,
    /// Print the version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the JSON report; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("converge {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Config => {
            let settings = config::load(cli.config.as_deref())?;
            print!("{}", serde_yaml::to_string(&settings)?);
        }
        Commands::Resolve { selector } => {
            let reference = selector.into_reference()?;
            let gateway = Arc::new(AzdoGateway::new(AzdoConfig::from_env()?)?);
            let principal = resolve::run(gateway, &reference).await?;
            println!("{}", serde_json::to_string_pretty(&principal)?);
        }
        Commands::Reconcile {
            kind,
            op,
            state,
            id,
        } => {
            let request = reconcile::Request {
                kind: kind.parse::<EntityKind>()?,
                operation: op.parse::<Operation>()?,
                state: reconcile::load_state(&state)?,
                identifier: id.map(Identifier::new),
            };
            let settings = config::load(cli.config.as_deref())?;
            let gateway = Arc::new(AzdoGateway::new(AzdoConfig::from_env()?)?);
            tracing::debug!(org = %gateway.endpoints().feeds, "Using organization");

            let outcome = reconcile::run(gateway, settings, request).await;
            let report = reconcile::Report::from(&outcome);
            println!("{}", serde_json::to_string_pretty(&report)?);

            if let Some(error) = outcome.error {
                return Err(error.into());
            }
        }
    }

    Ok(())
}
