use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nss_platform::prelude::*;

#[derive(Parser, Debug)]
#[clap(name = "nss-cli", version)]
#[clap(about = "Exports and dashboards for the NSS platform", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Account to sign in with
    #[clap(long, env = "NSS_EMAIL")]
    email: String,

    /// Password for the account
    #[clap(long, env = "NSS_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write every user as CSV (admin only)
    ExportUsers {
        /// Output file; stdout when omitted
        #[clap(long, short)]
        output: Option<PathBuf>,
    },
    /// Write volunteer profiles as CSV
    ExportVolunteers {
        /// Restrict to one unit (admins only; unit accounts always get their own)
        #[clap(long)]
        unit: Option<String>,
        /// Output file; stdout when omitted
        #[clap(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the signed-in role's dashboard as JSON
    Dashboard,
}

fn emit(csv: String, output: Option<PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(&path, csv).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let nss = Nss::from_env().context("failed to load configuration")?;
    let session = nss
        .sign_in(&cli.email, &cli.password)
        .await
        .context("sign in failed")?;

    let result: anyhow::Result<()> = async {
        match cli.command {
            Commands::ExportUsers { output } => {
                let csv = nss.admin().export_users(&session).await?;
                emit(csv, output)
            }
            Commands::ExportVolunteers { unit, output } => {
                let csv = nss
                    .admin()
                    .export_volunteers(&session, unit.as_deref())
                    .await?;
                emit(csv, output)
            }
            Commands::Dashboard => {
                let dashboard = nss.dashboards().load(&session).await?;
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
                Ok(())
            }
        }
    }
    .await;

    nss.sign_out(session).await.context("sign out failed")?;
    result
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}
