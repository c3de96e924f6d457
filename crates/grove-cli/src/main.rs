//! Grove CLI - inspect Elm projects the way the editor tooling sees them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grove_pkg::PackageStore;
use grove_workspace::{OsHost, Workspace};

#[derive(Parser)]
#[command(name = "grove")]
#[command(version)]
#[command(about = "Inspect Elm projects and their dependencies", long_about = None)]
struct Cli {
    /// Package store to read instead of the ambient ELM_HOME
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved version of every dependency
    Resolve {
        /// Project directory holding an elm.json
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// List the modules visible to the root project
    Modules {
        /// Project directory holding an elm.json
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Load the whole workspace and report what was found
    Check {
        /// Project directory holding an elm.json
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = match &cli.store {
        Some(dir) => PackageStore::new(dir),
        None => PackageStore::discover()
            .context("unable to locate the Elm package store; set ELM_HOME")?,
    };

    match cli.command {
        Commands::Resolve { dir } => {
            let ws = open(&dir, store).await?;
            for (name, version) in ws.graph().resolution().iter() {
                println!("{name} {version}");
            }
        }

        Commands::Modules { dir } => {
            let ws = open(&dir, store).await?;
            for (module, path) in &ws.graph().root_project().modules {
                println!("{module}\t{}", path.display());
            }
        }

        Commands::Check { dir } => {
            let mut ws = open(&dir, store).await?;
            let projects = ws.graph().len();
            let modules = ws.graph().root_project().modules.len();
            let files = ws.forest(true).len();
            println!(
                "{}: {projects} projects, {modules} visible modules, {files} source files",
                ws.root_dir().display()
            );
        }
    }

    Ok(())
}

async fn open(dir: &Path, store: PackageStore) -> Result<Workspace> {
    Workspace::load(dir, Arc::new(OsHost), Arc::new(store))
        .await
        .with_context(|| format!("failed to load the project at {}", dir.display()))
}
