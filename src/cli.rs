use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::api::{self, AppState};
use crate::config::Config;
use crate::db::Database;
use crate::ingest::{ingest, IngestOptions};

#[derive(Parser, Debug)]
#[command(
    name = "congestion-history",
    version,
    about = "Import road-segment congestion extracts and serve them by time"
)]
pub struct Cli {
    /// JSON settings file
    #[arg(long, global = true, env = "CONGESTION_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides settings)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import dated extract files into the snapshot store
    Import(ImportArgs),
    /// Serve the snapshot API over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Directory containing the extract files
    #[arg(long = "data-dir", alias = "data_dir")]
    pub data_dir: Option<PathBuf>,

    /// Delete all stored snapshots before importing
    #[arg(long = "clear-existing", alias = "clear_existing")]
    pub clear_existing: bool,

    /// Print the report as JSON instead of the text summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on, e.g. 0.0.0.0:8000
    #[arg(long)]
    pub listen: Option<String>,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(database) = self.database {
            config.database_path = database;
        }

        match self.command {
            Command::Import(args) => import(config, args).await,
            Command::Serve(args) => serve(config, args).await,
        }
    }
}

async fn import(mut config: Config, args: ImportArgs) -> Result<()> {
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    config.log();

    let db = Database::new(config.database_path.clone())?;
    let options = IngestOptions {
        source_dir: config.data_dir.clone(),
        clear_existing: args.clear_existing,
        file_prefix: config.file_prefix.clone(),
    };
    let report = ingest(&db, &options).await?;

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{rendered}");
        return Ok(());
    }

    println!("{report}");
    if !report.failures.is_empty() {
        println!("Issues:");
        for failure in &report.failures {
            println!("  {failure}");
        }
        if report.failures_omitted > 0 {
            println!("  ... and {} more", report.failures_omitted);
        }
    }

    let snapshots = db.list_snapshots().await?;
    match (snapshots.first(), snapshots.last()) {
        (Some(oldest), Some(latest)) => println!(
            "Store holds {} snapshots from {} to {}",
            snapshots.len(),
            oldest.recorded_at,
            latest.recorded_at
        ),
        _ => println!("Store is empty"),
    }

    Ok(())
}

async fn serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    config.log();

    let db = Database::new(config.database_path.clone())?;
    api::router::serve(AppState::new(db), &config.listen_addr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_import_flags() {
        let cli = Cli::try_parse_from([
            "congestion-history",
            "--database",
            "/tmp/store.sqlite3",
            "import",
            "--data-dir",
            "/srv/extracts",
            "--clear-existing",
        ])
        .unwrap();

        assert_eq!(cli.database, Some(PathBuf::from("/tmp/store.sqlite3")));
        match cli.command {
            Command::Import(args) => {
                assert_eq!(args.data_dir, Some(PathBuf::from("/srv/extracts")));
                assert!(args.clear_existing);
                assert!(!args.json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn clear_defaults_to_off() {
        let cli = Cli::try_parse_from(["congestion-history", "import"]).unwrap();
        match cli.command {
            Command::Import(args) => assert!(!args.clear_existing),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_serve_listen_address() {
        let cli =
            Cli::try_parse_from(["congestion-history", "serve", "--listen", "0.0.0.0:9000"])
                .unwrap();
        match cli.command {
            Command::Serve(args) => assert_eq!(args.listen.as_deref(), Some("0.0.0.0:9000")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
