//! # osmsync CLI
//!
//! Command-line driver for the change application engine. `apply` replays a
//! single local change file against the endpoint; `sync` catches the
//! endpoint up with an OSM replication feed, one sequence at a time.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use osmsync_engine::{ChangeProcessor, Config, Osm2RdfCommand, ReplicationClient};
use std::path::PathBuf;
use tracing::info;

/// osmsync command-line interface
#[derive(Parser)]
#[command(name = "osmsync")]
#[command(about = "Keep an osm2rdf SPARQL endpoint in sync with OSM diffs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SPARQL endpoint, overriding the configured one
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply one local change file (plain or gzipped osmChange XML)
    Apply {
        /// Path to the change file
        file: PathBuf,
    },

    /// Catch the endpoint up with a replication feed and exit
    Sync {
        /// Replication directory, overriding the configured one
        #[arg(long)]
        replication_uri: Option<String>,

        /// First sequence number to apply; derived from the endpoint's
        /// newest node timestamp when omitted
        #[arg(long)]
        sequence: Option<u64>,
    },
}

/// Run the parsed CLI command.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(endpoint) = cli.endpoint {
        config.sparql_endpoint_uri = endpoint;
        config.validate()?;
    }

    match cli.command {
        Commands::Apply { file } => {
            let mut processor = ChangeProcessor::new(&config, Osm2RdfCommand::new(&config))?;
            processor.apply_change_file(&file).await?;
            Ok(())
        }
        Commands::Sync {
            replication_uri,
            sequence,
        } => {
            if let Some(uri) = replication_uri {
                config.osm_change_file_directory_uri = uri;
                config.validate()?;
            }
            sync(&config, sequence).await
        }
    }
}

/// Apply replication diffs from `start_sequence` (or the sequence matching
/// the endpoint's newest node timestamp) up to the feed's latest state.
async fn sync(config: &Config, start_sequence: Option<u64>) -> Result<()> {
    let replication = ReplicationClient::new(&config.osm_change_file_directory_uri)?;
    let mut processor = ChangeProcessor::new(config, Osm2RdfCommand::new(config))?;

    let mut sequence = match start_sequence {
        Some(sequence) => sequence,
        None => {
            let mut timestamp = processor
                .latest_node_timestamp()
                .await
                .context("determining endpoint timestamp")?;
            if !timestamp.ends_with('Z') {
                timestamp.push('Z');
            }
            replication
                .state_for_timestamp(&timestamp)
                .await?
                .sequence_number
        }
    };

    let latest = replication.latest_state().await?;
    if sequence > latest.sequence_number {
        info!(sequence, latest = latest.sequence_number, "already caught up");
        return Ok(());
    }

    let download_dir = tempfile::tempdir().context("creating download directory")?;
    while sequence <= latest.sequence_number {
        info!(sequence, latest = latest.sequence_number, "applying diff");
        let change_file = replication
            .fetch_change_file(sequence, download_dir.path())
            .await
            .with_context(|| format!("fetching diff {sequence}"))?;
        processor
            .apply_change_file(&change_file)
            .await
            .with_context(|| format!("applying diff {sequence}"))?;
        sequence += 1;
    }

    info!(latest = latest.sequence_number, "caught up with replication feed");
    Ok(())
}
