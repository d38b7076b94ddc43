use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::sync::mpsc;

use pixdup::{
    DirectorySource, HashKind, MatchMode, ScanService, ScanSnapshot, SearchStatus, SessionConfig,
    DEFAULT_MAX_FILE_SIZE,
};

#[derive(Parser, Debug)]
#[command(name = "pixdup", version, about = "Find duplicate and near-duplicate images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a directory for duplicate images
    Scan {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,

        /// Match byte-identical files only (content digest)
        #[arg(long)]
        exact: bool,

        /// Hash embedded JPEG preview thumbnails instead of full decodes
        /// where possible
        #[arg(long)]
        fast_read: bool,

        /// Use the row-gradient hash instead of the averaged-icon hash
        #[arg(long, conflicts_with = "exact")]
        dhash: bool,

        /// Only report files matching this reference image
        #[arg(long, value_name = "FILE")]
        anchor: Option<PathBuf>,

        /// Skip files larger than this many bytes
        #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_FILE_SIZE)]
        max_file_size: u64,

        /// Print the final session snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            path,
            exact,
            fast_read,
            dhash,
            anchor,
            max_file_size,
            json,
        } => {
            let config = SessionConfig {
                mode: if exact {
                    MatchMode::Exact
                } else {
                    MatchMode::Perceptual
                },
                hash: if dhash {
                    HashKind::Gradient
                } else {
                    HashKind::Average
                },
                fast_read,
                anchor,
                max_file_size,
            };

            let (progress_tx, progress_rx) = mpsc::unbounded_channel();
            let service = ScanService::new(config)?.with_progress_sender(progress_tx);
            let scan = tokio::spawn(service.run(DirectorySource::new(path)));

            watch_progress(progress_rx).await?;

            let summary = scan.await.context("scan task failed")??;
            report(&summary, json)?;
        }
    }

    Ok(())
}

async fn watch_progress(mut rx: mpsc::UnboundedReceiver<ScanSnapshot>) -> Result<()> {
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )?);

    while let Some(snapshot) = rx.recv().await {
        bar.set_length(snapshot.candidates as u64);
        bar.set_position(snapshot.processed as u64);
        bar.set_message(match snapshot.status {
            SearchStatus::Initializing => format!("enumerating {} files…", snapshot.enumerated),
            SearchStatus::Paused => "paused".to_string(),
            _ => format!("{} group(s)", snapshot.clusters.len()),
        });
    }
    bar.finish_and_clear();
    Ok(())
}

fn report(summary: &ScanSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    if summary.clusters.is_empty() {
        println!("No duplicates found.");
    } else {
        println!("Found {} duplicate group(s):", summary.clusters.len());
        for (i, group) in summary.clusters.iter().enumerate() {
            println!(" Group {}:", i + 1);
            for file in group {
                println!("   ▶ {} ({} bytes)", file.rel_path, file.size);
            }
        }
    }
    println!(
        "{} files enumerated, {} candidates, {} processed, {} error(s)",
        summary.enumerated, summary.candidates, summary.processed, summary.errors
    );
    Ok(())
}
