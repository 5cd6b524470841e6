//! `voxprep`: manifest tooling for TTS dataset preparation.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use voxprep_tools::{
    backfill::{run_backfill, BackfillConfig, DEFAULT_AUDIO_KEY, DEFAULT_WORKER_CAP},
    manifest::DEFAULT_FALLBACK_KEYS,
    merge::merge_manifests,
};

#[derive(Parser)]
#[command(name = "voxprep")]
#[command(about = "Prepare JSONL manifests for TTS training", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a `duration` field (seconds) to every record of a manifest
    AddDuration {
        /// Path to input JSONL file
        input_jsonl: PathBuf,

        /// Path to output JSONL file with duration added (overwritten)
        output_jsonl: PathBuf,

        /// Key for the audio path in each record
        #[arg(default_value = DEFAULT_AUDIO_KEY)]
        audio_key: String,

        /// Upper bound on worker threads
        #[arg(long, env = "VOXPREP_MAX_WORKERS", default_value_t = DEFAULT_WORKER_CAP)]
        max_workers: usize,

        /// Keys tried after AUDIO_KEY, in priority order
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_FALLBACK_KEYS.map(String::from))]
        fallback_keys: Vec<String>,
    },

    /// Merge two manifests into one, making `audio` paths absolute
    Merge {
        jsonl_file_1: PathBuf,
        jsonl_file_2: PathBuf,
        output_jsonl: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::AddDuration {
            input_jsonl,
            output_jsonl,
            audio_key,
            max_workers,
            fallback_keys,
        } => {
            let config = BackfillConfig {
                audio_key,
                fallback_keys,
                worker_count_cap: max_workers,
            };
            run_backfill(&input_jsonl, &output_jsonl, &config)?;
        }
        Command::Merge {
            jsonl_file_1,
            jsonl_file_2,
            output_jsonl,
        } => {
            merge_manifests(&jsonl_file_1, &jsonl_file_2, &output_jsonl)?;
        }
    }

    Ok(())
}
