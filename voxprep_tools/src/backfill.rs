//! Duration backfill for JSONL manifests.
//!
//! Every line is handled independently on a bounded rayon pool. A line that
//! fails to parse is written back as-is, a record whose audio is missing or
//! unreadable gets [`DURATION_UNKNOWN`], and only setup failures (missing
//! input, unwritable output) stop the run.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use voxprep_core::audio::probe_duration;

use crate::manifest::{
    has_duration, resolve_audio_path, set_duration, Record, DEFAULT_FALLBACK_KEYS, DURATION_UNKNOWN,
};

pub const DEFAULT_AUDIO_KEY: &str = "wav";
pub const DEFAULT_WORKER_CAP: usize = 16;

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Checked before any of `fallback_keys`.
    pub audio_key: String,
    pub fallback_keys: Vec<String>,
    /// Upper bound on worker threads; the machine's parallelism may lower it.
    pub worker_count_cap: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            audio_key: DEFAULT_AUDIO_KEY.to_string(),
            fallback_keys: DEFAULT_FALLBACK_KEYS.iter().map(|k| k.to_string()).collect(),
            worker_count_cap: DEFAULT_WORKER_CAP,
        }
    }
}

impl BackfillConfig {
    pub fn with_audio_key(mut self, audio_key: impl Into<String>) -> Self {
        self.audio_key = audio_key.into();
        self
    }

    pub fn worker_count(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        available.min(self.worker_count_cap).max(1)
    }
}

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to {} {}", .action, .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// What happened to a single manifest line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Duration was already set; the record was re-serialized untouched.
    AlreadyPresent,
    Computed,
    /// Audio missing or unreadable; sentinel written.
    Unknown,
    /// Not a JSON object; original text kept.
    Passthrough,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillSummary {
    pub total: usize,
    pub already_present: usize,
    pub computed: usize,
    pub unknown: usize,
    pub passthrough: usize,
}

impl BackfillSummary {
    fn record(&mut self, outcome: LineOutcome) {
        self.total += 1;
        match outcome {
            LineOutcome::AlreadyPresent => self.already_present += 1,
            LineOutcome::Computed => self.computed += 1,
            LineOutcome::Unknown => self.unknown += 1,
            LineOutcome::Passthrough => self.passthrough += 1,
        }
    }
}

/// Transform one manifest line. `line_no` is 1-based and only used in warnings.
pub fn process_line(line_no: usize, line: &str, config: &BackfillConfig) -> (String, LineOutcome) {
    let mut record: Record = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("Line {}: expected a JSON object, keeping line as-is", line_no);
            return (line.to_string(), LineOutcome::Passthrough);
        }
        Err(e) => {
            warn!("Line {}: could not parse JSON: {}", line_no, e);
            return (line.to_string(), LineOutcome::Passthrough);
        }
    };

    if has_duration(&record) {
        return (serialize(line, record), LineOutcome::AlreadyPresent);
    }

    let audio_path = resolve_audio_path(&record, &config.audio_key, &config.fallback_keys)
        .map(str::to_string);

    let outcome = match audio_path {
        Some(path) if Path::new(&path).exists() => match probe_duration(&path) {
            Ok(seconds) => {
                set_duration(&mut record, seconds);
                LineOutcome::Computed
            }
            Err(e) => {
                warn!("Could not read {}: {:#}", path, e);
                set_duration(&mut record, DURATION_UNKNOWN);
                LineOutcome::Unknown
            }
        },
        other => {
            warn!(
                "Line {}: audio path not found or doesn't exist: {}",
                line_no,
                other.as_deref().unwrap_or("<none>")
            );
            set_duration(&mut record, DURATION_UNKNOWN);
            LineOutcome::Unknown
        }
    };

    (serialize(line, record), outcome)
}

fn serialize(original: &str, record: Record) -> String {
    // Serializing a Value map cannot fail in practice.
    serde_json::to_string(&Value::Object(record)).unwrap_or_else(|_| original.to_string())
}

/// Run [`process_line`] over every line on a pool of `workers` threads
/// (usually [`BackfillConfig::worker_count`]). The result is in input order.
pub fn backfill_lines<S>(
    lines: &[S],
    config: &BackfillConfig,
    workers: usize,
    progress: &ProgressBar,
) -> Result<Vec<(String, LineOutcome)>, BackfillError>
where
    S: AsRef<str> + Sync,
{
    debug!("Backfilling {} lines with {} workers", lines.len(), workers);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;

    let mut results: Vec<(usize, String, LineOutcome)> = pool.install(|| {
        lines
            .par_iter()
            .enumerate()
            .progress_with(progress.clone())
            .map(|(idx, line)| {
                let (out, outcome) = process_line(idx + 1, line.as_ref(), config);
                (idx, out, outcome)
            })
            .collect()
    });

    results.sort_by_key(|(idx, _, _)| *idx);

    Ok(results
        .into_iter()
        .map(|(_, out, outcome)| (out, outcome))
        .collect())
}

/// Read `input`, backfill every record and write the result to `output`.
pub fn run_backfill(
    input: &Path,
    output: &Path,
    config: &BackfillConfig,
) -> Result<BackfillSummary, BackfillError> {
    if !input.exists() {
        return Err(BackfillError::InputNotFound(input.to_path_buf()));
    }

    let content = std::fs::read_to_string(input).map_err(|source| BackfillError::Io {
        action: "read",
        path: input.to_path_buf(),
        source,
    })?;
    let lines: Vec<&str> = content.lines().collect();

    info!("Backfilling durations for {}", input.display());
    println!("Total samples: {}", lines.len());
    let workers = config.worker_count();
    println!("Processing with {} workers...", workers);
    debug!(
        "Resolving audio via '{}' then {:?}",
        config.audio_key, config.fallback_keys
    );

    let pb = ProgressBar::new(lines.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("Adding duration [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let results = backfill_lines(&lines, config, workers, &pb)?;
    pb.finish_and_clear();

    println!("Writing output to {}...", output.display());
    let mut summary = BackfillSummary::default();
    write_lines(output, results.iter().map(|(line, _)| line.as_str()))?;
    for (_, outcome) in &results {
        summary.record(*outcome);
    }

    info!(
        "Backfill finished: {} computed, {} unknown, {} unparsed",
        summary.computed, summary.unknown, summary.passthrough
    );
    println!("Done! Output written to {}", output.display());
    println!("Already had duration: {}", summary.already_present);
    println!("Computed: {}", summary.computed);
    println!("Unknown (-1.0): {}", summary.unknown);
    println!("Passed through unparsed: {}", summary.passthrough);

    Ok(summary)
}

fn write_lines<'a>(output: &Path, lines: impl Iterator<Item = &'a str>) -> Result<(), BackfillError> {
    let io_err = |source| BackfillError::Io {
        action: "write",
        path: output.to_path_buf(),
        source,
    };

    let file = File::create(output).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line.as_bytes()).map_err(io_err)?;
        writer.write_all(b"\n").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;

    Ok(())
}
