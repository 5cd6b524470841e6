use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Component, Path, PathBuf},
};

const AUDIO_KEY: &str = "audio";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub first: usize,
    pub second: usize,
}

impl MergeSummary {
    pub fn total(&self) -> usize {
        self.first + self.second
    }
}

/// Concatenate two manifests into `output`, making every `audio` path absolute.
pub fn merge_manifests(first: &Path, second: &Path, output: &Path) -> Result<MergeSummary> {
    for input in [first, second] {
        if !input.exists() {
            bail!("input file not found: {}", input.display());
        }
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output dir: {}", parent.display()))?;
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    let out_file = File::create(output)
        .with_context(|| format!("Failed to create output: {}", output.display()))?;
    let mut writer = BufWriter::new(out_file);

    println!("Reading: {}", first.display());
    let count_first = append_manifest(first, &cwd, &mut writer)?;
    println!("Merged {} entries from file 1", count_first);

    println!("Reading: {}", second.display());
    let count_second = append_manifest(second, &cwd, &mut writer)?;
    println!("Merged {} entries from file 2", count_second);

    writer.flush()?;

    let summary = MergeSummary {
        first: count_first,
        second: count_second,
    };

    println!("Wrote: {}", output.display());
    println!("Total: {}", summary.total());

    Ok(summary)
}

fn append_manifest<W: Write>(input: &Path, cwd: &Path, writer: &mut W) -> Result<usize> {
    let file = File::open(input)
        .with_context(|| format!("Failed to open manifest: {}", input.display()))?;

    let mut kept = 0usize;

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", input.display()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut entry: Value = serde_json::from_str(line)
            .with_context(|| format!("Invalid JSON at {}:{}", input.display(), idx + 1))?;

        if let Some(Value::String(audio)) = entry.get_mut(AUDIO_KEY) {
            let absolute = normalize_lexically(&cwd.join(audio.as_str()));
            *audio = absolute.to_string_lossy().into_owned();
        }

        serde_json::to_writer(&mut *writer, &entry)?;
        writer.write_all(b"\n")?;
        kept += 1;
    }

    Ok(kept)
}

/// Resolve `.` and `..` without touching the filesystem (symlinks are kept).
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}
