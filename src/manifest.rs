use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::schedule::FramePlan;

pub const FFCONCAT_HEADER: &str = "ffconcat version 1.0";

/// Milliseconds to `HH:MM:SS.mmm`. Pure elapsed time: no timezone or
/// calendar semantics, wrapping at 24 hours.
pub fn format_duration_ms(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let millis = ms % 1000;
    let seconds = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let minutes = total_minutes % 60;
    let hours = (total_minutes / 60) % 24;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Write the concatenation manifest the external encoder consumes. Refuses
/// to overwrite an existing manifest: the frame cache is the resumability
/// mechanism, a leftover manifest means an aborted run the caller should
/// inspect.
pub fn write_manifest(path: &Path, plan: &FramePlan, frames_dir: &str) -> Result<()> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::AlreadyExists => {
            bail!(
                "timeline manifest {} already exists; remove it to re-emit",
                path.display()
            );
        }
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to create timeline manifest {}", path.display()));
        }
    };

    let mut out = BufWriter::new(file);
    writeln!(out, "{FFCONCAT_HEADER}")?;
    for entry in &plan.timeline {
        writeln!(out, "file {}/{}", frames_dir, entry.frame.file_name())?;
        writeln!(out, "duration {}", format_duration_ms(entry.duration_ms))?;
    }

    // The last listed duration is ignored by convention; repeating the
    // final frame's path forces it to take effect.
    if let Some(frame) = plan.frames.last() {
        writeln!(out, "file {}/{}", frames_dir, frame.id.file_name())?;
    }

    out.flush()
        .with_context(|| format!("failed to flush timeline manifest {}", path.display()))?;
    Ok(())
}
