//! Durable, append-only JSONL execution trace writer (§3, §4.10). Distinct
//! from `observability` (operational logs): this is the domain-level
//! record of what each phase did, replayable and diffable across runs.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::domain::trace::TraceEvent;
use crate::error::Result;

/// Owns one trace file for one run. `emit` appends and flushes
/// immediately so a crash mid-run still leaves every prior event durable;
/// `close` additionally `fsync`s (§4.10: "durable (fsync at end of run)").
pub struct Tracer {
    run_id: String,
    file: Mutex<std::fs::File>,
}

impl Tracer {
    pub fn create(runs_dir: &Path, run_id: impl Into<String>) -> Result<Self> {
        let run_id = run_id.into();
        let dir = runs_dir.join(&run_id);
        std::fs::create_dir_all(&dir)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("trace.jsonl"))?;
        Ok(Self {
            run_id,
            file: Mutex::new(file),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Best-effort: a write failure is logged and surfaced to the caller,
    /// who treats it as `TraceWriteError` (recoverable, §7) rather than
    /// aborting the run.
    pub fn emit(&self, event: TraceEvent) -> Result<()> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        let mut file = self.file.lock().expect("tracer file mutex poisoned");
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    /// Emits best-effort, logging instead of propagating — used at call
    /// sites where a trace failure must never block the pipeline (§7:
    /// "run continues, terminal warning").
    pub fn emit_best_effort(&self, event: TraceEvent) {
        if let Err(err) = self.emit(event) {
            warn!(run_id = %self.run_id, error = %err, "trace write failed, continuing run");
        }
    }

    pub fn close(&self) -> Result<()> {
        let file = self.file.lock().expect("tracer file mutex poisoned");
        file.sync_all()?;
        Ok(())
    }
}

/// Reads a trace file back, tolerant of a truncated trailing line (same
/// crash-recovery contract as the catalog shard reader).
pub fn read_trace(path: &PathBuf) -> Result<Vec<TraceEvent>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut lines: Vec<String> = reader.lines().collect::<std::result::Result<_, _>>()?;

    if let Some(last) = lines.last() {
        if serde_json::from_str::<TraceEvent>(last).is_err() {
            lines.pop();
        }
    }

    let mut events = Vec::with_capacity(lines.len());
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TraceEvent>(&line) {
            Ok(event) => events.push(event),
            Err(err) => warn!(error = %err, "dropping malformed trace line"),
        }
    }
    Ok(events)
}
