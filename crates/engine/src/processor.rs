// SPDX-License-Identifier: MIT

//! Executes one annotation attempt against one input file: runs the
//! annotator (pooled handle or one-shot subprocess), enforces the per-file
//! timeout, and validates the output artifact before calling it a success.

use annobatch_adapters::annotator_process::annotate_file;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const SENTINEL: &str = "META_BATCH_END";

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub success: bool,
    pub elapsed: Duration,
    pub error: Option<String>,
    pub concepts_found: u64,
}

pub struct ProcessorConfig {
    pub driver: PathBuf,
    pub timeout: Duration,
}

/// Run the annotator against `input_path`, writing to `output_path`, and
/// validate the result. Never returns `Err` for a failed annotation — a
/// bad run is folded into `ProcessOutcome { success: false, .. }` so a
/// single worker's misbehaving subprocess can't unwind the scheduler.
pub async fn process_file(config: &ProcessorConfig, input_path: &Path, output_path: &Path) -> ProcessOutcome {
    let start = Instant::now();
    let result = annotate_file(&config.driver, input_path, output_path, config.timeout).await;

    match result {
        Ok(output) if output.status.success() => match validate_output(output_path) {
            Ok(concepts_found) => ProcessOutcome { success: true, elapsed: start.elapsed(), error: None, concepts_found },
            Err(message) => ProcessOutcome { success: false, elapsed: start.elapsed(), error: Some(message), concepts_found: 0 },
        },
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            ProcessOutcome {
                success: false,
                elapsed: start.elapsed(),
                error: Some(if stderr.is_empty() { format!("exit code {:?}", output.status.code()) } else { stderr }),
                concepts_found: 0,
            }
        }
        Err(err) => ProcessOutcome { success: false, elapsed: start.elapsed(), error: Some(err.to_string()), concepts_found: 0 },
    }
}

/// Confirm the output artifact is non-empty and ends in the sentinel line,
/// returning an approximate concept count (data lines excluding header and
/// sentinel) on success. Also used by the tracker to recognize a leftover
/// output artifact as already-complete without re-running the annotator.
pub(crate) fn validate_output(output_path: &Path) -> Result<u64, String> {
    let contents = std::fs::read_to_string(output_path).map_err(|e| format!("reading output: {e}"))?;
    let lines: Vec<&str> = contents.lines().collect();
    match lines.last() {
        Some(last) if !lines.is_empty() && last.contains(SENTINEL) => {
            let data_lines = lines.len().saturating_sub(2); // header + sentinel
            Ok(data_lines as u64)
        }
        _ => Err(format!("output missing {SENTINEL} sentinel")),
    }
}
