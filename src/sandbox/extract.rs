//! Extraction of the return value from captured stdout.

use serde_json::Value;

use crate::error::{Result, SandboxError};
use crate::sandbox::harness::{RESULT_END, RESULT_START};

/// Decode the value the harness printed between the result markers.
///
/// Returns `Ok(None)` when no marker region is present or the region is empty.
/// When user output contains its own markers, the last region wins, since the
/// harness prints after the submitted code has finished. A start marker without
/// an end marker runs to the end of the output.
pub fn extract(stdout: &str) -> Result<Option<Value>> {
    let Some(payload) = last_region(stdout) else {
        return Ok(None);
    };
    if payload.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&payload)
        .map(Some)
        .map_err(SandboxError::ResultParse)
}

fn last_region(stdout: &str) -> Option<String> {
    let mut last: Option<Vec<&str>> = None;
    let mut open: Option<Vec<&str>> = None;

    for line in stdout.lines() {
        if line == RESULT_START {
            open = Some(Vec::new());
        } else if line == RESULT_END {
            if let Some(region) = open.take() {
                last = Some(region);
            }
        } else if let Some(region) = open.as_mut() {
            if !line.trim().is_empty() {
                region.push(line);
            }
        }
    }

    open.or(last).map(|lines| lines.join("\n"))
}
