//! Launching the interpreter against a temporary script.

use std::io::Write;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tokio::process::{Child, Command};

use crate::error::{Result, SandboxError};
use crate::sandbox::config::ExecutionLimits;
use crate::sandbox::io::{drain, CapturedOutput};
use crate::sandbox::limits::{configure_child, kill_process_group, MemoryCap, ProcessGroupGuard};

/// A child that ran to completion with a zero exit status.
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    /// Exit code of the interpreter.
    pub exit_code: i32,
    /// Captured stdout and stderr.
    pub output: CapturedOutput,
    /// Wall-clock time from spawn to exit.
    pub duration: Duration,
    /// Whether a memory cap was handed to the child.
    ///
    /// A fitted cap never exceeds the inherited hard limit, so installing it in
    /// the child only lowers limits and succeeds.
    pub memory_capped: bool,
}

/// Write `script` to a fresh temporary file and run the interpreter on it.
///
/// Fails with [`SandboxError::TimeoutExceeded`] after killing the child when the
/// time limit elapses, and with [`SandboxError::ExecutionFailed`] on a non-zero
/// exit. The script file is removed before this returns, whatever the outcome.
pub async fn launch(script: &str, limits: &ExecutionLimits) -> Result<LaunchOutcome> {
    let script_file = write_script(script, limits)?;
    let outcome = run_interpreter(&script_file, limits).await;
    remove_script(script_file);
    outcome
}

fn write_script(script: &str, limits: &ExecutionLimits) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("sandbox-")
        .suffix(".py")
        .tempfile_in(limits.scratch_dir())?;
    file.write_all(script.as_bytes())?;
    file.flush()?;
    tracing::debug!(path = %file.path().display(), "temporary script written");
    Ok(file)
}

fn remove_script(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary script");
    }
}

async fn run_interpreter(script: &NamedTempFile, limits: &ExecutionLimits) -> Result<LaunchOutcome> {
    let cap = memory_cap(limits.max_memory_mb());

    let mut command = Command::new(limits.interpreter_path());
    command
        .arg(script.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    configure_child(&mut command, cap);

    let started = Instant::now();
    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SandboxError::InterpreterNotFound(limits.interpreter_path().display().to_string())
        } else {
            SandboxError::Io(e)
        }
    })?;
    let pid = child.id();
    let _group = ProcessGroupGuard::new(pid);
    tracing::debug!(pid = ?pid, "interpreter spawned");

    let waited = tokio::time::timeout(limits.timeout(), wait_and_capture(&mut child)).await;
    let (status, output) = match waited {
        Ok(result) => result?,
        Err(_) => {
            terminate(&mut child, pid).await;
            tracing::debug!(pid = ?pid, timeout = ?limits.timeout(), "interpreter killed after timeout");
            return Err(SandboxError::TimeoutExceeded(limits.timeout()));
        }
    };
    let duration = started.elapsed();

    if !status.success() {
        tracing::debug!(pid = ?pid, code = ?status.code(), "interpreter exited with failure");
        return Err(SandboxError::ExecutionFailed {
            stderr: output.stderr,
            exit_code: status.code(),
        });
    }

    Ok(LaunchOutcome {
        exit_code: status.code().unwrap_or_default(),
        output,
        duration,
        memory_capped: cap.is_some(),
    })
}

/// Resolve the memory cap, falling back to no cap with a warning.
fn memory_cap(megabytes: u64) -> Option<MemoryCap> {
    match MemoryCap::from_megabytes(megabytes).and_then(MemoryCap::fit_to_platform) {
        Ok(cap) => Some(cap),
        Err(e) => {
            tracing::warn!(error = %e, "running without a memory cap");
            None
        }
    }
}

/// Wait for exit while draining both pipes, so a chatty child cannot block.
async fn wait_and_capture(child: &mut Child) -> Result<(ExitStatus, CapturedOutput)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (status, stdout, stderr) = tokio::try_join!(child.wait(), drain(stdout), drain(stderr))?;
    Ok((status, CapturedOutput::from_bytes(&stdout, &stderr)))
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_process_group(pid);
    }
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "child already reaped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_script_uses_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ExecutionLimits::builder().scratch_dir(dir.path()).build();

        let file = write_script("print('hi')\n", &limits).unwrap();
        let path = file.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().unwrap(), "py");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print('hi')\n");

        remove_script(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ExecutionLimits::builder()
            .interpreter_path("definitely-not-an-interpreter-4f1c")
            .scratch_dir(dir.path())
            .build();

        let err = launch("print(1)\n", &limits).await.unwrap_err();
        assert!(matches!(err, SandboxError::InterpreterNotFound(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
