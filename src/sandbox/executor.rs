//! Execution facade: validate, wrap, launch, extract.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{Result, SandboxError};
use crate::sandbox::config::ExecutionLimits;
use crate::sandbox::{extract, harness, launcher, validator};

/// States an execution passes through.
///
/// `Done`, `TimedOut`, `Crashed` and `ParseFailed` are terminal. There is no
/// retry; a new request starts again from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Validating,
    Materializing,
    Spawned,
    Completed,
    TimedOut,
    Crashed,
    Extracting,
    Done,
    ParseFailed,
}

/// Code and input submitted for one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionRequest {
    /// Source code defining a zero-argument `main()`.
    pub code: String,
    /// Payload bound to `input_data` inside the script.
    pub input: Option<Map<String, Value>>,
}

impl ExecutionRequest {
    /// Create a request without input.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            input: None,
        }
    }

    /// Attach an input payload.
    pub fn with_input(mut self, input: Map<String, Value>) -> Self {
        self.input = Some(input);
        self
    }
}

/// Metadata about a finished execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionMetadata {
    /// Wall-clock time the interpreter ran.
    pub duration: Duration,
    /// Exit code of the interpreter.
    pub exit_code: i32,
    /// True when the memory cap fit the platform limits and was installed in
    /// the child; false when the child ran uncapped.
    pub memory_capped: bool,
}

/// Result of a successful execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Value returned by `main()`, if the result markers were printed.
    pub result: Option<Value>,
    /// Full captured stdout, markers included.
    pub stdout: String,
    /// Full captured stderr.
    pub stderr: String,
    /// Execution metadata.
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    /// Split into the `(result, stdout, stderr)` triple.
    pub fn into_parts(self) -> (Option<Value>, String, String) {
        (self.result, self.stdout, self.stderr)
    }
}

/// Runs untrusted snippets in a fresh interpreter process per call.
///
/// Cloning is cheap and clones share the same limits. Executions never share
/// files or processes, so any number may run concurrently; admission control is
/// left to the caller.
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    limits: Arc<ExecutionLimits>,
}

impl SandboxExecutor {
    /// Create an executor with the given limits.
    pub fn new(limits: ExecutionLimits) -> Result<Self> {
        limits.validate()?;
        Ok(Self {
            limits: Arc::new(limits),
        })
    }

    /// The limits applied to every execution.
    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Validate and run `code`, returning the value its `main()` returned.
    ///
    /// # Arguments
    /// * `code` - Source code defining a zero-argument `main()`
    /// * `input` - Optional payload bound to `input_data`
    ///
    /// # Errors
    /// Each stage fails with its own error kind and stops the pipeline: a
    /// rejected snippet never spawns a process, a timeout never yields a
    /// partial result.
    pub async fn execute(
        &self,
        code: &str,
        input: Option<&Map<String, Value>>,
    ) -> Result<ExecutionResult> {
        tracing::debug!(state = ?ExecutionState::Validating, "execution started");
        validator::validate_imports(code, self.limits.allowed_modules())?;

        tracing::debug!(state = ?ExecutionState::Materializing, "imports validated");
        let script = harness::wrap(code, input);

        tracing::debug!(state = ?ExecutionState::Spawned, "launching interpreter");
        let launched = launcher::launch(&script, &self.limits).await?;

        tracing::debug!(
            state = ?ExecutionState::Completed,
            duration = ?launched.duration,
            "interpreter finished"
        );
        let result = extract::extract(&launched.output.stdout)?;

        tracing::debug!(state = ?ExecutionState::Done, has_result = result.is_some(), "execution finished");
        Ok(ExecutionResult {
            result,
            stdout: launched.output.stdout,
            stderr: launched.output.stderr,
            metadata: ExecutionMetadata {
                duration: launched.duration,
                exit_code: launched.exit_code,
                memory_capped: launched.memory_capped,
            },
        })
    }

    /// Run an [`ExecutionRequest`].
    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        self.execute(&request.code, request.input.as_ref()).await
    }

    /// Blocking variant of [`execute`](Self::execute) for callers outside a runtime.
    ///
    /// Drives the execution on a private current-thread runtime. Must not be
    /// called from within an async context.
    pub fn execute_blocking(
        &self,
        code: &str,
        input: Option<&Map<String, Value>>,
    ) -> Result<ExecutionResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SandboxError::Io)?;
        runtime.block_on(self.execute(code, input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor_in(dir: &std::path::Path) -> SandboxExecutor {
        let limits = ExecutionLimits::builder()
            .max_execution_time(5)
            .allowed_modules(["math"])
            .scratch_dir(dir)
            .build();
        SandboxExecutor::new(limits).unwrap()
    }

    #[test]
    fn test_invalid_limits_are_rejected() {
        let limits = ExecutionLimits::builder().max_memory_mb(0).build();
        assert!(matches!(
            SandboxExecutor::new(limits),
            Err(SandboxError::Config(_))
        ));
    }

    #[test]
    fn test_syntax_error_creates_no_script() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_in(dir.path());

        let err = tokio_test::block_on(executor.execute("def main(:\n", None)).unwrap_err();
        assert!(matches!(err, SandboxError::SyntaxViolation(_)));
        assert_eq!(err.terminal_state(), ExecutionState::Validating);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_import_violation_creates_no_script() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_in(dir.path());

        let err = executor
            .execute_blocking("import os\ndef main():\n    return 1\n", None)
            .unwrap_err();
        assert!(matches!(err, SandboxError::ImportViolation { ref module, .. } if module == "os"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_request_builder() {
        let input = json!({"a": 1});
        let request = ExecutionRequest::new("def main():\n    return 1\n")
            .with_input(input.as_object().cloned().unwrap());
        assert_eq!(request.input.unwrap().get("a"), Some(&json!(1)));
    }
}
