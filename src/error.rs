//! Error types for the Python sandbox.

use std::time::Duration;

use thiserror::Error;

use crate::sandbox::executor::ExecutionState;

/// Prefix the harness writes in front of the message of an uncaught exception.
pub const ERROR_LINE_PREFIX: &str = "ERROR: ";

/// Errors that can occur during sandbox execution.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The submitted code could not be parsed.
    #[error("syntax error in code: {0}")]
    SyntaxViolation(String),

    /// The submitted code imports a module outside the allowlist.
    #[error("import of '{imported}' is not allowed (module '{module}' is not in the allowlist)")]
    ImportViolation {
        /// Top-level module name that was checked against the allowlist.
        module: String,
        /// The full dotted name as written in the import statement.
        imported: String,
    },

    /// The execution exceeded the configured wall-clock limit and was killed.
    #[error("code execution exceeded time limit of {0:?}")]
    TimeoutExceeded(Duration),

    /// The interpreter exited with a non-zero status.
    #[error("code execution failed with error:\n{stderr}")]
    ExecutionFailed {
        /// Everything the child wrote to stderr.
        stderr: String,
        /// Exit code, or `None` when the child was terminated by a signal.
        exit_code: Option<i32>,
    },

    /// The text between the result markers is not valid JSON.
    #[error("failed to parse execution result: {0}")]
    ResultParse(#[source] serde_json::Error),

    /// The memory cap could not be applied on this platform.
    ///
    /// Never returned from an execution; reported as a warning and the child
    /// runs without the cap.
    #[error("resource limits unavailable: {0}")]
    ResourceLimitUnavailable(String),

    /// I/O error while preparing or talking to the child process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The interpreter program could not be found.
    #[error("Python interpreter not found: {0}")]
    InterpreterNotFound(String),
}

impl SandboxError {
    /// Decode the Python exception recorded in the stderr of a failed execution.
    pub fn python_exception(&self) -> Option<PythonException> {
        match self {
            SandboxError::ExecutionFailed { stderr, .. } => parse_python_exception(stderr),
            _ => None,
        }
    }

    /// The state of the execution state machine this error terminated in.
    pub fn terminal_state(&self) -> ExecutionState {
        match self {
            SandboxError::SyntaxViolation(_) | SandboxError::ImportViolation { .. } => {
                ExecutionState::Validating
            }
            SandboxError::TimeoutExceeded(_) => ExecutionState::TimedOut,
            SandboxError::ExecutionFailed { .. } => ExecutionState::Crashed,
            SandboxError::ResultParse(_) => ExecutionState::ParseFailed,
            SandboxError::Config(_) => ExecutionState::Idle,
            SandboxError::ResourceLimitUnavailable(_)
            | SandboxError::Io(_)
            | SandboxError::InterpreterNotFound(_) => ExecutionState::Spawned,
        }
    }

    /// Check if this error represents a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SandboxError::TimeoutExceeded(_))
    }

    /// Check if this error was raised by static validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SandboxError::SyntaxViolation(_) | SandboxError::ImportViolation { .. }
        )
    }

    /// Check if this error represents a disallowed import.
    pub fn is_import_violation(&self) -> bool {
        matches!(self, SandboxError::ImportViolation { .. })
    }

    /// Check if the child exited with a failure status.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, SandboxError::ExecutionFailed { .. })
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

/// An uncaught exception reported by the harness on stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonException {
    /// Exception class name, e.g. `ValueError`. Empty if no traceback was found.
    pub exception_type: String,
    /// The message from the `ERROR:` line, falling back to the traceback's last line.
    pub message: String,
    /// The traceback text, if one was printed.
    pub traceback: Option<String>,
}

/// Parse a Python exception from the stderr of a failed execution.
///
/// Understands the harness format (`ERROR: <message>` followed by a traceback)
/// as well as a bare traceback written by the interpreter itself.
pub fn parse_python_exception(stderr: &str) -> Option<PythonException> {
    if stderr.trim().is_empty() {
        return None;
    }

    let lines: Vec<&str> = stderr.lines().collect();

    let harness_message = lines
        .iter()
        .rev()
        .find_map(|line| line.strip_prefix(ERROR_LINE_PREFIX))
        .map(|msg| msg.trim().to_string());

    let traceback_start = lines
        .iter()
        .rposition(|line| line.starts_with("Traceback (most recent call last):"));

    // The exception line is the last unindented line after the traceback header.
    let exception_line = traceback_start.and_then(|start| {
        lines[start + 1..]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, line)| !line.is_empty() && !line.starts_with(' ') && looks_like_exception(line))
            .map(|(offset, line)| (start + 1 + offset, *line))
    });

    let (exception_type, traceback_message, traceback) = match (traceback_start, exception_line) {
        (Some(start), Some((end, line))) => {
            let (ty, msg) = split_exception_line(line);
            (ty, msg, Some(lines[start..=end].join("\n")))
        }
        _ => (String::new(), String::new(), None),
    };

    if harness_message.is_none() && traceback.is_none() {
        return None;
    }

    Some(PythonException {
        exception_type,
        message: harness_message.unwrap_or(traceback_message),
        traceback,
    })
}

fn split_exception_line(line: &str) -> (String, String) {
    match line.find(':') {
        Some(colon) => (
            line[..colon].trim().to_string(),
            line[colon + 1..].trim().to_string(),
        ),
        None => (line.trim().to_string(), String::new()),
    }
}

/// Check if a line looks like `SomeError: message` or a bare exception name.
fn looks_like_exception(line: &str) -> bool {
    let name = line.split(':').next().unwrap_or_default().trim();
    let name = name.rsplit('.').next().unwrap_or(name);

    if !name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        return false;
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }

    const SUFFIXES: [&str; 3] = ["Error", "Exception", "Warning"];
    const STANDALONE: [&str; 4] = [
        "KeyboardInterrupt",
        "SystemExit",
        "StopIteration",
        "GeneratorExit",
    ];

    SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) || STANDALONE.contains(&name)
}
