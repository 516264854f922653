//! Execution limits with builder pattern.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SandboxError};

/// Modules a snippet may import when no allowlist is configured.
pub const DEFAULT_ALLOWED_MODULES: [&str; 8] = [
    "math",
    "random",
    "datetime",
    "json",
    "collections",
    "statistics",
    "re",
    "itertools",
];

/// Limits and allowlist applied to every execution of a [`SandboxExecutor`].
///
/// Built once and then owned by the executor; there are no setters.
///
/// [`SandboxExecutor`]: crate::sandbox::executor::SandboxExecutor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    timeout: Duration,
    max_memory_mb: u64,
    allowed_modules: BTreeSet<String>,
    interpreter_path: PathBuf,
    scratch_dir: PathBuf,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_memory_mb: 512,
            allowed_modules: DEFAULT_ALLOWED_MODULES
                .iter()
                .map(|m| m.to_string())
                .collect(),
            interpreter_path: PathBuf::from("python3"),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl ExecutionLimits {
    /// Create a new builder for ExecutionLimits.
    pub fn builder() -> ExecutionLimitsBuilder {
        ExecutionLimitsBuilder::default()
    }

    /// Maximum wall-clock time of a single execution.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Virtual memory cap for the child, in megabytes.
    pub fn max_memory_mb(&self) -> u64 {
        self.max_memory_mb
    }

    /// Top-level module names a snippet may import.
    pub fn allowed_modules(&self) -> &BTreeSet<String> {
        &self.allowed_modules
    }

    /// Check a top-level module name against the allowlist.
    pub fn is_module_allowed(&self, module: &str) -> bool {
        self.allowed_modules.contains(module)
    }

    /// Interpreter program launched for every execution.
    pub fn interpreter_path(&self) -> &Path {
        &self.interpreter_path
    }

    /// Directory the temporary scripts are created in.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Reject limits that would make every execution fail.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(SandboxError::Config(
                "max execution time must be greater than zero".to_string(),
            ));
        }
        if self.max_memory_mb == 0 {
            return Err(SandboxError::Config(
                "max memory must be greater than zero".to_string(),
            ));
        }
        if self.interpreter_path.as_os_str().is_empty() {
            return Err(SandboxError::Config(
                "interpreter path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for creating ExecutionLimits instances.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLimitsBuilder {
    timeout: Option<Duration>,
    max_memory_mb: Option<u64>,
    allowed_modules: Option<BTreeSet<String>>,
    interpreter_path: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
}

impl ExecutionLimitsBuilder {
    /// Set the maximum execution time.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the maximum execution time in whole seconds.
    pub fn max_execution_time(self, seconds: u64) -> Self {
        self.timeout(Duration::from_secs(seconds))
    }

    /// Set the virtual memory cap in megabytes.
    pub fn max_memory_mb(mut self, megabytes: u64) -> Self {
        self.max_memory_mb = Some(megabytes);
        self
    }

    /// Replace the allowlist.
    pub fn allowed_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    /// Add one module to the allowlist, starting from the default set if none was given.
    pub fn allow_module(mut self, module: impl Into<String>) -> Self {
        self.allowed_modules
            .get_or_insert_with(|| ExecutionLimits::default().allowed_modules)
            .insert(module.into());
        self
    }

    /// Set the interpreter program.
    pub fn interpreter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.interpreter_path = Some(path.into());
        self
    }

    /// Set the directory temporary scripts are written to.
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Build the ExecutionLimits.
    pub fn build(self) -> ExecutionLimits {
        let default = ExecutionLimits::default();
        ExecutionLimits {
            timeout: self.timeout.unwrap_or(default.timeout),
            max_memory_mb: self.max_memory_mb.unwrap_or(default.max_memory_mb),
            allowed_modules: self.allowed_modules.unwrap_or(default.allowed_modules),
            interpreter_path: self.interpreter_path.unwrap_or(default.interpreter_path),
            scratch_dir: self.scratch_dir.unwrap_or(default.scratch_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.timeout(), Duration::from_secs(30));
        assert_eq!(limits.max_memory_mb(), 512);
        assert_eq!(limits.allowed_modules().len(), DEFAULT_ALLOWED_MODULES.len());
        assert!(limits.is_module_allowed("statistics"));
        assert!(!limits.is_module_allowed("os"));
        assert_eq!(limits.interpreter_path(), Path::new("python3"));
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let limits = ExecutionLimits::builder()
            .max_execution_time(5)
            .max_memory_mb(100)
            .allowed_modules(["math", "random"])
            .interpreter_path("/usr/bin/python3")
            .build();

        assert_eq!(limits.timeout(), Duration::from_secs(5));
        assert_eq!(limits.max_memory_mb(), 100);
        assert!(limits.is_module_allowed("math"));
        assert!(!limits.is_module_allowed("json"));
        assert_eq!(limits.interpreter_path(), Path::new("/usr/bin/python3"));
    }

    #[test]
    fn test_allow_module_extends_default_set() {
        let limits = ExecutionLimits::builder().allow_module("time").build();
        assert!(limits.is_module_allowed("time"));
        assert!(limits.is_module_allowed("math"));
    }

    #[test]
    fn test_validate_rejects_degenerate_limits() {
        let zero_time = ExecutionLimits::builder().timeout(Duration::ZERO).build();
        assert!(matches!(zero_time.validate(), Err(SandboxError::Config(_))));

        let zero_memory = ExecutionLimits::builder().max_memory_mb(0).build();
        assert!(matches!(zero_memory.validate(), Err(SandboxError::Config(_))));

        let no_interpreter = ExecutionLimits::builder().interpreter_path("").build();
        assert!(matches!(no_interpreter.validate(), Err(SandboxError::Config(_))));
    }
}
