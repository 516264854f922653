//! # Python Sandbox
//!
//! Runs untrusted, machine-generated Python snippets in a fresh, resource-bounded
//! interpreter process and returns the value the snippet's `main()` produced.
//!
//! Every execution goes through four stages:
//!
//! - **Import validation**: the code is parsed in-process and rejected if it
//!   imports a module outside the allowlist. Nothing is spawned for rejected code.
//! - **Harness generation**: the code is wrapped so the input payload is bound to
//!   `input_data` and the return value of `main()` is printed between
//!   `RESULT_START` and `RESULT_END` markers.
//! - **Isolated launch**: the script goes to a temporary file and a new
//!   interpreter runs it with an address-space cap and a wall-clock timeout.
//! - **Result extraction**: the marker region of stdout is decoded as JSON.
//!
//! ## Example
//!
//! ```rust,ignore
//! use python_sandbox_rs::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let limits = ExecutionLimits::builder()
//!         .max_execution_time(5)
//!         .max_memory_mb(100)
//!         .allowed_modules(["math", "random"])
//!         .build();
//!
//!     let executor = SandboxExecutor::new(limits)?;
//!     let code = "def main():\n    return {'sum': sum(input_data['numbers'])}\n";
//!     let input = json!({"numbers": [1, 2, 3, 4]});
//!     let result = executor.execute(code, input.as_object()).await?;
//!
//!     assert_eq!(result.result, Some(json!({"sum": 10})));
//!     Ok(())
//! }
//! ```
//!
//! ## Security Model
//!
//! The process boundary is the security barrier; untrusted code is never
//! evaluated in the calling process. On top of it:
//!
//! 1. **Import allowlist**: static check of `import` statements only. Dynamic
//!    imports (`__import__`, `exec`) are not detected.
//! 2. **Memory cap**: `RLIMIT_AS` in the child. Best effort: where the platform
//!    cannot apply it, a warning is logged and the child runs uncapped.
//! 3. **Timeout**: the child's process group is killed when the limit elapses.
//!
//! There is no namespace, seccomp or network isolation, and no bound on the
//! number of concurrent executions.

pub mod error;
pub mod prelude;
pub mod sandbox;

// Re-export main types at crate root for convenience
pub use error::{parse_python_exception, PythonException, Result, SandboxError};
pub use sandbox::config::{ExecutionLimits, ExecutionLimitsBuilder, DEFAULT_ALLOWED_MODULES};
pub use sandbox::executor::{
    ExecutionMetadata, ExecutionRequest, ExecutionResult, ExecutionState, SandboxExecutor,
};
pub use sandbox::harness::{INPUT_BINDING, RESULT_END, RESULT_START};
pub use sandbox::validator::{find_import_violations, validate_imports, ImportViolation};
