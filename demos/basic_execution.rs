//! Basic example of executing a Python snippet in the sandbox.
//!
//! Run with: cargo run --example basic_execution
//!
//! Set `RUST_LOG=python_sandbox_rs=debug` to watch the execution stages.
//! Note: Requires `python3` on PATH.

use python_sandbox_rs::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let limits = ExecutionLimits::builder()
        .max_execution_time(5)
        .max_memory_mb(100)
        .allowed_modules(["math", "random"])
        .build();
    println!("Creating executor with limits: {:?}", limits);
    let executor = SandboxExecutor::new(limits)?;

    println!("\n=== Test 1: Input data ===");
    let code = r#"
def main():
    numbers = input_data.get('numbers', list(range(10)))
    return {'sum': sum(numbers), 'length': len(numbers)}
"#;
    let input = json!({"numbers": [1, 2, 3, 4]});
    let result = executor.execute(code, input.as_object()).await?;
    println!("result: {:?}", result.result);
    println!("duration: {:?}", result.metadata.duration);
    println!("memory capped: {}", result.metadata.memory_capped);

    println!("\n=== Test 2: Diagnostic output ===");
    let code = r#"
import math

def main():
    for i in range(3):
        print(f"step {i}")
    return math.factorial(10)
"#;
    let result = executor.execute(code, None).await?;
    println!("result: {:?}", result.result);
    println!("stdout:\n{}", result.stdout);

    println!("\n=== Test 3: Disallowed import ===");
    match executor.execute("import os\ndef main():\n    return os.getcwd()\n", None).await {
        Ok(result) => println!("unexpected success: {:?}", result.result),
        Err(e) => println!("rejected: {}", e),
    }

    println!("\n=== Test 4: Exception in main ===");
    match executor
        .execute("def main():\n    raise ValueError('test error')\n", None)
        .await
    {
        Ok(result) => println!("unexpected success: {:?}", result.result),
        Err(e) => match e.python_exception() {
            Some(exc) => println!("{}: {}", exc.exception_type, exc.message),
            None => println!("execution error: {}", e),
        },
    }

    Ok(())
}
