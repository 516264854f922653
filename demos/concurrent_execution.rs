//! Example of running many sandboxed executions concurrently.
//!
//! Every execution gets its own interpreter process and temporary script, so
//! one executor can be cloned into as many tasks as the host can handle.
//!
//! Run with: cargo run --example concurrent_execution
//!
//! Note: Requires `python3` on PATH.

use std::time::{Duration, Instant};

use python_sandbox_rs::prelude::*;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Concurrent Execution Example ===\n");

    let limits = ExecutionLimits::builder()
        .timeout(Duration::from_secs(10))
        .max_memory_mb(128)
        .build();
    let executor = SandboxExecutor::new(limits)?;

    let tasks = vec![
        ("Task 1", "sum(i ** 2 for i in range(input_data['n']))", "Sum of squares"),
        ("Task 2", "len([x for x in range(input_data['n']) if x % 3 == 0])", "Count divisible by 3"),
        ("Task 3", "''.join(chr(65 + i % 26) for i in range(input_data['n']))", "Generate letters"),
        ("Task 4", "max(i * (input_data['n'] - i) for i in range(input_data['n'] + 1))", "Maximum product"),
    ];

    println!("Starting {} concurrent tasks...\n", tasks.len());
    let start = Instant::now();

    let mut handles = Vec::new();
    for (i, (name, expression, description)) in tasks.into_iter().enumerate() {
        let executor = executor.clone();
        let handle = tokio::spawn(async move {
            let code = format!("def main():\n    return {}\n", expression);
            let input = json!({"n": 50 * (i + 1)});
            let result = executor.execute(&code, input.as_object()).await?;

            Ok::<_, SandboxError>((name, description, result.result, result.metadata.duration))
        });
        handles.push(handle);
    }

    println!("Results:");
    println!("{:-<60}", "");
    for handle in handles {
        match handle.await {
            Ok(Ok((name, description, value, duration))) => {
                println!("{}: {} = {:?} (took {:?})", name, description, value, duration);
            }
            Ok(Err(e)) => println!("Task error: {}", e),
            Err(e) => println!("Join error: {}", e),
        }
    }
    println!("{:-<60}", "");

    println!("\nTotal wall-clock time: {:?}", start.elapsed());
    Ok(())
}
