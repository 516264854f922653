//! Benchmarks for the Python sandbox.
//!
//! Run with: cargo bench
//!
//! The execution benchmarks need `python3` on PATH and are skipped otherwise.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use python_sandbox_rs::prelude::*;
use python_sandbox_rs::sandbox::{extract, harness, validator};
use serde_json::json;
use std::time::Duration;
use tokio::runtime::Runtime;

const SNIPPET: &str = r#"
import math
import statistics
from collections import Counter

def main():
    numbers = input_data.get('numbers', [])
    counts = Counter(n % 3 for n in numbers)
    return {
        'mean': statistics.mean(numbers),
        'root': math.sqrt(sum(numbers)),
        'buckets': dict(counts),
    }
"#;

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Benchmark import validation on snippets of growing size.
fn bench_validation(c: &mut Criterion) {
    let limits = ExecutionLimits::default();
    let mut group = c.benchmark_group("validation");

    for functions in [1, 10, 100].iter() {
        let code: String = (0..*functions)
            .map(|i| format!("import math\ndef f{i}(x):\n    return math.sqrt(x) + {i}\n"))
            .collect();
        group.throughput(Throughput::Bytes(code.len() as u64));
        group.bench_with_input(BenchmarkId::new("functions", functions), &code, |b, code| {
            b.iter(|| validator::validate_imports(black_box(code), limits.allowed_modules()).unwrap());
        });
    }

    group.finish();
}

/// Benchmark harness generation with a sizeable input payload.
fn bench_harness(c: &mut Criterion) {
    let input = json!({
        "numbers": (0..1000).collect::<Vec<_>>(),
        "labels": (0..100).map(|i| format!("label \"{i}\"")).collect::<Vec<_>>(),
    });

    c.bench_function("harness_wrap", |b| {
        b.iter(|| harness::wrap(black_box(SNIPPET), input.as_object()));
    });
}

/// Benchmark result extraction from noisy output.
fn bench_extraction(c: &mut Criterion) {
    let mut stdout: String = (0..500).map(|i| format!("debug line {i}\n")).collect();
    stdout.push_str("RESULT_START\n");
    stdout.push_str(&json!({"values": (0..200).collect::<Vec<_>>()}).to_string());
    stdout.push_str("\nRESULT_END\n");

    c.bench_function("extract_result", |b| {
        b.iter(|| extract::extract(black_box(&stdout)).unwrap());
    });
}

/// Benchmark a full execution, interpreter startup included.
fn bench_execution(c: &mut Criterion) {
    if !python_available() {
        eprintln!("Skipping execution benchmark: python3 not found");
        return;
    }

    let rt = Runtime::new().unwrap();
    let limits = ExecutionLimits::builder()
        .timeout(Duration::from_secs(30))
        .build();
    let executor = SandboxExecutor::new(limits).unwrap();
    let input = json!({"numbers": [1, 2, 3, 4, 5, 6]});

    let mut group = c.benchmark_group("execution");
    group.sample_size(10);

    group.bench_function("statistics_snippet", |b| {
        b.iter(|| {
            let result = rt
                .block_on(executor.execute(SNIPPET, input.as_object()))
                .unwrap();
            black_box(result)
        });
    });

    for concurrency in [1, 4].iter() {
        group.throughput(Throughput::Elements(*concurrency as u64));
        group.bench_with_input(
            BenchmarkId::new("concurrent", concurrency),
            concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    rt.block_on(async {
                        let mut handles = Vec::new();
                        for _ in 0..concurrency {
                            let executor = executor.clone();
                            handles.push(tokio::spawn(async move {
                                executor.execute("def main():\n    return 1\n", None).await.unwrap()
                            }));
                        }
                        for handle in handles {
                            black_box(handle.await.unwrap());
                        }
                    });
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_validation,
    bench_harness,
    bench_extraction,
    bench_execution,
);

criterion_main!(benches);
