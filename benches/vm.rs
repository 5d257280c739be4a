//! Benchmarks for compiling formula batches and running chunks on the VM.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use formulang::bytecode::{Chunk, VM};
use formulang::functions::FunctionRegistry;
use formulang::{DefaultEnvironment, Environment, Runner};

/// `groups` independent copies of a four-formula dependency chain.
fn batch(groups: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(groups * 4);
    for i in 0..groups {
        lines.push(format!("x{i} = y{i} = a{i} + b{i} * c{i}"));
        lines.push(format!("c{i} = n{i} + w{i} + b{i}"));
        lines.push(format!("b{i} = a{i} * 2"));
        lines.push(format!("a{i} = m{i} + n{i}"));
    }
    lines
}

fn environment(groups: usize) -> DefaultEnvironment {
    let mut env = DefaultEnvironment::new();
    for i in 0..groups {
        env.put_int(&format!("m{i}"), 2);
        env.put_int(&format!("n{i}"), 4);
        env.put_int(&format!("w{i}"), 6);
    }
    env
}

fn compile_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let runner = Runner::new();

    for groups in [10, 100, 1000] {
        let lines = batch(groups);
        group.bench_with_input(BenchmarkId::from_parameter(groups * 4), &lines, |b, lines| {
            b.iter(|| runner.compile_source(black_box(lines)).expect("compile error"))
        });
    }

    group.finish();
}

fn execute_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm_execute");
    let runner = Runner::new();
    let functions = FunctionRegistry::with_builtins();

    for groups in [10, 100, 1000] {
        let chunk = runner.compile_source(&batch(groups)).expect("compile error");
        group.bench_with_input(BenchmarkId::from_parameter(groups * 4), &chunk, |b, chunk| {
            let mut vm = VM::new();
            b.iter_batched(
                || environment(groups),
                |mut env| vm.execute(black_box(chunk), &mut env, &functions).expect("vm error"),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn decode_chunk(c: &mut Criterion) {
    let runner = Runner::new();
    let bytes = runner
        .compile_source(&batch(1000))
        .expect("compile error")
        .to_bytes();

    c.bench_function("chunk_from_bytes", |b| {
        b.iter(|| Chunk::from_bytes(black_box(&bytes)).expect("format error"))
    });
}

criterion_group!(benches, compile_batch, execute_chunk, decode_chunk);
criterion_main!(benches);
