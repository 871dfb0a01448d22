//! Benchmarks comparing the tree-walking interpreter against the bytecode VM.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use runa::{run_with_options, ExecutionMode};

/// Arithmetic-heavy straight-line code.
const ARITHMETIC: &str = "
let a = 1234;
let b = 5678;
let c = a * b - a / 2 + b * 3;
let d = c * c - a * b + 99;
let e = d / 7 + c * 3 - b / 2;
let f = e * a - d * 2 + c / 3;
(f + e + d + c + b + a) * 17 - f / 5 + e * 2 - d / 9;
";

/// Array construction and indexing.
const ARRAYS: &str = "
let xs = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
let ys = [xs[0] + xs[15], xs[1] + xs[14], xs[2] + xs[13], xs[3] + xs[12],
          xs[4] + xs[11], xs[5] + xs[10], xs[6] + xs[9], xs[7] + xs[8]];
let zs = [ys[0] * ys[7], ys[1] * ys[6], ys[2] * ys[5], ys[3] * ys[4]];
zs[0] + zs[1] + zs[2] + zs[3] + len(xs) + len(ys) + len(zs);
";

/// Call-heavy code: nested non-recursive function application.
const CALLS: &str = "
let add = fn(a, b) { a + b };
let mul = fn(a, b) { a * b };
let sq = fn(x) { mul(x, x) };
let poly = fn(x) { add(sq(x), add(mul(3, x), 7)) };
let chain = fn(x) { poly(poly(poly(x))) };
add(chain(1), add(chain(2), add(chain(3), chain(4))));
";

fn run_treewalk(source: &str) {
    run_with_options(source, ExecutionMode::TreeWalk, false).expect("runtime error");
}

fn run_vm(source: &str) {
    run_with_options(source, ExecutionMode::Bytecode, false).expect("runtime error");
}

fn bench_workload(c: &mut Criterion, name: &str, source: &str) {
    let mut group = c.benchmark_group(name);
    group.bench_function("treewalk", |b| b.iter(|| run_treewalk(black_box(source))));
    group.bench_function("vm", |b| b.iter(|| run_vm(black_box(source))));
    group.finish();
}

fn arithmetic(c: &mut Criterion) {
    bench_workload(c, "arithmetic", ARITHMETIC);
}

fn arrays(c: &mut Criterion) {
    bench_workload(c, "arrays", ARRAYS);
}

fn calls(c: &mut Criterion) {
    bench_workload(c, "calls", CALLS);
}

criterion_group!(benches, arithmetic, arrays, calls);
criterion_main!(benches);
