use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use subgroup_test_support::{bare_engine, reload, spawn, BareEngine};

/// Wide tree: one root with `n` direct children, so every insertion and
/// removal renumbers the whole sibling slice.
fn wide_tree(n: usize) -> BareEngine {
    let mut engine = bare_engine();
    let mut root = spawn(&mut engine);
    engine.init_tree(&mut root).unwrap();
    for _ in 0..n {
        let mut parent = reload(&engine, root.record_id());
        let mut child = spawn(&mut engine);
        engine.add_leaf(&mut parent, &mut child).unwrap();
    }
    engine
}

fn bench_add_leaf(c: &mut Criterion) {
    for n in [16usize, 128] {
        c.bench_function(&format!("add_leaf/{n}-children"), |b| {
            b.iter_batched(
                || wide_tree(n),
                |mut engine| {
                    let root_id = subgroup_core::RecordId(1);
                    let mut parent = reload(&engine, root_id);
                    let mut child = spawn(&mut engine);
                    engine.add_leaf(&mut parent, &mut child).unwrap();
                    engine
                },
                BatchSize::SmallInput,
            );
        });
    }
}

fn bench_remove_leaf(c: &mut Criterion) {
    for n in [16usize, 128] {
        c.bench_function(&format!("remove_leaf/{n}-children"), |b| {
            b.iter_batched(
                || {
                    let engine = wide_tree(n);
                    // Remove the leftmost child so the whole slice shifts.
                    let record = reload(&engine, subgroup_core::RecordId(2));
                    (engine, record)
                },
                |(mut engine, mut record)| {
                    engine.remove_leaf(&mut record, true).unwrap();
                    engine
                },
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(benches, bench_add_leaf, bench_remove_leaf);
criterion_main!(benches);
