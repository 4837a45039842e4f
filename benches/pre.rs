//! Benchmark for the partial redundancy elimination pass.
//!
//! Builds a ladder of diamonds - the worst reasonable case for factor
//! placement, since every join gets a factor and every other rung carries
//! a partially redundant expression - and measures a full pass run.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use ssapre::{
    ir::{BinaryOp, Function, FunctionBuilder, Type},
    SsaPre,
};

/// A chain of `rungs` diamonds. Odd rungs compute `x + y` in their left
/// branch; every join recomputes it.
fn ladder(rungs: usize) -> Function {
    let mut b = FunctionBuilder::new("ladder", &[Type::I32, Type::I32, Type::I1]);
    let (x, y, c) = (b.args()[0], b.args()[1], b.args()[2]);

    let mut current = b.create_block();
    for rung in 0..rungs {
        let left = b.create_block();
        let right = b.create_block();
        let join = b.create_block();

        b.switch_to(current);
        b.branch(c, left, right);

        b.switch_to(left);
        if rung % 2 == 1 {
            b.binary(BinaryOp::Add, x, y);
        }
        b.jump(join);

        b.switch_to(right);
        b.jump(join);

        b.switch_to(join);
        b.binary(BinaryOp::Add, x, y);
        current = join;
    }
    b.switch_to(current);
    b.ret(None);

    b.finish().expect("ladder is well-formed")
}

fn bench_pre(c: &mut Criterion) {
    let mut group = c.benchmark_group("ssapre");

    for rungs in [8, 64] {
        group.bench_function(format!("ladder_{rungs}"), |bencher| {
            bencher.iter_batched(
                || ladder(rungs),
                |mut func| SsaPre::run(&mut func).expect("pass succeeds"),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pre);
criterion_main!(benches);
