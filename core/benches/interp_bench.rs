use criterion::{black_box, criterion_group, criterion_main, Criterion};
use smalt_core::Vm;

const PRELUDE: &str = r#"
Number >> timesRepeat: aBlock [
    | i |
    i := 0.
    [i < self] whileTrue: [aBlock value. i := i + 1].
    ^ self
]
"#;

fn bench_arith_loop(c: &mut Criterion) {
    c.bench_function("loop_sum_1k", |b| {
        let mut vm = Vm::new();
        vm.eval_statements(PRELUDE).unwrap();
        b.iter(|| {
            let v = vm
                .doit("s := 0. 1000 timesRepeat: [s := s + 1]. s")
                .unwrap();
            black_box(v)
        });
    });
}

fn bench_dispatch(c: &mut Criterion) {
    c.bench_function("method_dispatch_1k", |b| {
        let mut vm = Vm::new();
        vm.eval_statements(PRELUDE).unwrap();
        vm.eval_statements(
            "Point := Object derive: #(x y). \
             Point >> moveBy: dx and: dy [ x := x + dx. y := y + dy. ^ self ]. \
             p := Point new. p x: 0. p y: 0",
        )
        .unwrap();
        b.iter(|| {
            let v = vm
                .doit("1000 timesRepeat: [p moveBy: 1 and: 2]. p x")
                .unwrap();
            black_box(v)
        });
    });
}

fn bench_block_calls(c: &mut Criterion) {
    c.bench_function("block_value_1k", |b| {
        let mut vm = Vm::new();
        vm.eval_statements(PRELUDE).unwrap();
        vm.eval_statements("inc := [:n | n + 1]").unwrap();
        b.iter(|| {
            let v = vm
                .doit("s := 0. 1000 timesRepeat: [s := inc value: s]. s")
                .unwrap();
            black_box(v)
        });
    });
}

criterion_group!(benches, bench_arith_loop, bench_dispatch, bench_block_calls);
criterion_main!(benches);
