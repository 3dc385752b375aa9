mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tinyc::backend;

fn bench_backends(c: &mut Criterion) {
    for (label, path) in common::workloads() {
        let program = common::load_program(path);

        for backend in backend::backends() {
            c.bench_function(&format!("backend_{}_{label}", backend.name()), |b| {
                let prepared = backend.prepare(&program).expect("prepare");
                b.iter(|| {
                    let variables = black_box(&prepared).run().expect("run");
                    black_box(variables);
                })
            });
        }
    }
}

criterion_group!(benches, bench_backends);
criterion_main!(benches);
