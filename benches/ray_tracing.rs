use criterion::*;
use optrace::{
    Builder, ElementBuilder, FromBuilder, OpticalTrain, RayBatch, SourceBuilder, SurfaceBuilder,
};

fn cassegrain() -> OpticalTrain {
    OpticalTrain::builder()
        .pupil_size(8.4)
        .element(ElementBuilder::mirror(
            "M1",
            SurfaceBuilder::asphere(36., -0.9982857, vec![1e-9]).outer(4.2),
        ))
        .element(ElementBuilder::mirror(
            "M2",
            SurfaceBuilder::quadric(-4.2, -0.71692784).origin([0., 0., 20.26247614]).outer(0.55),
        ))
        .element(ElementBuilder::detector(
            "D",
            SurfaceBuilder::plane().vertex(-5.830),
        ))
        .build()
        .unwrap()
}

#[inline]
fn ray_tracing_fn(train: &OpticalTrain, rays: &RayBatch) -> RayBatch {
    let mut rays = rays.clone();
    train.trace(&mut rays).unwrap();
    rays
}

pub fn ray_tracing(c: &mut Criterion) {
    let _ = env_logger::try_init();
    let train = cassegrain();
    let mut group = c.benchmark_group("ray tracing");
    for n in [64usize, 256, 1024] {
        let rays = SourceBuilder::new()
            .optic(&train)
            .wavelength(500e-9)
            .grid(n)
            .build()
            .unwrap();
        group.throughput(Throughput::Elements(rays.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &rays, |b, rays| {
            b.iter(|| ray_tracing_fn(&train, rays))
        });
    }
    group.finish();
}

criterion_group!(benches, ray_tracing);
criterion_main!(benches);
