use criterion::{Criterion, black_box, criterion_group, criterion_main};

use frost_geom::Vec3;
use frost_mesh::kernels::MetaballField;
use frost_mesh::{ExtractMode, ExtractSettings, TriMesh, extract_surface};
use frost_runtime::{BuildProgress, CancelToken, NullProgress, WorkerPool};

// Deterministic jittered lattice of particles.
fn cloud(n: usize) -> (Vec<Vec3>, Vec<f32>) {
    let mut seed = 0x9E37_79B9u32;
    let mut next = || {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        seed as f32 / u32::MAX as f32
    };
    let side = (n as f32).cbrt().ceil() as usize;
    let mut pos = Vec::with_capacity(n);
    for k in 0..n {
        let (i, j, l) = (k % side, (k / side) % side, k / (side * side));
        pos.push(Vec3::new(
            i as f32 * 0.6 + next() * 0.2,
            j as f32 * 0.6 + next() * 0.2,
            l as f32 * 0.6 + next() * 0.2,
        ));
    }
    (pos, vec![0.5; n])
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_metaballs");
    let (pos, radii) = cloud(2000);
    let field = MetaballField::new(pos, radii, 1.5, 0.3).unwrap();
    let pool = WorkerPool::new(0).unwrap();
    for mode in [ExtractMode::Dense, ExtractMode::Sparse] {
        let mut settings = ExtractSettings::new(0.1);
        settings.force_mode = Some(mode);
        settings.refinement = 2;
        group.bench_function(mode.as_str(), |b| {
            b.iter(|| {
                let progress = BuildProgress::new(&NullProgress, CancelToken::new());
                let mut out = TriMesh::default();
                let stats = extract_surface(&field, &settings, &pool, &progress, (0.0, 100.0), &mut out)
                    .unwrap();
                black_box((stats, out));
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
