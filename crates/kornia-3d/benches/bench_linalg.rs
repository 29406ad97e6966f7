use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use kornia_3d::{linalg, transforms::EuclideanTransform};

// transform point by point through the quaternion
fn transform_points_apply(
    src_points: &[[f64; 3]],
    transform: &EuclideanTransform,
    dst_points: &mut [[f64; 3]],
) {
    for (point_dst, point_src) in dst_points.iter_mut().zip(src_points.iter()) {
        *point_dst = transform.apply(point_src);
    }
}

fn bench_transform_points(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_points");

    let transform = EuclideanTransform::from_axis_angle([0.3, 0.2, 1.0], 0.7, [1.0, -2.0, 0.5]);

    for num_points in [1000, 10000, 100000, 500000].iter() {
        group.throughput(criterion::Throughput::Elements(*num_points as u64));
        let parameter_string = format!("{}", num_points);

        let src_points = (0..*num_points)
            .map(|i| {
                let x = i as f64;
                [x.sin(), x.cos(), x * 1e-3]
            })
            .collect::<Vec<_>>();
        let mut dst_points = vec![[0.0; 3]; src_points.len()];

        group.bench_function(BenchmarkId::new("matmul", &parameter_string), |b| {
            b.iter(|| {
                linalg::transform_points(&src_points, &transform, &mut dst_points).unwrap();
                black_box(&dst_points);
            });
        });

        group.bench_function(BenchmarkId::new("apply", &parameter_string), |b| {
            b.iter(|| {
                transform_points_apply(&src_points, &transform, &mut dst_points);
                black_box(&dst_points);
            });
        });
    }
}

criterion_group!(benches, bench_transform_points);
criterion_main!(benches);
