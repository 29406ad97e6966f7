use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use rand::{rngs::StdRng, Rng, SeedableRng};

use kornia_knn::{
    BruteForceSearch, DenseMatrix, KdTreeSearch, NearestNeighborSearch, SearchParams,
    DEFAULT_BUCKET_SIZE,
};

fn random_points(rng: &mut StdRng, num_points: usize) -> Vec<[f64; 3]> {
    (0..num_points)
        .map(|_| [rng.random(), rng.random(), rng.random()])
        .collect()
}

fn bench_knn(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn");
    let mut rng = StdRng::seed_from_u64(0);

    let queries = random_points(&mut rng, 1000);
    let query = DenseMatrix::from_columns(&queries);
    let params = SearchParams::default();

    for num_points in [1000, 10000, 100000].iter() {
        group.throughput(criterion::Throughput::Elements(queries.len() as u64));
        let parameter_string = format!("{}", num_points);

        let points = random_points(&mut rng, *num_points);
        let cloud = DenseMatrix::from_columns(&points);

        let mut indices = DenseMatrix::new(1, query.cols(), 0);
        let mut dists2 = DenseMatrix::new(1, query.cols(), 0.0);

        if *num_points <= 10000 {
            let brute_force = BruteForceSearch::new(cloud.clone());
            group.bench_function(BenchmarkId::new("brute_force", &parameter_string), |b| {
                b.iter(|| {
                    brute_force
                        .knn(&query, &mut indices, &mut dists2, None, &params)
                        .unwrap();
                    black_box(&indices);
                });
            });
        }

        let tree = KdTreeSearch::new(cloud, DEFAULT_BUCKET_SIZE).unwrap();
        group.bench_function(BenchmarkId::new("kdtree", &parameter_string), |b| {
            b.iter(|| {
                tree.knn(&query, &mut indices, &mut dists2, None, &params)
                    .unwrap();
                black_box(&indices);
            });
        });

        let kiddo_tree: ImmutableKdTree<f64, u32, 3, 32> = ImmutableKdTree::new_from_slice(&points);
        group.bench_function(BenchmarkId::new("kiddo", &parameter_string), |b| {
            b.iter(|| {
                let nearest = queries
                    .iter()
                    .map(|q| kiddo_tree.nearest_one::<kiddo::SquaredEuclidean>(q).item)
                    .collect::<Vec<_>>();
                black_box(nearest);
            });
        });
    }
}

criterion_group!(benches, bench_knn);
criterion_main!(benches);
