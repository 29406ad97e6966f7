use rayon::prelude::*;

use crate::{
    search::{check_sizes_knn, squared_distance, INVALID_INDEX, SELF_MATCH_EPSILON},
    BoundedPriorityQueue, DenseMatrix, KnnError, NearestNeighborSearch, SearchParams,
};

/// Nearest neighbor search checking the distance to every reference point.
///
/// `O(n * m * d)` per query batch. Exact regardless of `epsilon`, which makes
/// it the reference against which the k-d tree is tested.
#[derive(Debug, Clone)]
pub struct BruteForceSearch {
    cloud: DenseMatrix<f64>,
}

impl BruteForceSearch {
    /// Create a search over `cloud`, one reference point per column.
    pub fn new(cloud: DenseMatrix<f64>) -> Self {
        Self { cloud }
    }

    /// The reference cloud.
    pub fn cloud(&self) -> &DenseMatrix<f64> {
        &self.cloud
    }

    fn one_point_knn(
        &self,
        query: &[f64],
        heap: &mut BoundedPriorityQueue<usize>,
        max_radius2: f64,
        allow_self_match: bool,
    ) -> u64 {
        for j in 0..self.cloud.cols() {
            let dist = squared_distance(self.cloud.col(j), query);
            if dist <= max_radius2 && (allow_self_match || dist > SELF_MATCH_EPSILON) {
                heap.enqueue(j, dist);
            }
        }
        self.cloud.cols() as u64
    }
}

impl NearestNeighborSearch for BruteForceSearch {
    fn dimensions(&self) -> usize {
        self.cloud.rows()
    }

    fn len(&self) -> usize {
        self.cloud.cols()
    }

    fn knn(
        &self,
        query: &DenseMatrix<f64>,
        indices: &mut DenseMatrix<usize>,
        dists2: &mut DenseMatrix<f64>,
        max_radii: Option<&[f64]>,
        params: &SearchParams,
    ) -> Result<u64, KnnError> {
        let k = params.k;
        check_sizes_knn(
            self.dimensions(),
            self.len(),
            query,
            indices,
            dists2,
            max_radii,
            k,
        )?;

        let dims = self.dimensions();
        let examined = indices
            .as_mut_slice()
            .par_chunks_mut(k)
            .zip(dists2.as_mut_slice().par_chunks_mut(k))
            .enumerate()
            .map(|(i, (indices_col, dists2_col))| {
                let max_radius = max_radii.map_or(f64::INFINITY, |radii| radii[i]);
                let mut heap = BoundedPriorityQueue::new(k);
                let examined = self.one_point_knn(
                    &query.col(i)[..dims],
                    &mut heap,
                    max_radius * max_radius,
                    params.allow_self_match,
                );

                for (slot, item) in indices_col.iter_mut().zip(heap.items()) {
                    *slot = item.copied().unwrap_or(INVALID_INDEX);
                }
                for (slot, dist) in dists2_col.iter_mut().zip(heap.priorities()) {
                    *slot = dist;
                }
                examined
            })
            .sum();

        Ok(examined)
    }
}
