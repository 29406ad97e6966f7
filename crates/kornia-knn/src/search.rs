use crate::{BruteForceSearch, DenseMatrix, KdTreeSearch, KnnError};

/// Index written into result slots that received no neighbor.
pub const INVALID_INDEX: usize = usize::MAX;

/// Squared distances at or below this value are treated as the query point itself.
pub const SELF_MATCH_EPSILON: f64 = f64::EPSILON;

/// Default number of reference points per k-d tree leaf.
pub const DEFAULT_BUCKET_SIZE: usize = 8;

/// Parameters of a k-nearest-neighbor query.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchParams {
    /// Number of neighbors to find for every query point.
    pub k: usize,
    /// Maximum allowable error: a neighbor closer by less than a factor `1 + epsilon` may be missed.
    pub epsilon: f64,
    /// Allow returning a reference point at distance zero from the query.
    pub allow_self_match: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            k: 1,
            epsilon: 0.0,
            allow_self_match: false,
        }
    }
}

/// A nearest neighbor search over a fixed reference cloud.
pub trait NearestNeighborSearch {
    /// Dimensionality of the reference cloud.
    fn dimensions(&self) -> usize;

    /// Number of points in the reference cloud.
    fn len(&self) -> usize;

    /// Whether the reference cloud is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the `k` nearest reference points of every query column.
    ///
    /// # Arguments
    ///
    /// * `query` - The query points, one per column.
    /// * `indices` - Receives the neighbor indices, `k x n`. Unfilled slots hold [`INVALID_INDEX`].
    /// * `dists2` - Receives the squared distances, `k x n`. Unfilled slots hold `+inf`.
    /// * `max_radii` - Optional maximum search radius per query column.
    /// * `params` - Number of neighbors, allowed error and self match option.
    ///
    /// # Returns
    ///
    /// The number of reference entries examined, for diagnostics.
    fn knn(
        &self,
        query: &DenseMatrix<f64>,
        indices: &mut DenseMatrix<usize>,
        dists2: &mut DenseMatrix<f64>,
        max_radii: Option<&[f64]>,
        params: &SearchParams,
    ) -> Result<u64, KnnError>;
}

/// Type of nearest neighbor search structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SearchType {
    /// Check the distance to every reference point.
    BruteForce,
    /// Bucketed k-d tree with a linear heap, good for small k.
    #[default]
    KdTree,
}

/// Build a nearest neighbor search of the given type over `cloud`.
///
/// `bucket_size` is only used by [`SearchType::KdTree`].
pub fn create_search(
    cloud: DenseMatrix<f64>,
    search_type: SearchType,
    bucket_size: usize,
) -> Result<Box<dyn NearestNeighborSearch + Send + Sync>, KnnError> {
    Ok(match search_type {
        SearchType::BruteForce => Box::new(BruteForceSearch::new(cloud)),
        SearchType::KdTree => Box::new(KdTreeSearch::new(cloud, bucket_size)?),
    })
}

/// Validate the shapes of a query against a reference cloud.
pub(crate) fn check_sizes_knn(
    cloud_dimensions: usize,
    cloud_len: usize,
    query: &DenseMatrix<f64>,
    indices: &DenseMatrix<usize>,
    dists2: &DenseMatrix<f64>,
    max_radii: Option<&[f64]>,
    k: usize,
) -> Result<(), KnnError> {
    if k == 0 {
        return Err(KnnError::InvalidK);
    }
    if k > cloud_len {
        return Err(KnnError::TooManyNeighbors {
            k,
            available: cloud_len,
        });
    }
    if query.rows() < cloud_dimensions {
        return Err(KnnError::QueryDimension {
            query: query.rows(),
            cloud: cloud_dimensions,
        });
    }
    if indices.shape() != (k, query.cols()) {
        return Err(KnnError::IndicesShape(
            indices.rows(),
            indices.cols(),
            k,
            query.cols(),
        ));
    }
    if dists2.shape() != (k, query.cols()) {
        return Err(KnnError::DistancesShape(
            dists2.rows(),
            dists2.cols(),
            k,
            query.cols(),
        ));
    }
    if let Some(radii) = max_radii {
        if radii.len() != query.cols() {
            return Err(KnnError::RadiiLength(radii.len(), query.cols()));
        }
    }
    Ok(())
}

/// Squared Euclidean distance over the first `point.len()` coordinates.
#[inline]
pub(crate) fn squared_distance(point: &[f64], query: &[f64]) -> f64 {
    point
        .iter()
        .zip(query.iter())
        .map(|(p, q)| (p - q) * (p - q))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> DenseMatrix<f64> {
        DenseMatrix::from_columns(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]])
    }

    #[test]
    fn test_create_search_types_agree() -> Result<(), KnnError> {
        let query = DenseMatrix::from_columns(&[[0.9, 0.1, 0.0], [0.1, 1.8, 0.2]]);
        let params = SearchParams {
            k: 2,
            ..Default::default()
        };

        let mut results = Vec::new();
        for search_type in [SearchType::BruteForce, SearchType::KdTree] {
            let search = create_search(cloud(), search_type, 2)?;
            assert_eq!(search.dimensions(), 3);
            assert_eq!(search.len(), 3);

            let mut indices = DenseMatrix::new(2, 2, 0);
            let mut dists2 = DenseMatrix::new(2, 2, 0.0);
            search.knn(&query, &mut indices, &mut dists2, None, &params)?;
            results.push((indices, dists2));
        }

        assert_eq!(results[0], results[1]);
        assert_eq!(results[0].0.col(0), &[1, 0]);
        assert_eq!(results[0].0.col(1), &[2, 0]);
        Ok(())
    }

    #[test]
    fn test_check_sizes() {
        let query = DenseMatrix::new(3, 4, 0.0);
        let indices = DenseMatrix::new(2, 4, 0);
        let dists2 = DenseMatrix::new(2, 4, 0.0);

        assert_eq!(
            check_sizes_knn(3, 10, &query, &indices, &dists2, None, 2),
            Ok(())
        );
        assert_eq!(
            check_sizes_knn(3, 10, &query, &indices, &dists2, None, 0),
            Err(KnnError::InvalidK)
        );
        assert_eq!(
            check_sizes_knn(3, 1, &query, &indices, &dists2, None, 2),
            Err(KnnError::TooManyNeighbors { k: 2, available: 1 })
        );
        assert_eq!(
            check_sizes_knn(4, 10, &query, &indices, &dists2, None, 2),
            Err(KnnError::QueryDimension { query: 3, cloud: 4 })
        );
        assert_eq!(
            check_sizes_knn(3, 10, &query, &indices, &dists2, None, 3),
            Err(KnnError::IndicesShape(2, 4, 3, 4))
        );
        assert_eq!(
            check_sizes_knn(3, 10, &query, &indices, &DenseMatrix::new(2, 3, 0.0), None, 2),
            Err(KnnError::DistancesShape(2, 3, 2, 4))
        );
        assert_eq!(
            check_sizes_knn(3, 10, &query, &indices, &dists2, Some(&[1.0; 3]), 2),
            Err(KnnError::RadiiLength(3, 4))
        );
    }
}
