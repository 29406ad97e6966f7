use kornia_3d::pointcloud::PointCloud;
use kornia_knn::{select, DenseMatrix, INVALID_INDEX};

use crate::IcpError;

/// Correspondences between a reading and a reference cloud.
///
/// Both tables are `k x n`: one column per reading point, one row per neighbor.
#[derive(Debug, Clone, PartialEq)]
pub struct Matches {
    /// Squared distances to the matched reference points.
    pub dists2: DenseMatrix<f64>,
    /// Indices of the matched reference points, [`INVALID_INDEX`] for empty slots.
    pub ids: DenseMatrix<usize>,
}

impl Matches {
    /// Create matches from equally shaped distance and index tables.
    pub fn new(dists2: DenseMatrix<f64>, ids: DenseMatrix<usize>) -> Result<Self, IcpError> {
        if dists2.shape() != ids.shape() {
            return Err(IcpError::ShapeMismatch(
                dists2.rows(),
                dists2.cols(),
                ids.rows(),
                ids.cols(),
            ));
        }
        Ok(Self { dists2, ids })
    }

    /// Number of neighbors per reading point.
    pub fn knn(&self) -> usize {
        self.ids.rows()
    }

    /// Number of reading points.
    pub fn len(&self) -> usize {
        self.ids.cols()
    }

    /// Whether there is no reading point.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The squared distance at the `quantile` of all the match distances.
    ///
    /// Returns `None` if there is no match.
    pub fn dists_quantile(&self, quantile: f64) -> Option<f64> {
        select::quantile(self.dists2.as_slice(), quantile)
    }
}

/// Weighted pairs of matched points, ready for an error minimizer.
///
/// `reading[i]` is matched with `reference[i]` with weight `weights[i]`.
#[derive(Debug, Clone, Default)]
pub struct ErrorElements {
    /// The kept reading points.
    pub reading: PointCloud,
    /// The reference points matched to the kept reading points.
    pub reference: PointCloud,
    /// The weight of every pair.
    pub weights: Vec<f64>,
}

impl ErrorElements {
    /// Number of matched pairs.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether there is no matched pair.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Gather the correspondences with a nonzero weight into matched pairs.
///
/// A reading point contributes once per neighbor slot it keeps. Normals are
/// carried over from both clouds when present.
pub fn get_matched_points(
    reading: &PointCloud,
    reference: &PointCloud,
    matches: &Matches,
    weights: &DenseMatrix<f64>,
) -> Result<ErrorElements, IcpError> {
    if matches.len() != reading.len() {
        return Err(IcpError::ShapeMismatch(
            matches.knn(),
            matches.len(),
            matches.knn(),
            reading.len(),
        ));
    }
    if weights.shape() != matches.ids.shape() {
        return Err(IcpError::ShapeMismatch(
            weights.rows(),
            weights.cols(),
            matches.knn(),
            matches.len(),
        ));
    }

    let max_count = matches.knn() * matches.len();
    let mut reading_points = Vec::with_capacity(max_count);
    let mut reading_normals = reading.normals().map(|_| Vec::with_capacity(max_count));
    let mut reference_points = Vec::with_capacity(max_count);
    let mut reference_normals = reference.normals().map(|_| Vec::with_capacity(max_count));
    let mut kept_weights = Vec::with_capacity(max_count);

    for k in 0..matches.knn() {
        for i in 0..matches.len() {
            let weight = *weights.get(k, i);
            let index = *matches.ids.get(k, i);
            if weight == 0.0 || index == INVALID_INDEX {
                continue;
            }

            reading_points.push(reading.points()[i]);
            if let (Some(dst), Some(src)) = (reading_normals.as_mut(), reading.normals()) {
                dst.push(src[i]);
            }
            reference_points.push(reference.points()[index]);
            if let (Some(dst), Some(src)) = (reference_normals.as_mut(), reference.normals()) {
                dst.push(src[index]);
            }
            kept_weights.push(weight);
        }
    }

    Ok(ErrorElements {
        reading: PointCloud::new(reading_points, reading_normals)?,
        reference: PointCloud::new(reference_points, reference_normals)?,
        weights: kept_weights,
    })
}
