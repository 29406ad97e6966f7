use kornia_3d::pointcloud::PointCloud;
use kornia_knn::DenseMatrix;

use crate::{IcpError, Matches};

/// Weights correspondences to reject outliers before solving for a transform.
pub trait OutlierFilter {
    /// Compute one weight in `[0, 1]` per match, in a table shaped like the matches.
    fn compute_outlier_weights(
        &self,
        reading: &PointCloud,
        reference: &PointCloud,
        matches: &Matches,
    ) -> Result<DenseMatrix<f64>, IcpError>;
}

/// Keeps every correspondence that was found.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutlierFilter;

impl OutlierFilter for NullOutlierFilter {
    fn compute_outlier_weights(
        &self,
        _reading: &PointCloud,
        _reference: &PointCloud,
        matches: &Matches,
    ) -> Result<DenseMatrix<f64>, IcpError> {
        Ok(matches
            .dists2
            .map(|d| if d.is_finite() { 1.0 } else { 0.0 }))
    }
}

/// Parameters of the [`TrimmedDistOutlierFilter`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrimmedDistParams {
    /// Fraction of the closest correspondences to keep, in `(0, 1]`.
    pub ratio: f64,
}

impl Default for TrimmedDistParams {
    fn default() -> Self {
        Self { ratio: 0.85 }
    }
}

/// Keeps the fraction `ratio` of the correspondences with the smallest distances.
#[derive(Debug, Clone)]
pub struct TrimmedDistOutlierFilter {
    params: TrimmedDistParams,
}

impl TrimmedDistOutlierFilter {
    /// Create a filter keeping the `params.ratio` closest correspondences.
    pub fn new(params: TrimmedDistParams) -> Result<Self, IcpError> {
        if !(params.ratio > 0.0 && params.ratio <= 1.0) {
            return Err(IcpError::InvalidParameter(format!(
                "trimmed distance ratio must be in (0, 1], got {}",
                params.ratio
            )));
        }
        Ok(Self { params })
    }
}

impl OutlierFilter for TrimmedDistOutlierFilter {
    fn compute_outlier_weights(
        &self,
        _reading: &PointCloud,
        _reference: &PointCloud,
        matches: &Matches,
    ) -> Result<DenseMatrix<f64>, IcpError> {
        let Some(limit) = matches.dists_quantile(self.params.ratio) else {
            return Ok(matches.dists2.map(|_| 0.0));
        };
        Ok(matches
            .dists2
            .map(|&d| if d.is_finite() && d <= limit { 1.0 } else { 0.0 }))
    }
}
