use kornia_3d::pointcloud::PointCloud;
use kornia_knn::select::select_nth;
use rand::Rng;

use crate::{DataPointsFilter, IcpError};

/// How the points of a fitted group are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SamplingMethod {
    /// Keep every point of the group with probability `ratio`.
    #[default]
    RandomSampling,
    /// Replace the group by a single point at its centroid.
    Bin,
}

/// Parameters of the [`SamplingSurfaceNormalDataPointsFilter`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SurfaceNormalParams {
    /// How the points of a group are emitted.
    pub sampling_method: SamplingMethod,
    /// Probability of keeping a point with [`SamplingMethod::RandomSampling`].
    pub ratio: f64,
    /// Maximum number of points per group.
    pub knn: usize,
    /// Groups whose bounding box has a larger side are dropped.
    pub max_box_dim: f64,
}

impl Default for SurfaceNormalParams {
    fn default() -> Self {
        Self {
            sampling_method: SamplingMethod::RandomSampling,
            ratio: 0.5,
            knn: 7,
            max_box_dim: f64::INFINITY,
        }
    }
}

/// Estimates surface normals on groups of nearby points and subsamples the cloud.
///
/// The cloud is split recursively at the median of the largest side of the
/// bounding box until a group holds at most `knn` points. Every group gets the
/// normal of the plane fitted to its points, i.e. the eigenvector of the
/// smallest eigenvalue of their covariance. Groups with a rank deficient
/// covariance or a too large bounding box are dropped.
#[derive(Debug, Clone)]
pub struct SamplingSurfaceNormalDataPointsFilter<R: Rng> {
    params: SurfaceNormalParams,
    rng: R,
    unfit_points_count: usize,
}

// Output of the recursion, shared by every group.
struct BuildData<'a> {
    points: &'a [[f64; 3]],
    kept_points: Vec<[f64; 3]>,
    kept_normals: Vec<[f64; 3]>,
    unfit_points_count: usize,
}

impl<R: Rng> SamplingSurfaceNormalDataPointsFilter<R> {
    /// Create a filter drawing from `rng` for the random sampling.
    pub fn new(params: SurfaceNormalParams, rng: R) -> Result<Self, IcpError> {
        if params.knn == 0 {
            return Err(IcpError::InvalidParameter(
                "surface normal knn must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&params.ratio) {
            return Err(IcpError::InvalidParameter(format!(
                "surface normal sampling ratio must be in [0, 1], got {}",
                params.ratio
            )));
        }
        Ok(Self {
            params,
            rng,
            unfit_points_count: 0,
        })
    }

    /// Number of points dropped by the last call to [`DataPointsFilter::filter`].
    pub fn unfit_points_count(&self) -> usize {
        self.unfit_points_count
    }

    fn build_new(
        &mut self,
        data: &mut BuildData,
        indices: &mut [usize],
        min_values: [f64; 3],
        max_values: [f64; 3],
    ) {
        let count = indices.len();
        if count <= self.params.knn {
            self.fuse_range(data, indices);
            return;
        }

        let cut_dim = max_dim(&[
            max_values[0] - min_values[0],
            max_values[1] - min_values[1],
            max_values[2] - min_values[2],
        ]);

        let right_count = count / 2;
        let left_count = count - right_count;

        let points = data.points;
        select_nth(indices, left_count, |i| points[i][cut_dim]);
        let cut_value = points[indices[left_count]][cut_dim];

        let mut left_max_values = max_values;
        left_max_values[cut_dim] = cut_value;
        let mut right_min_values = min_values;
        right_min_values[cut_dim] = cut_value;

        let (left, right) = indices.split_at_mut(left_count);
        self.build_new(data, left, min_values, left_max_values);
        self.build_new(data, right, right_min_values, max_values);
    }

    fn fuse_range(&mut self, data: &mut BuildData, indices: &[usize]) {
        let count = indices.len();
        if count == 0 {
            return;
        }

        let points = data.points;
        let group = indices.iter().map(|&i| &points[i]);
        let Some(mean) = kornia_3d::ops::centroid(group.clone()) else {
            return;
        };

        let (min, max) = group.clone().fold(
            ([f64::INFINITY; 3], [f64::NEG_INFINITY; 3]),
            |(lo, hi), p| {
                (
                    [lo[0].min(p[0]), lo[1].min(p[1]), lo[2].min(p[2])],
                    [hi[0].max(p[0]), hi[1].max(p[1]), hi[2].max(p[2])],
                )
            },
        );
        let box_dim = (0..3).map(|d| max[d] - min[d]).fold(0.0, f64::max);
        if box_dim > self.params.max_box_dim {
            data.unfit_points_count += count;
            return;
        }

        // covariance of the centered points, not normalized
        let mut covariance = faer::Mat::<f64>::zeros(3, 3);
        for p in group {
            let c = [p[0] - mean[0], p[1] - mean[1], p[2] - mean[2]];
            for i in 0..3 {
                for j in 0..3 {
                    covariance.write(i, j, covariance.read(i, j) + c[i] * c[j]);
                }
            }
        }

        let eigen = covariance.selfadjoint_eigendecomposition(faer::Side::Lower);
        let eigenvalues = eigen.s().column_vector();
        let eigenvectors = eigen.u();

        if rank(&[eigenvalues.read(0), eigenvalues.read(1), eigenvalues.read(2)]) < 2 {
            data.unfit_points_count += count;
            return;
        }

        // the smallest eigenvalue gives the normal of the fitted plane
        let mut smallest = 0;
        for j in 1..3 {
            if eigenvalues.read(j) < eigenvalues.read(smallest) {
                smallest = j;
            }
        }
        let normal = [
            eigenvectors.read(0, smallest),
            eigenvectors.read(1, smallest),
            eigenvectors.read(2, smallest),
        ];

        match self.params.sampling_method {
            SamplingMethod::RandomSampling => {
                for &i in indices {
                    if self.rng.random::<f64>() < self.params.ratio {
                        data.kept_points.push(points[i]);
                        data.kept_normals.push(normal);
                    }
                }
            }
            SamplingMethod::Bin => {
                data.kept_points.push(mean);
                data.kept_normals.push(normal);
            }
        }
    }
}

impl<R: Rng> DataPointsFilter for SamplingSurfaceNormalDataPointsFilter<R> {
    fn filter(&mut self, input: &PointCloud) -> Result<PointCloud, IcpError> {
        let mut data = BuildData {
            points: input.points(),
            kept_points: Vec::new(),
            kept_normals: Vec::new(),
            unfit_points_count: 0,
        };

        let mut indices = (0..input.len()).collect::<Vec<_>>();
        self.build_new(
            &mut data,
            &mut indices,
            input.get_min_bound(),
            input.get_max_bound(),
        );

        log::debug!(
            "surface normals: kept {} of {} points, {} unfit",
            data.kept_points.len(),
            input.len(),
            data.unfit_points_count
        );
        self.unfit_points_count = data.unfit_points_count;

        Ok(PointCloud::new(data.kept_points, Some(data.kept_normals))?)
    }
}

// Index of the largest component, the last one on ties.
fn max_dim(v: &[f64; 3]) -> usize {
    if v[0] > v[1] && v[0] > v[2] {
        0
    } else if v[1] > v[2] {
        1
    } else {
        2
    }
}

// Relative magnitude under which an eigenvalue does not count towards the rank.
const RANK_TOLERANCE: f64 = 1e-12;

// Number of eigenvalues that are not negligible next to the largest one.
fn rank(eigenvalues: &[f64; 3]) -> usize {
    let largest = eigenvalues.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()));
    let tolerance = largest * RANK_TOLERANCE;
    eigenvalues.iter().filter(|v| v.abs() > tolerance).count()
}
