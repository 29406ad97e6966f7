use kornia_3d::pointcloud::PointCloud;
use rand::Rng;

use crate::IcpError;

/// Transforms a point cloud into a new one, e.g. to subsample it or to compute normals.
pub trait DataPointsFilter {
    /// Produce the filtered cloud. The input is left untouched.
    fn filter(&mut self, input: &PointCloud) -> Result<PointCloud, IcpError>;
}

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDataPointsFilter;

impl DataPointsFilter for IdentityDataPointsFilter {
    fn filter(&mut self, input: &PointCloud) -> Result<PointCloud, IcpError> {
        Ok(input.clone())
    }
}

/// Applies a sequence of filters in order.
#[derive(Default)]
pub struct DataPointsFilters {
    filters: Vec<Box<dyn DataPointsFilter>>,
}

impl DataPointsFilters {
    /// Create a chain from `filters`, applied first to last.
    pub fn new(filters: Vec<Box<dyn DataPointsFilter>>) -> Self {
        Self { filters }
    }

    /// Append a filter at the end of the chain.
    pub fn push(&mut self, filter: Box<dyn DataPointsFilter>) {
        self.filters.push(filter);
    }

    /// Number of filters in the chain.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl DataPointsFilter for DataPointsFilters {
    fn filter(&mut self, input: &PointCloud) -> Result<PointCloud, IcpError> {
        let mut result = input.clone();
        for filter in self.filters.iter_mut() {
            result = filter.filter(&result)?;
        }
        Ok(result)
    }
}

/// Keeps every point independently with probability `prob`.
#[derive(Debug, Clone)]
pub struct RandomSamplingDataPointsFilter<R: Rng> {
    prob: f64,
    rng: R,
}

impl<R: Rng> RandomSamplingDataPointsFilter<R> {
    /// Default probability of keeping a point.
    pub const DEFAULT_PROB: f64 = 0.75;

    /// Create a filter drawing from `rng`.
    pub fn new(prob: f64, rng: R) -> Result<Self, IcpError> {
        if !(0.0..=1.0).contains(&prob) {
            return Err(IcpError::InvalidParameter(format!(
                "sampling probability must be in [0, 1], got {}",
                prob
            )));
        }
        Ok(Self { prob, rng })
    }

    /// Probability of keeping a point.
    pub fn prob(&self) -> f64 {
        self.prob
    }
}

impl<R: Rng> DataPointsFilter for RandomSamplingDataPointsFilter<R> {
    fn filter(&mut self, input: &PointCloud) -> Result<PointCloud, IcpError> {
        let mut points = Vec::new();
        let mut normals = input.normals().map(|_| Vec::new());

        for (i, p) in input.points().iter().enumerate() {
            if self.rng.random::<f64>() < self.prob {
                points.push(*p);
                if let (Some(dst), Some(src)) = (normals.as_mut(), input.normals()) {
                    dst.push(src[i]);
                }
            }
        }

        Ok(PointCloud::new(points, normals)?)
    }
}
