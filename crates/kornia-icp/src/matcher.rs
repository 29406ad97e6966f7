use kornia_3d::pointcloud::PointCloud;
use kornia_knn::{
    create_search, DenseMatrix, NearestNeighborSearch, SearchParams, SearchType,
    DEFAULT_BUCKET_SIZE, INVALID_INDEX,
};

use crate::{IcpError, Matches};

/// Finds the reference points closest to the points of a reading cloud.
pub trait Matcher {
    /// Match every reading point to its closest reference points.
    fn find_closests(&self, reading: &PointCloud) -> Result<Matches, IcpError>;
}

/// Builds a [`Matcher`] over a reference cloud, once per registration run.
pub trait MatcherFactory {
    /// Construct a matcher over `reference`.
    fn construct_matcher(&self, reference: &PointCloud) -> Result<Box<dyn Matcher>, IcpError>;
}

/// Parameters of the [`KdTreeMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct KdTreeMatcherParams {
    /// Number of neighbors per reading point.
    pub knn: usize,
    /// Approximation factor of the search, `0` for an exact search.
    pub epsilon: f64,
    /// Matches further than this distance are left empty.
    pub max_dist: f64,
    /// The search structure backing the matcher.
    pub search_type: SearchType,
    /// Number of points per k-d tree leaf.
    pub bucket_size: usize,
    /// Allow matching a reading point with a reference point at distance zero.
    pub allow_self_match: bool,
}

impl Default for KdTreeMatcherParams {
    fn default() -> Self {
        Self {
            knn: 1,
            epsilon: 0.0,
            max_dist: f64::INFINITY,
            search_type: SearchType::KdTree,
            bucket_size: DEFAULT_BUCKET_SIZE,
            allow_self_match: true,
        }
    }
}

/// Creates [`KdTreeMatcher`]s.
#[derive(Debug, Clone, Default)]
pub struct KdTreeMatcherFactory {
    /// Parameters passed to every created matcher.
    pub params: KdTreeMatcherParams,
}

impl KdTreeMatcherFactory {
    /// Create a factory with the given parameters.
    pub fn new(params: KdTreeMatcherParams) -> Self {
        Self { params }
    }
}

impl MatcherFactory for KdTreeMatcherFactory {
    fn construct_matcher(&self, reference: &PointCloud) -> Result<Box<dyn Matcher>, IcpError> {
        Ok(Box::new(KdTreeMatcher::new(reference, self.params)?))
    }
}

/// Matcher backed by a nearest neighbor search over the reference cloud.
pub struct KdTreeMatcher {
    search: Box<dyn NearestNeighborSearch + Send + Sync>,
    params: KdTreeMatcherParams,
}

impl KdTreeMatcher {
    /// Build the search structure over `reference`.
    pub fn new(reference: &PointCloud, params: KdTreeMatcherParams) -> Result<Self, IcpError> {
        if params.max_dist.is_nan() || params.max_dist <= 0.0 {
            return Err(IcpError::InvalidParameter(format!(
                "max_dist must be positive, got {}",
                params.max_dist
            )));
        }
        if params.epsilon.is_nan() || params.epsilon < 0.0 {
            return Err(IcpError::InvalidParameter(format!(
                "epsilon must be non-negative, got {}",
                params.epsilon
            )));
        }

        let cloud = DenseMatrix::from_columns(reference.points());
        let search = create_search(cloud, params.search_type, params.bucket_size)?;
        Ok(Self { search, params })
    }
}

impl Matcher for KdTreeMatcher {
    fn find_closests(&self, reading: &PointCloud) -> Result<Matches, IcpError> {
        let query = DenseMatrix::from_columns(reading.points());
        let mut ids = DenseMatrix::new(self.params.knn, query.cols(), INVALID_INDEX);
        let mut dists2 = DenseMatrix::new(self.params.knn, query.cols(), f64::INFINITY);

        let max_radii = self
            .params
            .max_dist
            .is_finite()
            .then(|| vec![self.params.max_dist; query.cols()]);

        let search_params = SearchParams {
            k: self.params.knn,
            epsilon: self.params.epsilon,
            allow_self_match: self.params.allow_self_match,
        };

        self.search.knn(
            &query,
            &mut ids,
            &mut dists2,
            max_radii.as_deref(),
            &search_params,
        )?;

        Matches::new(dists2, ids)
    }
}

/// Creates [`KnownCorrespondenceMatcher`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownCorrespondenceMatcherFactory;

impl MatcherFactory for KnownCorrespondenceMatcherFactory {
    fn construct_matcher(&self, reference: &PointCloud) -> Result<Box<dyn Matcher>, IcpError> {
        Ok(Box::new(KnownCorrespondenceMatcher::new(reference.clone())))
    }
}

/// Matcher for clouds already in correspondence: reading point `i` matches reference point `i`.
#[derive(Debug, Clone)]
pub struct KnownCorrespondenceMatcher {
    reference: PointCloud,
}

impl KnownCorrespondenceMatcher {
    /// Create a matcher returning the identity mapping onto `reference`.
    pub fn new(reference: PointCloud) -> Self {
        Self { reference }
    }
}

impl Matcher for KnownCorrespondenceMatcher {
    fn find_closests(&self, reading: &PointCloud) -> Result<Matches, IcpError> {
        let n = self.reference.len();
        if reading.len() != n {
            return Err(IcpError::ShapeMismatch(1, reading.len(), 1, n));
        }

        let ids = DenseMatrix::from_fn(1, n, |_, j| j);
        let dists2 = DenseMatrix::from_fn(1, n, |_, j| {
            kornia_3d::ops::squared_distance(&reading.points()[j], &self.reference.points()[j])
        });
        Matches::new(dists2, ids)
    }
}
