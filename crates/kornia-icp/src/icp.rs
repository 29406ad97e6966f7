use kornia_3d::{pointcloud::PointCloud, transforms::EuclideanTransform};
use kornia_knn::DenseMatrix;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    get_matched_points, DataPointsFilter, DataPointsFilters, DefaultTransformationCheckerFactory,
    ErrorMinimizer, ICPConvergenceCriteria, IcpError, KdTreeMatcherFactory, KdTreeMatcherParams,
    MatcherFactory, Matches, OutlierFilter, PointToPlaneErrorMinimizer, PointToPointErrorMinimizer,
    RandomSamplingDataPointsFilter, SamplingSurfaceNormalDataPointsFilter, SurfaceNormalParams,
    TransformationCheckerFactory, TrimmedDistOutlierFilter, TrimmedDistParams,
};

/// Result of the ICP algorithm.
///
/// The transformation is from the reading to the reference frame.
#[derive(Debug, Clone)]
pub struct ICPResult {
    /// Estimated transform, applied to the reading to align it onto the reference.
    pub transform: EuclideanTransform,
    /// The total number of iterations performed.
    pub num_iterations: usize,
    /// Whether a transformation checker stopped the loop before the iteration budget ran out.
    pub converged: bool,
    /// Root mean of the kept squared match distances in the last iteration.
    pub rmse: f64,
}

/// Stage of the registration loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IcpState {
    /// Applying the data points filters to the input clouds.
    #[default]
    Filtering,
    /// Matching the reading points to the reference points.
    Matching,
    /// Computing the outlier weights of the matches.
    Weighting,
    /// Solving for the incremental transform.
    Minimizing,
    /// Polling the transformation checkers.
    Checking,
    /// A transformation checker stopped the loop.
    Converged,
}

/// The error minimizer used by a pipeline built from an [`IcpConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MinimizerType {
    /// [`PointToPlaneErrorMinimizer`], needs normals on the reference.
    #[default]
    PointToPlane,
    /// [`PointToPointErrorMinimizer`].
    PointToPoint,
}

/// Configuration of a complete registration pipeline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    /// Probability of keeping a reading point, no subsampling if `None`.
    pub reading_sampling_prob: Option<f64>,
    /// Normal estimation on the reference cloud, skipped if `None`.
    pub reference_normals: Option<SurfaceNormalParams>,
    /// Parameters of the k-d tree matcher.
    pub matcher: KdTreeMatcherParams,
    /// Parameters of the trimmed distance outlier filter.
    pub outlier_filter: TrimmedDistParams,
    /// The error minimizer.
    pub minimizer: MinimizerType,
    /// Criteria of the default transformation checkers.
    pub convergence: ICPConvergenceCriteria,
    /// Hard limit on the number of iterations of a run.
    pub max_iterations: usize,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            reading_sampling_prob: None,
            reference_normals: Some(SurfaceNormalParams::default()),
            matcher: KdTreeMatcherParams::default(),
            outlier_filter: TrimmedDistParams::default(),
            minimizer: MinimizerType::PointToPlane,
            convergence: ICPConvergenceCriteria::default(),
            max_iterations: 200,
        }
    }
}

/// Iterative closest point registration with pluggable stages.
///
/// Each iteration matches the reading onto the reference, weights the matches,
/// solves for an incremental transform and composes it with the accumulated
/// one. The accumulated transform is always applied to the filtered reading
/// as it was before the first iteration.
pub struct Icp {
    /// Filters applied to the reading before registration.
    pub reading_filters: DataPointsFilters,
    /// Filters applied to the reference before registration.
    pub reference_filters: DataPointsFilters,
    /// Builds the matcher over the filtered reference.
    pub matcher_factory: Box<dyn MatcherFactory>,
    /// Weights the matches of every iteration.
    pub outlier_filter: Box<dyn OutlierFilter>,
    /// Solves for the incremental transform of every iteration.
    pub error_minimizer: Box<dyn ErrorMinimizer>,
    /// Builds the convergence checkers of every run.
    pub checker_factory: Box<dyn TransformationCheckerFactory>,
    /// Hard limit on the number of iterations of a run.
    pub max_iterations: usize,
    state: IcpState,
}

impl Icp {
    /// Create a pipeline from its stages, without data points filters.
    pub fn new(
        matcher_factory: Box<dyn MatcherFactory>,
        outlier_filter: Box<dyn OutlierFilter>,
        error_minimizer: Box<dyn ErrorMinimizer>,
        checker_factory: Box<dyn TransformationCheckerFactory>,
        max_iterations: usize,
    ) -> Self {
        Self {
            reading_filters: DataPointsFilters::default(),
            reference_filters: DataPointsFilters::default(),
            matcher_factory,
            outlier_filter,
            error_minimizer,
            checker_factory,
            max_iterations,
            state: IcpState::default(),
        }
    }

    /// Build a complete pipeline from a configuration.
    ///
    /// `seed` initializes the random generators of the sampling filters.
    pub fn from_config(config: &IcpConfig, seed: u64) -> Result<Self, IcpError> {
        let error_minimizer: Box<dyn ErrorMinimizer> = match config.minimizer {
            MinimizerType::PointToPlane => Box::new(PointToPlaneErrorMinimizer),
            MinimizerType::PointToPoint => Box::new(PointToPointErrorMinimizer),
        };

        let mut icp = Self::new(
            Box::new(KdTreeMatcherFactory::new(config.matcher)),
            Box::new(TrimmedDistOutlierFilter::new(config.outlier_filter)?),
            error_minimizer,
            Box::new(DefaultTransformationCheckerFactory::new(config.convergence)),
            config.max_iterations,
        );

        if let Some(prob) = config.reading_sampling_prob {
            icp.reading_filters
                .push(Box::new(RandomSamplingDataPointsFilter::new(
                    prob,
                    StdRng::seed_from_u64(seed),
                )?));
        }
        if let Some(params) = config.reference_normals {
            icp.reference_filters
                .push(Box::new(SamplingSurfaceNormalDataPointsFilter::new(
                    params,
                    StdRng::seed_from_u64(seed.wrapping_add(1)),
                )?));
        }

        Ok(icp)
    }

    /// The stage reached by the last run.
    ///
    /// This is the stage where an error surfaced, `Converged` if a checker
    /// stopped the loop, or `Checking` if the iteration budget ran out.
    pub fn state(&self) -> IcpState {
        self.state
    }

    /// Register `reading` onto `reference`, starting from `initial`.
    ///
    /// # Arguments
    ///
    /// * `reading` - The cloud to move.
    /// * `reference` - The cloud to align onto.
    /// * `initial` - Initial guess of the transform from the reading to the reference frame.
    ///
    /// # Returns
    ///
    /// The estimated transform with the number of iterations and the final error.
    pub fn compute(
        &mut self,
        reading: &PointCloud,
        reference: &PointCloud,
        initial: EuclideanTransform,
    ) -> Result<ICPResult, IcpError> {
        self.state = IcpState::Filtering;
        let reading = self.reading_filters.filter(reading)?;
        let reference = self.reference_filters.filter(reference)?;
        log::debug!(
            "Filtered reading: {} points, reference: {} points",
            reading.len(),
            reference.len()
        );

        let matcher = self.matcher_factory.construct_matcher(&reference)?;
        let mut checker = self.checker_factory.create_transformation_checker();

        let mut result = ICPResult {
            transform: initial,
            num_iterations: 0,
            converged: false,
            rmse: f64::INFINITY,
        };
        let mut current_reading = reading.transformed(&result.transform)?;

        // main icp loop
        for i in 0..self.max_iterations {
            log::debug!("Iteration: {}", i);
            let now = std::time::Instant::now();

            self.state = IcpState::Matching;
            let matches = matcher.find_closests(&current_reading)?;

            self.state = IcpState::Weighting;
            let weights =
                self.outlier_filter
                    .compute_outlier_weights(&current_reading, &reference, &matches)?;
            let elements = get_matched_points(&current_reading, &reference, &matches, &weights)?;
            log::debug!("Num correspondences: {}", elements.len());
            if elements.is_empty() {
                return Err(IcpError::NoCorrespondences);
            }

            self.state = IcpState::Minimizing;
            let delta = self.error_minimizer.solve_for_transform(&elements)?;

            // re-apply the whole transform to the input to avoid drift
            result.transform = delta * result.transform;
            current_reading = reading.transformed(&result.transform)?;
            result.num_iterations += 1;
            result.rmse = kept_rmse(&matches, &weights);

            self.state = IcpState::Checking;
            let keep_going = checker.should_continue(&result.transform)?;

            log::debug!("rmse: {}, elapsed: {:?}", result.rmse, now.elapsed());

            if !keep_going {
                log::debug!(
                    "ICP converged in {} iterations with error {}",
                    result.num_iterations,
                    result.rmse
                );
                result.converged = true;
                self.state = IcpState::Converged;
                break;
            }
        }

        if !result.converged {
            log::warn!(
                "ICP stopped after {} iterations without converging, error {}",
                result.num_iterations,
                result.rmse
            );
        }

        Ok(result)
    }
}

// Root mean of the squared distances of the matches with a nonzero weight.
fn kept_rmse(matches: &Matches, weights: &DenseMatrix<f64>) -> f64 {
    let (sum, count) = matches
        .dists2
        .as_slice()
        .iter()
        .zip(weights.as_slice())
        .filter(|(_, w)| **w != 0.0)
        .fold((0.0, 0usize), |(sum, count), (d, _)| (sum + d, count + 1));
    match count {
        0 => f64::INFINITY,
        _ => (sum / count as f64).sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        KnownCorrespondenceMatcherFactory, NullOutlierFilter, TransformationChecker,
    };
    use approx::assert_relative_eq;

    fn cube_points() -> Vec<[f64; 3]> {
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                for k in 0..5 {
                    points.push([i as f64, j as f64 * 1.3, k as f64 * 0.7]);
                }
            }
        }
        points
    }

    #[test]
    fn test_compute_known_correspondence_point_to_point() -> Result<(), IcpError> {
        let reference = PointCloud::from_points(cube_points());
        let t = EuclideanTransform::from_axis_angle([0.2, 1.0, -0.3], 0.4, [0.5, -1.0, 2.0]);
        let reading = reference.transformed(&t.inverse())?;

        let mut icp = Icp::new(
            Box::new(KnownCorrespondenceMatcherFactory),
            Box::new(NullOutlierFilter),
            Box::new(PointToPointErrorMinimizer),
            Box::new(DefaultTransformationCheckerFactory::default()),
            50,
        );
        let result = icp.compute(&reading, &reference, EuclideanTransform::IDENTITY)?;

        assert!(result.converged);
        assert_eq!(icp.state(), IcpState::Converged);
        assert_relative_eq!(
            (result.transform.translation - t.translation).length(),
            0.0,
            epsilon = 1e-6
        );
        let aligned = reading.transformed(&result.transform)?;
        for (a, b) in aligned.points().iter().zip(reference.points()) {
            assert_relative_eq!(kornia_3d::ops::euclidean_distance(a, b), 0.0, epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_compute_missing_normals_state() {
        let reference = PointCloud::from_points(cube_points());
        let mut icp = Icp::new(
            Box::new(KdTreeMatcherFactory::default()),
            Box::new(NullOutlierFilter),
            Box::new(PointToPlaneErrorMinimizer),
            Box::new(DefaultTransformationCheckerFactory::default()),
            10,
        );

        let res = icp.compute(&reference, &reference, EuclideanTransform::IDENTITY);
        assert!(matches!(res, Err(IcpError::MissingNormals)));
        assert_eq!(icp.state(), IcpState::Minimizing);
    }

    struct NeverStop;

    impl TransformationChecker for NeverStop {
        fn should_continue(&mut self, _: &EuclideanTransform) -> Result<bool, IcpError> {
            Ok(true)
        }
    }

    impl TransformationCheckerFactory for NeverStop {
        fn create_transformation_checker(&self) -> Box<dyn TransformationChecker> {
            Box::new(NeverStop)
        }
    }

    #[test]
    fn test_compute_budget() -> Result<(), IcpError> {
        let reference = PointCloud::from_points(cube_points());
        let mut icp = Icp::new(
            Box::new(KdTreeMatcherFactory::default()),
            Box::new(NullOutlierFilter),
            Box::new(PointToPointErrorMinimizer),
            Box::new(NeverStop),
            7,
        );

        let result = icp.compute(&reference, &reference, EuclideanTransform::IDENTITY)?;
        assert_eq!(result.num_iterations, 7);
        assert!(!result.converged);
        assert_eq!(icp.state(), IcpState::Checking);
        assert_relative_eq!(result.rmse, 0.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_kept_rmse() -> Result<(), IcpError> {
        let matches = Matches::new(
            DenseMatrix::from_shape_vec(1, 3, vec![4.0, 100.0, 16.0])?,
            DenseMatrix::new(1, 3, 0),
        )?;
        let weights = DenseMatrix::from_shape_vec(1, 3, vec![1.0, 0.0, 1.0])?;
        assert_relative_eq!(kept_rmse(&matches, &weights), 10.0_f64.sqrt());
        Ok(())
    }

    #[test]
    fn test_config_from_json() -> Result<(), Box<dyn std::error::Error>> {
        let config: IcpConfig = serde_json::from_str(
            r#"{ "minimizer": "PointToPoint", "max_iterations": 10, "outlier_filter": { "ratio": 0.5 } }"#,
        )?;
        assert_eq!(config.minimizer, MinimizerType::PointToPoint);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.outlier_filter.ratio, 0.5);
        assert_eq!(config.matcher, KdTreeMatcherParams::default());
        assert_eq!(config.convergence, ICPConvergenceCriteria::default());

        let icp = Icp::from_config(&config, 0)?;
        assert_eq!(icp.reference_filters.len(), 1);
        assert!(icp.reading_filters.is_empty());

        let bad = IcpConfig {
            outlier_filter: TrimmedDistParams { ratio: 2.0 },
            ..Default::default()
        };
        assert!(Icp::from_config(&bad, 0).is_err());
        Ok(())
    }
}
