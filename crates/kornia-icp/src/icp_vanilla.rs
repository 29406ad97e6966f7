use kornia_3d::{pointcloud::PointCloud, transforms::EuclideanTransform};

use crate::{
    DefaultTransformationCheckerFactory, ICPConvergenceCriteria, ICPResult, Icp, IcpError,
    KdTreeMatcherFactory, PointToPointErrorMinimizer, TrimmedDistOutlierFilter,
};

/// Iterative Closest Point (ICP) algorithm using point to point distance.
///
/// Matches with a k-d tree over the target and rejects the worst matches with
/// the default trimmed distance filter.
///
/// # Arguments
///
/// * `source` - Source point cloud.
/// * `target` - Target point cloud.
/// * `initial` - Initial transformation from the source to the target frame.
/// * `criteria` - Convergence criteria, `max_iterations` also bounds the run.
///
/// # Returns
///
/// * `result` - Result of the ICP algorithm containing the transform, and number of iterations.
pub fn icp_vanilla(
    source: &PointCloud,
    target: &PointCloud,
    initial: EuclideanTransform,
    criteria: ICPConvergenceCriteria,
) -> Result<ICPResult, IcpError> {
    let mut icp = Icp::new(
        Box::new(KdTreeMatcherFactory::default()),
        Box::new(TrimmedDistOutlierFilter::new(Default::default())?),
        Box::new(PointToPointErrorMinimizer),
        Box::new(DefaultTransformationCheckerFactory::new(criteria)),
        criteria.max_iterations,
    );
    icp.compute(source, target, initial)
}
