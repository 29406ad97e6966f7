use kornia_3d::pointcloud::PointCloudError;
use kornia_knn::KnnError;

/// An error type for the registration pipeline.
#[derive(thiserror::Error, Debug)]
pub enum IcpError {
    /// The error minimizer needs normals on the reference cloud.
    #[error("Reference points must have computed normals. Use an appropriate input filter")]
    MissingNormals,

    /// Every correspondence was rejected.
    #[error("No correspondence with a nonzero weight is left to solve for a transform")]
    NoCorrespondences,

    /// The least-squares system of the error minimizer could not be solved.
    #[error("The error minimizer system is singular")]
    SingularSystem,

    /// A convergence metric became not-a-number.
    #[error("{0} not a number")]
    NotANumber(&'static str),

    /// A parameter is outside of its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Two tables or clouds that must agree in shape do not.
    #[error("Shape {0}x{1} does not match the expected shape {2}x{3}")]
    ShapeMismatch(usize, usize, usize, usize),

    /// Error from the nearest neighbor search.
    #[error(transparent)]
    Knn(#[from] KnnError),

    /// Error from a point cloud operation.
    #[error(transparent)]
    PointCloud(#[from] PointCloudError),
}
