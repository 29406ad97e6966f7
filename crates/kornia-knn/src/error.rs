/// An error type for the nearest neighbor search.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum KnnError {
    /// The data length does not match the requested shape.
    #[error("Data length ({0}) does not match the shape {1}x{2}")]
    InvalidShape(usize, usize, usize),

    /// The bucket size of the k-d tree is too small.
    #[error("Requested bucket size {0}, but it must be at least 2")]
    InvalidBucketSize(usize),

    /// The k-d tree cannot be built over an empty cloud.
    #[error("Cannot build a search structure over an empty cloud")]
    EmptyCloud,

    /// The cloud holds an infinite or not-a-number coordinate.
    #[error("Cannot build a search structure over non-finite coordinates")]
    NonFiniteCloud,

    /// The cloud could produce more nodes than the node indices can address.
    #[error(
        "Cloud has a risk to have more nodes ({estimated}) than the kd-tree allows ({max}). \
         The kd-tree has {dim_bits} bits for dimensions and {index_bits} bits for node indices"
    )]
    TooManyNodes {
        /// Estimated number of nodes.
        estimated: usize,
        /// Maximum number of addressable nodes.
        max: usize,
        /// Bits reserved for the dimension tag.
        dim_bits: u32,
        /// Bits left for node indices.
        index_bits: u32,
    },

    /// The number of requested neighbors must be positive.
    #[error("The number of requested neighbors must be at least 1")]
    InvalidK,

    /// More neighbors requested than points available.
    #[error("Requesting more points ({k}) than available in cloud ({available})")]
    TooManyNeighbors {
        /// Requested number of neighbors.
        k: usize,
        /// Number of reference points.
        available: usize,
    },

    /// The query has fewer dimensions than the reference cloud.
    #[error("Query has less dimensions ({query}) than requested for cloud ({cloud})")]
    QueryDimension {
        /// Query dimensionality.
        query: usize,
        /// Reference dimensionality.
        cloud: usize,
    },

    /// The index table does not have the shape k x n.
    #[error("Index matrix has shape {0}x{1}, expected {2}x{3}")]
    IndicesShape(usize, usize, usize, usize),

    /// The distance table does not have the shape k x n.
    #[error("Distance matrix has shape {0}x{1}, expected {2}x{3}")]
    DistancesShape(usize, usize, usize, usize),

    /// The radii vector does not have one entry per query point.
    #[error("Maximum radii vector has length {0}, but the query has {1} columns")]
    RadiiLength(usize, usize),
}
