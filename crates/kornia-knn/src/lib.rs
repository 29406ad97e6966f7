#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod brute_force;
pub use brute_force::BruteForceSearch;

mod error;
pub use error::KnnError;

mod kdtree;
pub use kdtree::KdTreeSearch;

mod matrix;
pub use matrix::DenseMatrix;

mod queue;
pub use queue::BoundedPriorityQueue;

/// Selection of the element of a given rank without a full sort.
pub mod select;

mod search;
pub use search::{
    create_search, NearestNeighborSearch, SearchParams, SearchType, DEFAULT_BUCKET_SIZE,
    INVALID_INDEX, SELF_MATCH_EPSILON,
};
