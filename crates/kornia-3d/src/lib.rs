#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Linear algebra utilities.
pub mod linalg;

/// Operations on 3D points.
pub mod ops;

/// Point cloud with optional normals.
pub mod pointcloud;

/// Rigid transforms.
pub mod transforms;
