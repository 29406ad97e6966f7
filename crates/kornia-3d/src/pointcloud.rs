use crate::{linalg, transforms::EuclideanTransform};

/// An error type for point cloud construction and transformation.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PointCloudError {
    /// The normals do not match the number of points.
    #[error("Number of normals ({0}) does not match the number of points ({1})")]
    NormalsMismatch(usize, usize),

    /// A destination buffer does not match the number of source points.
    #[error("Destination length ({0}) does not match the source length ({1})")]
    LengthMismatch(usize, usize),
}

/// A point cloud with points and optional per-point surface normals.
///
/// A cloud is never mutated in place by the registration stages; every filter
/// produces a new cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The normals of the points, parallel to `points`.
    normals: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points and normals (optional).
    ///
    /// # Errors
    ///
    /// Returns [`PointCloudError::NormalsMismatch`] if normals are given and their
    /// number differs from the number of points.
    pub fn new(
        points: Vec<[f64; 3]>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Result<Self, PointCloudError> {
        if let Some(normals) = &normals {
            if normals.len() != points.len() {
                return Err(PointCloudError::NormalsMismatch(
                    normals.len(),
                    points.len(),
                ));
            }
        }
        Ok(Self { points, normals })
    }

    /// Create a point cloud without normals.
    pub fn from_points(points: Vec<[f64; 3]>) -> Self {
        Self {
            points,
            normals: None,
        }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the point cloud carries a normal for every point.
    #[inline]
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&[[f64; 3]]> {
        self.normals.as_deref()
    }

    /// Consume the cloud and return its points and normals.
    pub fn into_parts(self) -> (Vec<[f64; 3]>, Option<Vec<[f64; 3]>>) {
        (self.points, self.normals)
    }

    /// Get the minimum bound of the point cloud.
    ///
    /// Returns `[f64::MAX; 3]` for an empty cloud.
    pub fn get_min_bound(&self) -> [f64; 3] {
        self.points.iter().fold([f64::MAX; 3], |acc, p| {
            [acc[0].min(p[0]), acc[1].min(p[1]), acc[2].min(p[2])]
        })
    }

    /// Get the maximum bound of the point cloud.
    ///
    /// Returns `[f64::MIN; 3]` for an empty cloud.
    pub fn get_max_bound(&self) -> [f64; 3] {
        self.points.iter().fold([f64::MIN; 3], |acc, p| {
            [acc[0].max(p[0]), acc[1].max(p[1]), acc[2].max(p[2])]
        })
    }

    /// Apply a rigid transform to the cloud and return the result as a new cloud.
    ///
    /// Normals are rotated, never translated.
    pub fn transformed(&self, transform: &EuclideanTransform) -> Result<Self, PointCloudError> {
        let mut points = vec![[0.0; 3]; self.points.len()];
        linalg::transform_points(&self.points, transform, &mut points)?;

        let normals = self.normals.as_ref().map(|normals| {
            normals
                .iter()
                .map(|n| transform.rotate(n))
                .collect::<Vec<_>>()
        });

        Ok(Self { points, normals })
    }
}
