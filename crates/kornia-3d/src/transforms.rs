use glam::{DMat3, DQuat, DVec3};

/// A rigid transform made of a unit quaternion rotation followed by a translation.
///
/// `apply(p) = rotation * p + translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EuclideanTransform {
    /// The rotation as a unit quaternion.
    pub rotation: DQuat,
    /// The translation applied after the rotation.
    pub translation: DVec3,
}

impl Default for EuclideanTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl EuclideanTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: DQuat::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Create a transform from a rotation and a translation.
    ///
    /// The rotation is normalized.
    pub fn new(rotation: DQuat, translation: DVec3) -> Self {
        Self {
            rotation: rotation.normalize(),
            translation,
        }
    }

    /// Create a transform from an axis, an angle and a translation.
    ///
    /// The axis does not need to be normalized. A zero axis yields no rotation.
    pub fn from_axis_angle(axis: [f64; 3], angle: f64, translation: [f64; 3]) -> Self {
        let rotation = match DVec3::from_array(axis).try_normalize() {
            Some(axis) => DQuat::from_axis_angle(axis, angle),
            None => DQuat::IDENTITY,
        };
        Self {
            rotation,
            translation: DVec3::from_array(translation),
        }
    }

    /// Apply the transform to a point.
    #[inline]
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        (self.rotation * DVec3::from_array(*point) + self.translation).to_array()
    }

    /// Apply only the rotation part of the transform to a vector.
    #[inline]
    pub fn rotate(&self, vector: &[f64; 3]) -> [f64; 3] {
        (self.rotation * DVec3::from_array(*vector)).to_array()
    }

    /// The inverse transform, such that `t.inverse().apply(&t.apply(&p)) == p`.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.conjugate();
        Self {
            rotation,
            translation: rotation * -self.translation,
        }
    }

    /// Compose two transforms: the result applies `other` first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: (self.rotation * other.rotation).normalize(),
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// The rotation as a row-major 3x3 matrix.
    pub fn rotation_matrix(&self) -> [[f64; 3]; 3] {
        let cols = DMat3::from_quat(self.rotation).to_cols_array_2d();
        let mut rows = [[0.0; 3]; 3];
        for (j, col) in cols.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                rows[i][j] = *v;
            }
        }
        rows
    }

    /// The translation as an array.
    pub fn translation_array(&self) -> [f64; 3] {
        self.translation.to_array()
    }
}

impl std::ops::Mul for EuclideanTransform {
    type Output = EuclideanTransform;

    /// `a * b` applies `b` first, then `a`.
    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

/// Angle in radians of the rotation taking `q1` to `q2`.
///
/// Computed as `2 * acos(dot(q1, q2))`, with the dot product clamped to `[-1, 1]`.
pub fn angular_distance(q1: &DQuat, q2: &DQuat) -> f64 {
    let dot = q1.dot(*q2).clamp(-1.0, 1.0);
    2.0 * dot.acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // closed-form Rodrigues rotation, independent of the quaternion path
    fn axis_angle_to_rotation_matrix(
        axis: &[f64; 3],
        angle: f64,
    ) -> Result<[[f64; 3]; 3], &'static str> {
        // normalize the vector
        let axis_norm = {
            let magnitude = (axis[0].powi(2) + axis[1].powi(2) + axis[2].powi(2)).sqrt();
            match magnitude < 1e-10 {
                true => return Err("cannot compute rotation matrix from a zero vector"),
                false => [
                    axis[0] / magnitude,
                    axis[1] / magnitude,
                    axis[2] / magnitude,
                ],
            }
        };

        let [x, y, z] = axis_norm;

        let c = angle.cos();
        let s = angle.sin();
        let t = 1.0 - c;

        let (xy, xz, yz) = (x * y * t, x * z * t, y * z * t);
        let (xs, ys, zs) = (x * s, y * s, z * s);

        Ok([
            [c + x * x * t, xy - zs, xz + ys],
            [xy + zs, c + y * y * t, yz - xs],
            [xz - ys, yz + xs, c + z * z * t],
        ])
    }

    fn assert_point_eq(a: &[f64; 3], b: &[f64; 3], epsilon: f64) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x, y, epsilon = epsilon);
        }
    }

    #[test]
    fn test_axis_angle_to_rotation_matrix() -> Result<(), Box<dyn std::error::Error>> {
        let rotation = axis_angle_to_rotation_matrix(&[1.0, 0.0, 0.0], std::f64::consts::FRAC_PI_2)?;
        let expected = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
        assert!(axis_angle_to_rotation_matrix(&[0.0; 3], 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_rotation_matrix_matches_axis_angle() -> Result<(), Box<dyn std::error::Error>> {
        let axis = [0.3, -1.2, 0.7];
        let angle = 0.9;
        let transform = EuclideanTransform::from_axis_angle(axis, angle, [0.0; 3]);
        let expected = axis_angle_to_rotation_matrix(&axis, angle)?;
        let rotation = transform.rotation_matrix();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_apply_inverse_roundtrip() {
        let transform = EuclideanTransform::from_axis_angle([1.0, 2.0, 3.0], 1.3, [4.0, -5.0, 6.0]);
        let p = [0.5, -1.5, 2.5];
        let back = transform.inverse().apply(&transform.apply(&p));
        assert_point_eq(&back, &p, 1e-12);
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let transform = EuclideanTransform::from_axis_angle([0.0, 1.0, 1.0], -2.1, [1.0, 1.0, 0.0]);
        let identity = transform * transform.inverse();

        assert_relative_eq!(
            angular_distance(&identity.rotation, &DQuat::IDENTITY),
            0.0,
            epsilon = 1e-6
        );
        assert_point_eq(&identity.translation_array(), &[0.0; 3], 1e-12);
    }

    #[test]
    fn test_compose_order() {
        let a = EuclideanTransform::from_axis_angle([0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2, [1.0, 0.0, 0.0]);
        let b = EuclideanTransform::from_axis_angle([1.0, 0.0, 0.0], 0.4, [0.0, 2.0, 0.0]);
        let p = [1.0, 2.0, 3.0];
        assert_point_eq(&(a * b).apply(&p), &a.apply(&b.apply(&p)), 1e-12);
    }

    #[test]
    fn test_angular_distance() {
        let q1 = DQuat::from_axis_angle(DVec3::Z, 0.25);
        let q2 = DQuat::from_axis_angle(DVec3::Z, 0.75);
        assert_relative_eq!(angular_distance(&q1, &q2), 0.5, epsilon = 1e-12);
        assert_relative_eq!(angular_distance(&q1, &q1), 0.0, epsilon = 1e-6);
    }
}
