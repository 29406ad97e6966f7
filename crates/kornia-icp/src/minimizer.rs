use faer::prelude::SpSolver;
use glam::{DMat3, DQuat, DVec3};
use kornia_3d::{
    ops::{cross, dot},
    transforms::EuclideanTransform,
};

use crate::{ErrorElements, IcpError};

/// Solves for the rigid transform best aligning matched reading points onto reference points.
pub trait ErrorMinimizer {
    /// Compute the incremental transform to apply to the reading points.
    fn solve_for_transform(&self, elements: &ErrorElements) -> Result<EuclideanTransform, IcpError>;
}

/// Minimizes the distance of the reading points to the tangent planes of their matches.
///
/// The rotation is linearized around the identity, which gives a 6x6 system
/// of normal equations over the features `[p x n, n]`, solved by Cholesky.
/// The reference cloud must carry normals.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointToPlaneErrorMinimizer;

impl ErrorMinimizer for PointToPlaneErrorMinimizer {
    fn solve_for_transform(&self, elements: &ErrorElements) -> Result<EuclideanTransform, IcpError> {
        let Some(normals) = elements.reference.normals() else {
            return Err(IcpError::MissingNormals);
        };
        if elements.is_empty() {
            return Err(IcpError::NoCorrespondences);
        }

        let mut a = faer::Mat::<f64>::zeros(6, 6);
        let mut b = faer::Mat::<f64>::zeros(6, 1);

        let reading_points = elements.reading.points();
        let reference_points = elements.reference.points();
        for (((p, q), n), w) in reading_points
            .iter()
            .zip(reference_points)
            .zip(normals)
            .zip(&elements.weights)
        {
            let c = cross(p, n);
            let f = [c[0], c[1], c[2], n[0], n[1], n[2]];
            let delta = [p[0] - q[0], p[1] - q[1], p[2] - q[2]];
            let d = dot(&delta, n);

            for i in 0..6 {
                for j in 0..6 {
                    a.write(i, j, a.read(i, j) + w * f[i] * f[j]);
                }
                b.write(i, 0, b.read(i, 0) - w * f[i] * d);
            }
        }

        let x = a
            .cholesky(faer::Side::Lower)
            .map_err(|_| IcpError::SingularSystem)?
            .solve(&b);

        let x = (0..6).map(|i| x.read(i, 0)).collect::<Vec<_>>();
        if x.iter().any(|v| !v.is_finite()) {
            return Err(IcpError::SingularSystem);
        }

        // the first three components are a scaled rotation axis
        let axis = [x[0], x[1], x[2]];
        let angle = dot(&axis, &axis).sqrt();
        Ok(EuclideanTransform::from_axis_angle(
            axis,
            angle,
            [x[3], x[4], x[5]],
        ))
    }
}

/// Minimizes the distance between matched points with a weighted closed form solution.
///
/// Uses the SVD of the weighted cross-covariance of the centered point sets,
/// corrected so that the result is never a reflection. Normals are not used.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointToPointErrorMinimizer;

impl ErrorMinimizer for PointToPointErrorMinimizer {
    fn solve_for_transform(&self, elements: &ErrorElements) -> Result<EuclideanTransform, IcpError> {
        let total_weight = elements.weights.iter().sum::<f64>();
        if elements.is_empty() || total_weight <= 0.0 {
            return Err(IcpError::NoCorrespondences);
        }

        let pairs = || {
            elements
                .reading
                .points()
                .iter()
                .zip(elements.reference.points())
                .zip(&elements.weights)
                .map(|((p, q), w)| (DVec3::from_array(*p), DVec3::from_array(*q), *w))
        };

        let (p_sum, q_sum) = pairs().fold((DVec3::ZERO, DVec3::ZERO), |(ps, qs), (p, q, w)| {
            (ps + w * p, qs + w * q)
        });
        let p_mean = p_sum / total_weight;
        let q_mean = q_sum / total_weight;

        // H = sum w (p - p_mean) (q - q_mean)^T
        let mut h = faer::Mat::<f64>::zeros(3, 3);
        for (p, q, w) in pairs() {
            let (p, q) = ((p - p_mean).to_array(), (q - q_mean).to_array());
            for i in 0..3 {
                for j in 0..3 {
                    h.write(i, j, h.read(i, j) + w * p[i] * q[j]);
                }
            }
        }

        let svd = h.svd();
        let (u, v) = (svd.u(), svd.v());

        // R = V S U^T, with S flipping the least significant direction on reflections
        let rotation = |sign: f64| {
            let col = |j: usize| {
                DVec3::from_array(std::array::from_fn(|i| {
                    (0..3)
                        .map(|k| {
                            let s = if k == 2 { sign } else { 1.0 };
                            v.read(i, k) * s * u.read(j, k)
                        })
                        .sum::<f64>()
                }))
            };
            DMat3::from_cols(col(0), col(1), col(2))
        };

        let mut r = rotation(1.0);
        if r.determinant() < 0.0 {
            r = rotation(-1.0);
        }
        if !r.is_finite() {
            return Err(IcpError::SingularSystem);
        }

        let translation = q_mean - r * p_mean;
        Ok(EuclideanTransform::new(DQuat::from_mat3(&r), translation))
    }
}

/// Solve for the transform between two clouds in known correspondence.
///
/// Runs `iterations` solves, each time re-applying the accumulated transform
/// to the original reading points of `elements`.
pub fn known_correspondence_solve(
    elements: &ErrorElements,
    minimizer: &dyn ErrorMinimizer,
    iterations: usize,
) -> Result<EuclideanTransform, IcpError> {
    let mut current = elements.clone();
    let mut transform = EuclideanTransform::IDENTITY;
    for _ in 0..iterations {
        transform = minimizer.solve_for_transform(&current)? * transform;
        current.reading = elements.reading.transformed(&transform)?;
    }
    Ok(transform)
}
