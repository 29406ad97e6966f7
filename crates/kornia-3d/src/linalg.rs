use crate::{pointcloud::PointCloudError, transforms::EuclideanTransform};

/// Transform a set of points with a rigid transform.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `transform` - The rigid transform to apply.
/// * `dst_points` - A pre-allocated buffer of the same size as `src_points`.
///
/// Example:
///
/// ```no_run
/// use kornia_3d::{linalg::transform_points, transforms::EuclideanTransform};
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &EuclideanTransform::IDENTITY, &mut dst_points).unwrap();
/// ```
pub fn transform_points(
    src_points: &[[f64; 3]],
    transform: &EuclideanTransform,
    dst_points: &mut [[f64; 3]],
) -> Result<(), PointCloudError> {
    if src_points.len() != dst_points.len() {
        return Err(PointCloudError::LengthMismatch(
            dst_points.len(),
            src_points.len(),
        ));
    }

    let rotation = transform.rotation_matrix();
    let dst_r_src = faer::Mat::<f64>::from_fn(3, 3, |i, j| rotation[i][j]);

    {
        // SAFETY: `[[f64; 3]]` is a contiguous buffer of 3N values, one point per column
        let points_in_src = {
            let src_points_slice = unsafe {
                std::slice::from_raw_parts(src_points.as_ptr() as *const f64, src_points.len() * 3)
            };
            faer::mat::from_column_major_slice(src_points_slice, 3, src_points.len())
        };

        // SAFETY: same layout as above, and the buffer is exclusively borrowed
        let mut points_in_dst = {
            let dst_points_slice = unsafe {
                std::slice::from_raw_parts_mut(
                    dst_points.as_mut_ptr() as *mut f64,
                    dst_points.len() * 3,
                )
            };
            faer::mat::from_column_major_slice_mut(dst_points_slice, 3, dst_points.len())
        };

        faer::linalg::matmul::matmul(
            &mut points_in_dst,
            dst_r_src.as_ref(),
            points_in_src,
            None,
            1.0,
            faer::Parallelism::None,
        );
    }

    let t = transform.translation;
    for p in dst_points.iter_mut() {
        p[0] += t.x;
        p[1] += t.y;
        p[2] += t.z;
    }

    Ok(())
}
