/// Squared Euclidean distance between two points.
#[inline]
pub fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// Utility function to compute the Euclidean distance between two points.
///
/// Example:
/// ```
/// use kornia_3d::ops::euclidean_distance;
///
/// let a = [1.0, 2.0, 3.0];
/// let b = [4.0, 5.0, 6.0];
/// let dst = euclidean_distance(&a, &b);
/// ```
pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Dot product of two vectors.
#[inline]
pub fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product of two vectors.
#[inline]
pub fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Mean of a set of points, `None` if the set is empty.
pub fn centroid<'a>(points: impl IntoIterator<Item = &'a [f64; 3]>) -> Option<[f64; 3]> {
    let (sum, count) = points.into_iter().fold(([0.0; 3], 0usize), |(acc, n), p| {
        ([acc[0] + p[0], acc[1] + p[1], acc[2] + p[2]], n + 1)
    });
    if count == 0 {
        return None;
    }
    let n = count as f64;
    Some([sum[0] / n, sum[1] / n, sum[2] / n])
}

/// Mean squared distance between pairwise corresponding points.
///
/// Returns 0 when the slices are empty. Extra elements of the longer slice are ignored.
pub fn average_sq_distance(points1: &[[f64; 3]], points2: &[[f64; 3]]) -> f64 {
    let n = points1.len().min(points2.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = points1
        .iter()
        .zip(points2.iter())
        .map(|(a, b)| squared_distance(a, b))
        .sum();
    sum / n as f64
}
