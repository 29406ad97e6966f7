use std::cmp::Ordering;

/// Partially order `indices` so that position `n` holds the element of rank `n`.
///
/// Elements are compared through `key(index)`. After the call, every element
/// before `n` has a key `<=` the key at `n`, and every element after `n` has a
/// key `>=` it. The order within each side is unspecified.
///
/// To select within a sub-range, pass the sub-slice and a rank relative to it.
///
/// # Panics
///
/// Panics if `n` is out of bounds of a non-empty slice.
///
/// Example:
///
/// ```
/// use kornia_knn::select::select_nth;
///
/// let values = [5.0, 1.0, 4.0, 2.0, 3.0];
/// let mut indices = (0..values.len()).collect::<Vec<_>>();
/// select_nth(&mut indices, 2, |i| values[i]);
/// assert_eq!(values[indices[2]], 3.0);
/// ```
pub fn select_nth(indices: &mut [usize], n: usize, key: impl Fn(usize) -> f64) {
    if indices.is_empty() {
        return;
    }
    assert!(n < indices.len(), "rank {} out of bounds", n);

    let (mut left, mut right) = (0, indices.len() - 1);
    while left < right {
        let pivot = median_of_three(indices, left, right, &key);
        let (lt, gt) = partition3(indices, left, right, pivot, &key);

        // now: [left, lt) < pivot == [lt, gt) < [gt, right]
        if n < lt {
            right = lt - 1;
        } else if n >= gt {
            left = gt;
        } else {
            return;
        }
    }
}

/// Value at the `q` quantile of `values`, selected without a full sort.
///
/// The selected rank is `floor(len * q)`, clamped to the last element.
/// Returns `None` for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let rank = ((values.len() as f64 * q) as usize).min(values.len() - 1);
    let mut indices = (0..values.len()).collect::<Vec<_>>();
    select_nth(&mut indices, rank, |i| values[i]);
    Some(values[indices[rank]])
}

fn median_of_three(indices: &[usize], left: usize, right: usize, key: &impl Fn(usize) -> f64) -> f64 {
    let mid = left + (right - left) / 2;
    let mut v = [key(indices[left]), key(indices[mid]), key(indices[right])];
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    v[1]
}

// Dutch national flag partition of indices[left..=right] around `pivot`.
fn partition3(
    indices: &mut [usize],
    left: usize,
    right: usize,
    pivot: f64,
    key: &impl Fn(usize) -> f64,
) -> (usize, usize) {
    let (mut lt, mut i, mut gt) = (left, left, right + 1);
    while i < gt {
        let v = key(indices[i]);
        if v < pivot {
            indices.swap(lt, i);
            lt += 1;
            i += 1;
        } else if v > pivot {
            gt -= 1;
            indices.swap(i, gt);
        } else {
            i += 1;
        }
    }
    (lt, gt)
}
