use rayon::prelude::*;

use crate::{
    search::{check_sizes_knn, squared_distance, INVALID_INDEX, SELF_MATCH_EPSILON},
    BoundedPriorityQueue, DenseMatrix, KnnError, NearestNeighborSearch, SearchParams,
};

/// Node of the flattened tree. The left child of a split node is always the next node.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Split {
        dim: usize,
        cut_value: f64,
        right_child: usize,
    },
    Leaf {
        bucket_start: usize,
        bucket_len: usize,
    },
}

/// Bucketed k-d tree with sliding-midpoint splits.
///
/// Every split cuts the largest side of the current bounding box at its
/// midpoint, clamped to the extent of the points it holds. Leaves hold at most
/// `bucket_size` reference indices. Queries accept an `epsilon` that trades
/// exactness for fewer visited leaves.
#[derive(Debug, Clone)]
pub struct KdTreeSearch {
    cloud: DenseMatrix<f64>,
    bucket_size: usize,
    nodes: Vec<Node>,
    buckets: Vec<usize>,
}

/// Number of bits needed to store `v`.
pub(crate) fn storage_bit_count(v: usize) -> u32 {
    usize::BITS - v.leading_zeros()
}

/// Check that a tree over `count` points of dimension `dimensions` cannot
/// address more nodes than the node indices allow.
///
/// Returns the estimated number of nodes.
pub(crate) fn check_node_count(
    count: usize,
    dimensions: usize,
    bucket_size: usize,
) -> Result<usize, KnnError> {
    let dim_bits = storage_bit_count(dimensions);
    let index_bits = 32u32.saturating_sub(dim_bits);
    let max_nodes = (1usize << index_bits) - 1;
    let estimated = count / (bucket_size / 2).max(1);
    if estimated > max_nodes {
        return Err(KnnError::TooManyNodes {
            estimated,
            max: max_nodes,
            dim_bits,
            index_bits,
        });
    }
    Ok(estimated)
}

impl KdTreeSearch {
    /// Build a tree over `cloud`, one reference point per column.
    ///
    /// # Errors
    ///
    /// * [`KnnError::InvalidBucketSize`] if `bucket_size < 2`.
    /// * [`KnnError::EmptyCloud`] if the cloud has no column.
    /// * [`KnnError::NonFiniteCloud`] if a coordinate is infinite or not a number.
    /// * [`KnnError::TooManyNodes`] if the tree could exceed the addressable
    ///   node count for this dimensionality.
    pub fn new(cloud: DenseMatrix<f64>, bucket_size: usize) -> Result<Self, KnnError> {
        if bucket_size < 2 {
            return Err(KnnError::InvalidBucketSize(bucket_size));
        }
        if cloud.cols() == 0 {
            return Err(KnnError::EmptyCloud);
        }
        if cloud.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(KnnError::NonFiniteCloud);
        }

        let count = cloud.cols();
        let estimated = check_node_count(count, cloud.rows(), bucket_size)?;

        let mut builder = TreeBuilder {
            cloud: &cloud,
            bucket_size,
            nodes: Vec::with_capacity(2 * estimated + 1),
            buckets: Vec::with_capacity(count),
        };

        let mut points = (0..count).collect::<Vec<_>>();
        if count <= bucket_size || cloud.rows() == 0 {
            builder.push_leaf(&points);
        } else {
            let (mut min_bounds, mut max_bounds) = bounds(&cloud);
            builder.build_nodes(&mut points, &mut min_bounds, &mut max_bounds);
        }

        let TreeBuilder { nodes, buckets, .. } = builder;
        log::debug!(
            "kd-tree built over {} points of dimension {}: {} nodes, bucket size {}",
            count,
            cloud.rows(),
            nodes.len(),
            bucket_size
        );

        Ok(Self {
            cloud,
            bucket_size,
            nodes,
            buckets,
        })
    }

    /// The reference cloud.
    pub fn cloud(&self) -> &DenseMatrix<f64> {
        &self.cloud
    }

    /// Maximum number of reference points per leaf.
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Number of nodes, split and leaf, in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn recurse_knn(
        &self,
        ctx: &QueryContext,
        n: usize,
        rd: f64,
        heap: &mut BoundedPriorityQueue<usize>,
        off: &mut [f64],
    ) -> u64 {
        match self.nodes[n] {
            Node::Leaf {
                bucket_start,
                bucket_len,
            } => {
                for &index in &self.buckets[bucket_start..bucket_start + bucket_len] {
                    let dist = squared_distance(self.cloud.col(index), ctx.query);
                    if dist <= ctx.max_radius2
                        && (ctx.allow_self_match || dist > SELF_MATCH_EPSILON)
                    {
                        heap.enqueue(index, dist);
                    }
                }
                bucket_len as u64
            }
            Node::Split {
                dim,
                cut_value,
                right_child,
            } => {
                let old_off = off[dim];
                let new_off = ctx.query[dim] - cut_value;
                let (near, far) = if new_off > 0.0 {
                    (right_child, n + 1)
                } else {
                    (n + 1, right_child)
                };

                let mut touched = self.recurse_knn(ctx, near, rd, heap, off);

                let rd = rd - old_off * old_off + new_off * new_off;
                if rd <= ctx.max_radius2 && rd * ctx.max_error2 < heap.max_priority() {
                    off[dim] = new_off;
                    touched += self.recurse_knn(ctx, far, rd, heap, off);
                    off[dim] = old_off;
                }
                touched
            }
        }
    }
}

struct QueryContext<'a> {
    query: &'a [f64],
    max_error2: f64,
    max_radius2: f64,
    allow_self_match: bool,
}

impl NearestNeighborSearch for KdTreeSearch {
    fn dimensions(&self) -> usize {
        self.cloud.rows()
    }

    fn len(&self) -> usize {
        self.cloud.cols()
    }

    fn knn(
        &self,
        query: &DenseMatrix<f64>,
        indices: &mut DenseMatrix<usize>,
        dists2: &mut DenseMatrix<f64>,
        max_radii: Option<&[f64]>,
        params: &SearchParams,
    ) -> Result<u64, KnnError> {
        let k = params.k;
        check_sizes_knn(
            self.dimensions(),
            self.len(),
            query,
            indices,
            dists2,
            max_radii,
            k,
        )?;

        let dims = self.dimensions();
        let max_error2 = (1.0 + params.epsilon) * (1.0 + params.epsilon);

        let touched = indices
            .as_mut_slice()
            .par_chunks_mut(k)
            .zip(dists2.as_mut_slice().par_chunks_mut(k))
            .enumerate()
            .map_init(
                || (vec![0.0; dims], BoundedPriorityQueue::new(k)),
                |(off, heap), (i, (indices_col, dists2_col))| {
                    off.fill(0.0);
                    heap.reset();

                    let max_radius = max_radii.map_or(f64::INFINITY, |radii| radii[i]);
                    let ctx = QueryContext {
                        query: &query.col(i)[..dims],
                        max_error2,
                        max_radius2: max_radius * max_radius,
                        allow_self_match: params.allow_self_match,
                    };
                    let touched = self.recurse_knn(&ctx, 0, 0.0, heap, off);

                    for (slot, item) in indices_col.iter_mut().zip(heap.items()) {
                        *slot = item.copied().unwrap_or(INVALID_INDEX);
                    }
                    for (slot, dist) in dists2_col.iter_mut().zip(heap.priorities()) {
                        *slot = dist;
                    }
                    touched
                },
            )
            .sum();

        Ok(touched)
    }
}

// Bounding box of all the columns of the cloud.
fn bounds(cloud: &DenseMatrix<f64>) -> (Vec<f64>, Vec<f64>) {
    let mut min_bounds = vec![f64::INFINITY; cloud.rows()];
    let mut max_bounds = vec![f64::NEG_INFINITY; cloud.rows()];
    for j in 0..cloud.cols() {
        for (d, v) in cloud.col(j).iter().enumerate() {
            min_bounds[d] = min_bounds[d].min(*v);
            max_bounds[d] = max_bounds[d].max(*v);
        }
    }
    (min_bounds, max_bounds)
}

struct TreeBuilder<'a> {
    cloud: &'a DenseMatrix<f64>,
    bucket_size: usize,
    nodes: Vec<Node>,
    buckets: Vec<usize>,
}

impl TreeBuilder<'_> {
    fn push_leaf(&mut self, points: &[usize]) -> usize {
        let pos = self.nodes.len();
        self.nodes.push(Node::Leaf {
            bucket_start: self.buckets.len(),
            bucket_len: points.len(),
        });
        self.buckets.extend_from_slice(points);
        pos
    }

    // Min and max of the points along `dim`.
    fn point_bounds(&self, points: &[usize], dim: usize) -> (f64, f64) {
        points
            .iter()
            .map(|&i| *self.cloud.get(dim, i))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    }

    fn build_nodes(
        &mut self,
        points: &mut [usize],
        min_bounds: &mut [f64],
        max_bounds: &mut [f64],
    ) -> usize {
        let count = points.len();
        if count <= self.bucket_size {
            return self.push_leaf(points);
        }

        // largest side of the box, first one on ties
        let mut cut_dim = 0;
        for d in 1..min_bounds.len() {
            if max_bounds[d] - min_bounds[d] > max_bounds[cut_dim] - min_bounds[cut_dim] {
                cut_dim = d;
            }
        }
        let ideal_cut = (max_bounds[cut_dim] + min_bounds[cut_dim]) / 2.0;

        let (min_value, max_value) = self.point_bounds(points, cut_dim);
        let cut_value = ideal_cut.clamp(min_value, max_value);

        let cloud = self.cloud;
        let value = |i: usize| *cloud.get(cut_dim, i);
        // now: points[..br1] < cut_value <= points[br1..]
        let br1 = partition(points, 0, |i| value(i) < cut_value);
        // now: points[br1..br2] == cut_value < points[br2..]
        let br2 = partition(points, br1, |i| value(i) <= cut_value);

        let left_count = if ideal_cut < min_value {
            1
        } else if ideal_cut > max_value {
            count - 1
        } else if br1 > count / 2 {
            br1
        } else if br2 < count / 2 {
            br2
        } else {
            count / 2
        }
        .clamp(1, count - 1);

        let pos = self.nodes.len();
        self.nodes.push(Node::Split {
            dim: cut_dim,
            cut_value,
            right_child: 0,
        });

        let (left_points, right_points) = points.split_at_mut(left_count);

        let old_max = max_bounds[cut_dim];
        max_bounds[cut_dim] = cut_value;
        self.build_nodes(left_points, min_bounds, max_bounds);
        max_bounds[cut_dim] = old_max;

        let old_min = min_bounds[cut_dim];
        min_bounds[cut_dim] = cut_value;
        let right = self.build_nodes(right_points, min_bounds, max_bounds);
        min_bounds[cut_dim] = old_min;

        if let Node::Split { right_child, .. } = &mut self.nodes[pos] {
            *right_child = right;
        }
        pos
    }
}

// Move the points of `points[start..]` satisfying `is_left` to the front of
// that range. Returns the index of the first point not satisfying it.
fn partition(points: &mut [usize], start: usize, is_left: impl Fn(usize) -> bool) -> usize {
    let (mut l, mut r) = (start, points.len());
    loop {
        while l < r && is_left(points[l]) {
            l += 1;
        }
        while l < r && !is_left(points[r - 1]) {
            r -= 1;
        }
        if l >= r {
            return l;
        }
        points.swap(l, r - 1);
        l += 1;
        r -= 1;
    }
}
