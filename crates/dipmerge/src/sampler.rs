use crate::DipConfig;
use crate::centers::row_squared_distance;
use nalgebra::DMatrix;

/// How many points of the larger cluster go into a rebalanced test.
///
/// Normally `factor` times the smaller cluster, but never so few that the two
/// together fall under `min_sample_size`, and never more than `cluster_size`.
pub fn sample_size(
    cluster_size: usize,
    target_size: usize,
    diff_factor: usize,
    min_sample_size: usize,
) -> usize {
    let mut size = target_size.saturating_mul(diff_factor);
    if target_size.saturating_add(size) < min_sample_size {
        size = (min_sample_size - target_size).min(cluster_size);
    }
    size.min(cluster_size)
}

/// The points of an oversized cluster that are nearest to the other
/// cluster's center.
///
/// `members` are row indices into `points` belonging to the larger cluster.
/// The result holds [`sample_size`] of them, nearest first; equal distances
/// keep the order of `members`.
pub fn nearest_subset(
    points: &DMatrix<f64>,
    members: &[usize],
    reference_center: &[f64],
    target_size: usize,
    config: &DipConfig,
) -> Vec<usize> {
    let size = sample_size(
        members.len(),
        target_size,
        config.max_cluster_size_diff_factor,
        config.min_sample_size,
    );

    let mut by_distance: Vec<(f64, usize)> = members
        .iter()
        .map(|&i| (row_squared_distance(points, i, reference_center), i))
        .collect();
    // Stable, so ties stay in member order
    by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));

    by_distance.into_iter().take(size).map(|(_, i)| i).collect()
}
