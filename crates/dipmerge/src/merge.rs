use crate::centers::{nearest_points_to_centers, row_vec};
use crate::matrix::build_dip_matrix;
use crate::types::{ClusterState, DipMatrix, Points};
use crate::{DipConfig, DipError, EmptyPairSnafu, InvalidPairSnafu};
use log::debug;
use nalgebra::DMatrix;
use snafu::ensure;

/// Clustering after a merge, with the dip matrix recomputed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub state: ClusterState,
    pub dip_matrix: DipMatrix,
}

/// Label map for merging `pair` out of `n_clusters` clusters.
///
/// `n_clusters` is the count before the merge and must be at least 2. Both
/// members of the pair get the last id of the merged clustering,
/// `n_clusters - 2`; the other labels close the two gaps while keeping their
/// relative order.
pub fn relabel(labels: &[usize], pair: (usize, usize), n_clusters: usize) -> Vec<usize> {
    debug_assert!(n_clusters >= 2, "relabel needs at least two clusters");
    let (a, b) = pair;
    let merged = n_clusters - 2;
    labels
        .iter()
        .map(|&l| {
            if l == a || l == b {
                merged
            } else if l < a && l < b {
                l
            } else if l > a && l > b {
                l - 2
            } else {
                l - 1
            }
        })
        .collect()
}

/// Merges the two clusters of `pair` into one.
///
/// The merged cluster gets the last id of the new clustering. Its center is
/// the data point nearest to the size-weighted mean of the two old embedded
/// centers, so centers stay actual data points in every view. The center
/// rows of the pair are dropped, the new row goes last, and the dip matrix is
/// rebuilt for the smaller clustering.
pub fn merge_by_dip_value(
    config: &DipConfig,
    points: &Points,
    state: &ClusterState,
    pair: (usize, usize),
) -> Result<MergeOutcome, DipError> {
    state.validate(points)?;

    let k = state.n_clusters;
    let (a, b) = pair;
    ensure!(
        a != b && a < k && b < k,
        InvalidPairSnafu {
            first: a,
            second: b,
            n_clusters: k,
        }
    );

    let sizes = state.cluster_sizes();
    let (n_a, n_b) = (sizes[a], sizes[b]);
    ensure!(n_a + n_b > 0, EmptyPairSnafu { first: a, second: b });

    let (w_a, w_b) = (n_a as f64, n_b as f64);
    let center_a = row_vec(&state.embedded_centers, a);
    let center_b = row_vec(&state.embedded_centers, b);
    let optimal: Vec<f64> = center_a
        .iter()
        .zip(&center_b)
        .map(|(ca, cb)| (ca * w_a + cb * w_b) / (w_a + w_b))
        .collect();

    let optimal = DMatrix::from_row_slice(1, optimal.len(), &optimal);
    let nearest = nearest_points_to_centers(points, &optimal)?;
    debug!(
        "merging clusters {a} ({n_a} points) and {b} ({n_b} points) into {}, center at point {:?}",
        k - 2,
        nearest.indices,
    );

    let keep: Vec<usize> = (0..k).filter(|&c| c != a && c != b).collect();
    let centers: Vec<DMatrix<f64>> = state
        .centers
        .iter()
        .zip(&nearest.centers)
        .map(|(old, new)| append_rows(&old.select_rows(keep.iter()), new))
        .collect();
    let embedded_centers = append_rows(
        &state.embedded_centers.select_rows(keep.iter()),
        &nearest.embedded_centers,
    );

    let merged = ClusterState {
        labels: relabel(&state.labels, pair, k),
        centers,
        embedded_centers,
        n_clusters: k - 1,
    };

    debug_assert!(merged.labels.iter().all(|&l| l < k - 1));
    debug_assert!(
        sizes.contains(&0) || merged.cluster_sizes().iter().all(|&s| s > 0),
        "merge left a gap in the label set",
    );

    let dip_matrix = build_dip_matrix(config, points, &merged)?;
    Ok(MergeOutcome {
        state: merged,
        dip_matrix,
    })
}

/// `top` with the rows of `bottom` stacked underneath.
fn append_rows(top: &DMatrix<f64>, bottom: &DMatrix<f64>) -> DMatrix<f64> {
    debug_assert_eq!(top.ncols(), bottom.ncols());
    let split = top.nrows();
    DMatrix::from_fn(split + bottom.nrows(), top.ncols(), |r, c| {
        if r < split {
            top[(r, c)]
        } else {
            bottom[(r - split, c)]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    #[test]
    fn relabel_closes_gaps() {
        let labels = [0, 1, 2, 3, 4];
        assert_eq!(relabel(&labels, (1, 3), 5), vec![0, 3, 1, 3, 2]);
        assert_eq!(relabel(&labels, (3, 1), 5), vec![0, 3, 1, 3, 2]);
        assert_eq!(relabel(&labels, (0, 4), 5), vec![3, 0, 1, 2, 3]);
        assert_eq!(relabel(&[0, 1, 1, 0], (0, 1), 2), vec![0, 0, 0, 0]);
    }

    #[test]
    fn relabel_stays_contiguous_for_every_pair() {
        let k = 6;
        let labels: Vec<usize> = (0..k).cycle().take(30).collect();
        for a in 0..k {
            for b in 0..k {
                if a == b {
                    continue;
                }
                let relabeled = relabel(&labels, (a, b), k);
                let set: BTreeSet<usize> = relabeled.iter().copied().collect();
                assert_eq!(set, (0..k - 1).collect::<BTreeSet<_>>(), "pair ({a}, {b})");
            }
        }
    }

    #[test]
    #[should_panic(expected = "at least two clusters")]
    fn relabel_needs_two_clusters() {
        relabel(&[0, 0], (0, 1), 1);
    }

    fn line_clusters() -> (Vec<DMatrix<f64>>, DMatrix<f64>, ClusterState) {
        // Clusters 0: {0, 1}, 1: {10, 11, 12}, 2: {20}
        let coords = [0.0, 1.0, 10.0, 11.0, 12.0, 20.0];
        let embedded = DMatrix::from_column_slice(6, 1, &coords);
        let views = vec![
            DMatrix::from_fn(6, 2, |r, c| coords[r] + 100.0 * c as f64),
            DMatrix::from_fn(6, 1, |r, _| -coords[r]),
        ];
        let state = ClusterState {
            labels: vec![0, 0, 1, 1, 1, 2],
            centers: vec![
                DMatrix::from_row_slice(3, 2, &[0.0, 100.0, 11.0, 111.0, 20.0, 120.0]),
                DMatrix::from_row_slice(3, 1, &[0.0, -11.0, -20.0]),
            ],
            embedded_centers: DMatrix::from_row_slice(3, 1, &[0.0, 11.0, 20.0]),
            n_clusters: 3,
        };
        (views, embedded, state)
    }

    #[test]
    fn merged_center_is_nearest_point_to_weighted_mean() {
        let (views, embedded, state) = line_clusters();
        let points = Points::new(&views, &embedded).unwrap();

        // Weighted mean of 0 (2 points) and 11 (3 points) is 6.6, nearest point is 10
        let outcome = merge_by_dip_value(&DipConfig::default(), &points, &state, (0, 1)).unwrap();
        let merged = outcome.state;

        assert_eq!(merged.n_clusters, 2);
        assert_eq!(merged.labels, vec![1, 1, 1, 1, 1, 0]);
        assert_eq!(
            merged.embedded_centers,
            DMatrix::from_row_slice(2, 1, &[20.0, 10.0])
        );
        assert_eq!(
            merged.centers[0],
            DMatrix::from_row_slice(2, 2, &[20.0, 120.0, 10.0, 110.0])
        );
        assert_eq!(merged.centers[1], DMatrix::from_row_slice(2, 1, &[-20.0, -10.0]));
        assert_eq!(outcome.dip_matrix.n_clusters(), 2);
    }

    #[test]
    fn rows_follow_labels() {
        let (views, embedded, state) = line_clusters();
        let points = Points::new(&views, &embedded).unwrap();
        let outcome = merge_by_dip_value(&DipConfig::default(), &points, &state, (2, 0)).unwrap();
        let merged = outcome.state;

        // Old cluster 1 becomes 0 and keeps its center row
        assert_eq!(merged.labels, vec![1, 1, 0, 0, 0, 1]);
        assert_eq!(merged.embedded_centers[(0, 0)], 11.0);
        assert_eq!(merged.centers[1][(0, 0)], -11.0);
    }

    #[test]
    fn invalid_pairs_are_rejected() {
        let (views, embedded, state) = line_clusters();
        let points = Points::new(&views, &embedded).unwrap();
        let config = DipConfig::default();

        for pair in [(1, 1), (0, 3), (5, 2)] {
            let err = merge_by_dip_value(&config, &points, &state, pair).unwrap_err();
            assert!(matches!(err, DipError::InvalidPair { .. }), "{pair:?}");
        }
    }

    #[test]
    fn empty_pair_is_rejected() {
        let (views, embedded, mut state) = line_clusters();
        state.labels = vec![1; 6];
        let points = Points::new(&views, &embedded).unwrap();
        let err = merge_by_dip_value(&DipConfig::default(), &points, &state, (0, 2)).unwrap_err();
        assert!(matches!(err, DipError::EmptyPair { first: 0, second: 2 }));
    }

    #[test]
    fn append_rows_stacks() {
        let top = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let bottom = DMatrix::from_row_slice(1, 2, &[5.0, 6.0]);
        assert_eq!(
            append_rows(&top, &bottom),
            DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );
    }
}
