use crate::centers::row_vec;
use crate::sampler::nearest_subset;
use crate::types::{ClusterState, DipMatrix, Points};
use crate::{DipConfig, DipError, dip_test};
use log::{debug, trace};
use nalgebra::DMatrix;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Pairwise dip p-values of the current clusters.
///
/// For every pair `(i, j)` the points of both clusters are projected onto
/// `c_i - c_j` (embedded centers) and dip-tested. When one cluster is more
/// than `max_cluster_size_diff_factor` times the other, the larger side is
/// cut down to its points nearest the other center and tested again; the
/// smaller of the two p-values is kept, so rebalancing can only make a pair
/// look less separated.
pub fn build_dip_matrix(
    config: &DipConfig,
    points: &Points,
    state: &ClusterState,
) -> Result<DipMatrix, DipError> {
    state.validate(points)?;

    let k = state.n_clusters;
    let members = state.members();
    let centers: Vec<Vec<f64>> = (0..k)
        .map(|c| row_vec(&state.embedded_centers, c))
        .collect();

    let pairs: Vec<(usize, usize)> = (0..k)
        .flat_map(|i| ((i + 1)..k).map(move |j| (i, j)))
        .collect();
    debug!("building dip matrix for {k} clusters ({} pairs)", pairs.len());

    let test_pair =
        |&(i, j): &(usize, usize)| pair_p_value(config, points.embedded, &members, &centers, i, j);

    #[cfg(feature = "parallel")]
    let p_values: Vec<f64> = pairs
        .par_iter()
        .map(test_pair)
        .collect::<Result<_, _>>()?;
    #[cfg(not(feature = "parallel"))]
    let p_values: Vec<f64> = pairs
        .iter()
        .map(test_pair)
        .collect::<Result<_, _>>()?;

    let mut matrix = DipMatrix::zeros(k);
    for (&(i, j), p) in pairs.iter().zip(p_values) {
        matrix.set_pair(i, j, p);
    }
    Ok(matrix)
}

fn pair_p_value(
    config: &DipConfig,
    embedded: &DMatrix<f64>,
    members: &[Vec<usize>],
    centers: &[Vec<f64>],
    i: usize,
    j: usize,
) -> Result<f64, DipError> {
    let axis: Vec<f64> = centers[i]
        .iter()
        .zip(&centers[j])
        .map(|(a, b)| a - b)
        .collect();

    let (members_i, members_j) = (&members[i], &members[j]);
    let (_, mut p_value) = dip_test(&project(embedded, &axis, members_i, members_j), false)?;

    let factor = config.max_cluster_size_diff_factor;
    let (n_i, n_j) = (members_i.len(), members_j.len());
    let rebalanced = if n_i > n_j.saturating_mul(factor) {
        Some((
            nearest_subset(embedded, members_i, &centers[j], n_j, config),
            members_j.clone(),
        ))
    } else if n_j > n_i.saturating_mul(factor) {
        Some((
            members_i.clone(),
            nearest_subset(embedded, members_j, &centers[i], n_i, config),
        ))
    } else {
        None
    };

    if let Some((subset_i, subset_j)) = rebalanced {
        let (_, p_rebalanced) = dip_test(&project(embedded, &axis, &subset_i, &subset_j), false)?;
        trace!(
            "pair ({i}, {j}): {n_i}/{n_j} rebalanced to {}/{}, p = {p_value} / {p_rebalanced}",
            subset_i.len(),
            subset_j.len(),
        );
        p_value = p_value.min(p_rebalanced);
    } else {
        trace!("pair ({i}, {j}): sizes {n_i}/{n_j}, p = {p_value}");
    }

    Ok(p_value)
}

/// Dot products of the selected rows with `axis`, first group then second.
fn project(embedded: &DMatrix<f64>, axis: &[f64], first: &[usize], second: &[usize]) -> Vec<f64> {
    first
        .iter()
        .chain(second)
        .map(|&p| {
            embedded
                .row(p)
                .iter()
                .zip(axis)
                .map(|(x, a)| x * a)
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Three 1-D groups around -10, 0 and 10, with `sizes` points each
    fn three_groups(sizes: [usize; 3]) -> (Vec<DMatrix<f64>>, DMatrix<f64>, ClusterState) {
        let mut coords = Vec::new();
        let mut labels = Vec::new();
        for (c, (&size, base)) in sizes.iter().zip([-10.0, 0.0, 10.0]).enumerate() {
            for i in 0..size {
                coords.push(base + (i as f64 / size as f64 - 0.5));
                labels.push(c);
            }
        }
        let n = coords.len();
        let embedded = DMatrix::from_column_slice(n, 1, &coords);
        let views = vec![DMatrix::from_fn(n, 2, |r, c| coords[r] * (c + 1) as f64)];
        let state = ClusterState {
            labels,
            centers: vec![DMatrix::from_row_slice(3, 2, &[-10.0, -20.0, 0.0, 0.0, 10.0, 20.0])],
            embedded_centers: DMatrix::from_row_slice(3, 1, &[-10.0, 0.0, 10.0]),
            n_clusters: 3,
        };
        (views, embedded, state)
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let (views, embedded, state) = three_groups([30, 40, 50]);
        let points = Points::new(&views, &embedded).unwrap();
        let m = build_dip_matrix(&DipConfig::default(), &points, &state).unwrap();

        assert_eq!(m.n_clusters(), 3);
        for i in 0..3 {
            assert_eq!(m.get(i, i), 0.0);
            for j in 0..3 {
                assert_eq!(m.get(i, j), m.get(j, i));
                assert!((0.0..=1.0).contains(&m.get(i, j)));
            }
        }
    }

    #[test]
    fn separated_groups_get_low_p_values() {
        let (views, embedded, state) = three_groups([30, 40, 50]);
        let points = Points::new(&views, &embedded).unwrap();
        let m = build_dip_matrix(&DipConfig::default(), &points, &state).unwrap();
        assert!(m.get(0, 1) < 0.05);
        assert!(m.get(0, 2) < 0.05);
        assert!(m.get(1, 2) < 0.05);
    }

    #[test]
    fn imbalanced_pair_is_rebalanced() {
        let (views, embedded, state) = three_groups([10, 400, 20]);
        let points = Points::new(&views, &embedded).unwrap();
        let m = build_dip_matrix(&DipConfig::default(), &points, &state).unwrap();
        // On all 410 points the small group barely registers (p close to 1)
        assert!(m.get(0, 1) < 0.2, "p = {}", m.get(0, 1));
        assert!(m.get(1, 2) < 0.05, "p = {}", m.get(1, 2));
        assert!(m.get(0, 2) < 0.05, "p = {}", m.get(0, 2));
    }

    #[test]
    fn single_cluster_matrix() {
        let embedded = DMatrix::from_column_slice(3, 1, &[0.0, 1.0, 2.0]);
        let views = vec![embedded.clone()];
        let state = ClusterState {
            labels: vec![0, 0, 0],
            centers: vec![DMatrix::zeros(1, 1)],
            embedded_centers: DMatrix::zeros(1, 1),
            n_clusters: 1,
        };
        let points = Points::new(&views, &embedded).unwrap();
        let m = build_dip_matrix(&DipConfig::default(), &points, &state).unwrap();
        assert_eq!(m.as_matrix(), &DMatrix::<f64>::zeros(1, 1));
    }

    #[test]
    fn empty_cluster_is_tolerated() {
        let (views, embedded, mut state) = three_groups([30, 40, 50]);
        for label in state.labels.iter_mut() {
            if *label == 1 {
                *label = 0;
            }
        }
        let points = Points::new(&views, &embedded).unwrap();
        let m = build_dip_matrix(&DipConfig::default(), &points, &state).unwrap();
        assert!((0.0..=1.0).contains(&m.get(1, 2)));
    }

    #[test]
    fn invalid_state_is_rejected() {
        let (views, embedded, mut state) = three_groups([5, 5, 5]);
        state.labels[3] = 7;
        let points = Points::new(&views, &embedded).unwrap();
        let err = build_dip_matrix(&DipConfig::default(), &points, &state).unwrap_err();
        assert!(matches!(err, DipError::LabelOutOfRange { index: 3, label: 7, .. }));
    }

    #[test]
    fn projection_follows_center_axis() {
        let embedded = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let projected = project(&embedded, &[1.0, -1.0], &[2], &[0, 1]);
        assert_eq!(projected, vec![-1.0, -1.0, -1.0]);
    }
}
