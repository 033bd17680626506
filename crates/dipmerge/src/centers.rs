use crate::types::Points;
use crate::{DimensionMismatchSnafu, DipError};
use nalgebra::DMatrix;
use snafu::ensure;

/// Squared Euclidean distance between row `row` of `m` and `center`.
#[inline]
pub(crate) fn row_squared_distance(m: &DMatrix<f64>, row: usize, center: &[f64]) -> f64 {
    m.row(row)
        .iter()
        .zip(center)
        .map(|(&a, &b)| {
            let d = a - b;
            d * d
        })
        .sum()
}

/// Row `row` of `m` as an owned vector.
#[inline]
pub(crate) fn row_vec(m: &DMatrix<f64>, row: usize) -> Vec<f64> {
    m.row(row).iter().copied().collect()
}

/// Index of the row of `m` closest to `center`, first one on ties.
pub(crate) fn nearest_row(m: &DMatrix<f64>, center: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for i in 0..m.nrows() {
        let d = row_squared_distance(m, i, center);
        if best.is_none_or(|(_, best_d)| d < best_d) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// Pairwise squared distances, `points.nrows() x centers.nrows()`.
///
/// With `weights`, every coordinate difference is scaled by the weight of its
/// dimension before squaring.
pub fn squared_euclidean_distance(
    centers: &DMatrix<f64>,
    points: &DMatrix<f64>,
    weights: Option<&[f64]>,
) -> Result<DMatrix<f64>, DipError> {
    let dim = centers.ncols();
    ensure!(
        points.ncols() == dim,
        DimensionMismatchSnafu {
            what: "points",
            expected: dim,
            got: points.ncols(),
        }
    );
    if let Some(w) = weights {
        ensure!(
            w.len() == dim,
            DimensionMismatchSnafu {
                what: "weights",
                expected: dim,
                got: w.len(),
            }
        );
    }

    Ok(DMatrix::from_fn(points.nrows(), centers.nrows(), |i, c| {
        (0..dim)
            .map(|d| {
                let mut diff = centers[(c, d)] - points[(i, d)];
                if let Some(w) = weights {
                    diff *= w[d];
                }
                diff * diff
            })
            .sum()
    }))
}

/// Data points standing in for a set of optimal centers.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestCenters {
    /// For each optimal center, the index of the nearest embedded point.
    pub indices: Vec<usize>,
    /// Raw rows of those points, one matrix per view.
    pub centers: Vec<DMatrix<f64>>,
    /// Embedded rows of those points.
    pub embedded_centers: DMatrix<f64>,
}

/// Snaps every row of `optimal_centers` (embedded space) to its nearest
/// embedded data point and gathers that point's rows in every view.
///
/// An empty point set yields no candidates, so the result is empty too.
pub fn nearest_points_to_centers(
    points: &Points,
    optimal_centers: &DMatrix<f64>,
) -> Result<NearestCenters, DipError> {
    ensure!(
        optimal_centers.ncols() == points.embedded.ncols(),
        DimensionMismatchSnafu {
            what: "optimal centers",
            expected: points.embedded.ncols(),
            got: optimal_centers.ncols(),
        }
    );

    let indices: Vec<usize> = (0..optimal_centers.nrows())
        .filter_map(|c| nearest_row(points.embedded, &row_vec(optimal_centers, c)))
        .collect();

    let centers: Vec<DMatrix<f64>> = points
        .views
        .iter()
        .map(|view| view.select_rows(indices.iter()))
        .collect();
    let embedded_centers = points.embedded.select_rows(indices.iter());

    Ok(NearestCenters {
        indices,
        centers,
        embedded_centers,
    })
}
