use crate::{
    DimensionMismatchSnafu, DipError, LabelOutOfRangeSnafu, NoViewsSnafu, RowCountMismatchSnafu,
};
use nalgebra::DMatrix;
use snafu::ensure;

/// Borrowed point data, one row per point in every matrix.
///
/// `views` are the raw per-view feature matrices, `embedded` the coordinates
/// produced by the encoder. Row `i` of each matrix is the same data point.
#[derive(Debug, Copy, Clone)]
pub struct Points<'a> {
    pub views: &'a [DMatrix<f64>],
    pub embedded: &'a DMatrix<f64>,
}

impl<'a> Points<'a> {
    pub fn new(views: &'a [DMatrix<f64>], embedded: &'a DMatrix<f64>) -> Result<Self, DipError> {
        ensure!(!views.is_empty(), NoViewsSnafu);
        for view in views {
            ensure!(
                view.nrows() == embedded.nrows(),
                RowCountMismatchSnafu {
                    what: "raw feature view",
                    expected: embedded.nrows(),
                    got: view.nrows(),
                }
            );
        }
        Ok(Self { views, embedded })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.embedded.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Labels and centers of the current clustering, owned by the driver.
///
/// Row `c` of every center matrix belongs to cluster `c`, and labels are
/// always in `0..n_clusters`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterState {
    pub labels: Vec<usize>,
    pub centers: Vec<DMatrix<f64>>,
    pub embedded_centers: DMatrix<f64>,
    pub n_clusters: usize,
}

impl ClusterState {
    /// Checks that the state lines up with `points`.
    pub fn validate(&self, points: &Points) -> Result<(), DipError> {
        let k = self.n_clusters;

        ensure!(
            self.labels.len() == points.len(),
            RowCountMismatchSnafu {
                what: "labels",
                expected: points.len(),
                got: self.labels.len(),
            }
        );
        if let Some((index, &label)) = self.labels.iter().enumerate().find(|(_, l)| **l >= k) {
            return LabelOutOfRangeSnafu {
                index,
                label,
                n_clusters: k,
            }
            .fail();
        }

        ensure!(
            self.centers.len() == points.views.len(),
            DimensionMismatchSnafu {
                what: "center views",
                expected: points.views.len(),
                got: self.centers.len(),
            }
        );
        for (centers, view) in self.centers.iter().zip(points.views) {
            ensure!(
                centers.nrows() == k,
                RowCountMismatchSnafu {
                    what: "raw centers",
                    expected: k,
                    got: centers.nrows(),
                }
            );
            ensure!(
                centers.ncols() == view.ncols(),
                DimensionMismatchSnafu {
                    what: "raw centers",
                    expected: view.ncols(),
                    got: centers.ncols(),
                }
            );
        }

        ensure!(
            self.embedded_centers.nrows() == k,
            RowCountMismatchSnafu {
                what: "embedded centers",
                expected: k,
                got: self.embedded_centers.nrows(),
            }
        );
        ensure!(
            self.embedded_centers.ncols() == points.embedded.ncols(),
            DimensionMismatchSnafu {
                what: "embedded centers",
                expected: points.embedded.ncols(),
                got: self.embedded_centers.ncols(),
            }
        );

        Ok(())
    }

    /// Number of points per cluster. Assumes labels are in range.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.n_clusters];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    /// Point indices per cluster, in ascending order. Assumes labels are in range.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.n_clusters];
        for (i, &label) in self.labels.iter().enumerate() {
            members[label].push(i);
        }
        members
    }
}

/// Symmetric matrix of pairwise dip p-values with a zero diagonal.
///
/// A high value means the two clusters look like one unimodal group along
/// the axis joining their centers.
#[derive(Debug, Clone, PartialEq)]
pub struct DipMatrix {
    values: DMatrix<f64>,
}

impl DipMatrix {
    pub(crate) fn zeros(n_clusters: usize) -> Self {
        Self {
            values: DMatrix::zeros(n_clusters, n_clusters),
        }
    }

    pub(crate) fn set_pair(&mut self, i: usize, j: usize, p_value: f64) {
        self.values[(i, j)] = p_value;
        self.values[(j, i)] = p_value;
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[(i, j)]
    }

    #[inline]
    pub fn n_clusters(&self) -> usize {
        self.values.nrows()
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn into_inner(self) -> DMatrix<f64> {
        self.values
    }

    /// The pair `(i, j, p)` with `i < j` and the largest p-value.
    ///
    /// Ties go to the first pair in row-major order. This is the usual merge
    /// candidate; whether it clears a threshold is up to the caller.
    pub fn most_unimodal_pair(&self) -> Option<(usize, usize, f64)> {
        let k = self.n_clusters();
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..k {
            for j in (i + 1)..k {
                let p = self.values[(i, j)];
                if best.is_none_or(|(_, _, best_p)| p > best_p) {
                    best = Some((i, j, p));
                }
            }
        }
        best
    }
}
