//! Dip-test based cluster separation and merging.
//!
//! After each training epoch of a deep embedded clustering model, the driver
//! asks this crate how separable every pair of current clusters is
//! ([`build_dip_matrix`]) and, once it has picked a pair, folds that pair into
//! a single cluster ([`merge_by_dip_value`]). Deciding *whether* to merge is
//! left to the driver.
//!
//! ```
//! use dipmerge::dip_test;
//!
//! let mut sample: Vec<f64> = (0..20).map(|i| -5.0 + 0.01 * i as f64).collect();
//! sample.extend((0..20).map(|i| 5.0 + 0.01 * i as f64));
//!
//! let (dip, p_value) = dip_test(&sample, false).unwrap();
//! assert!(dip > 0.2);
//! assert!(p_value < 0.05);
//! ```

pub mod centers;
pub mod dip;
pub mod matrix;
pub mod merge;
pub mod pvalue;
pub mod sampler;
pub mod table;
pub mod types;

pub use centers::{NearestCenters, nearest_points_to_centers, squared_euclidean_distance};
pub use dip::{DipResult, ModalInterval, ModalTriangle, dip, dip_with_diagnostics};
pub use matrix::build_dip_matrix;
pub use merge::{MergeOutcome, merge_by_dip_value, relabel};
pub use pvalue::dip_pvalue;
pub use sampler::nearest_subset;
pub use types::{ClusterState, DipMatrix, Points};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

pub const DEFAULT_MAX_CLUSTER_SIZE_DIFF_FACTOR: usize = 3;
pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 100;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum DipError {
    #[snafu(display("sample must be one-dimensional, got a {rows}x{cols} matrix"))]
    NotOneDimensional { rows: usize, cols: usize },

    #[snafu(display("sample value at index {index} is not finite"))]
    NonFiniteValue { index: usize },

    #[snafu(display("{what} has dimension {got}, expected {expected}"))]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[snafu(display("{what} has {got} rows, expected {expected}"))]
    RowCountMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[snafu(display("label {label} of point {index} is out of range for {n_clusters} clusters"))]
    LabelOutOfRange {
        index: usize,
        label: usize,
        n_clusters: usize,
    },

    #[snafu(display("cannot merge clusters {first} and {second} out of {n_clusters}"))]
    InvalidPair {
        first: usize,
        second: usize,
        n_clusters: usize,
    },

    #[snafu(display("clusters {first} and {second} are both empty"))]
    EmptyPair { first: usize, second: usize },

    #[snafu(display("at least one raw feature view is required"))]
    NoViews,
}

/// Tuning knobs shared by the matrix builder and the merger.
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DipConfig {
    /// Two clusters are rebalanced before testing when one is this many
    /// times larger than the other.
    pub max_cluster_size_diff_factor: usize,
    /// Lower bound on the number of points a rebalanced test should see.
    pub min_sample_size: usize,
}

impl Default for DipConfig {
    fn default() -> Self {
        Self {
            max_cluster_size_diff_factor: DEFAULT_MAX_CLUSTER_SIZE_DIFF_FACTOR,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
        }
    }
}

/// Dip statistic and p-value of a one-dimensional sample.
///
/// A degenerate sample (fewer than four points, or constant) has a dip of
/// `0.0` and is reported with a p-value of `1.0`: nothing distinguishes it
/// from a unimodal source.
pub fn dip_test(sample: &[f64], is_sorted: bool) -> Result<(f64, f64), DipError> {
    let dip_value = dip::dip(sample, is_sorted)?;
    if dip_value == 0.0 {
        return Ok((dip_value, 1.0));
    }
    Ok((dip_value, dip_pvalue(dip_value, sample.len())))
}

/// Flattens a row or column matrix into a sample.
pub fn sample_from_matrix(m: &DMatrix<f64>) -> Result<Vec<f64>, DipError> {
    ensure!(
        m.nrows() == 1 || m.ncols() == 1,
        NotOneDimensionalSnafu {
            rows: m.nrows(),
            cols: m.ncols()
        }
    );
    Ok(m.iter().copied().collect())
}
