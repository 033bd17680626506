use crate::{DipError, NonFiniteValueSnafu};
use std::borrow::Cow;

// References:
// - J. A. Hartigan and P. M. Hartigan, "The Dip Test of Unimodality",
//   The Annals of Statistics 13(1), 1985
// - P. M. Hartigan, "Algorithm AS 217: Computation of the Dip Statistic to
//   Test for Unimodality", Applied Statistics 34(3), 1985
// - diptest R package (M. Maechler), for the fixed-point exit condition
//
// The whole computation works with `2 * n * dip`, so that the empirical CDF
// steps are whole numbers. The division happens once, at the very end.

/// Samples smaller than this have a dip of exactly zero.
pub const MIN_POINTS: usize = 4;

/// Index range of the modal interval when the iteration stopped.
///
/// `low` and `high` index into the sorted sample. `gcm_len` and `lcm_len` are
/// the number of knots of the convex minorant and concave majorant over
/// `[low, high]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ModalInterval {
    pub low: usize,
    pub high: usize,
    pub gcm_len: usize,
    pub lcm_len: usize,
}

/// The hull segment that attains the dip, with its deepest point.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ModalTriangle {
    pub start: usize,
    pub deepest: usize,
    pub end: usize,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DipResult {
    pub dip: f64,
    pub modal_interval: Option<ModalInterval>,
    pub modal_triangle: Option<ModalTriangle>,
}

impl DipResult {
    fn degenerate() -> Self {
        Self {
            dip: 0.0,
            modal_interval: None,
            modal_triangle: None,
        }
    }
}

/// Hartigan's dip statistic of a one-dimensional sample.
///
/// Returns `0.0` for fewer than [`MIN_POINTS`] values or a constant sample.
/// When `is_sorted` is true the sample must already be in ascending order.
pub fn dip(sample: &[f64], is_sorted: bool) -> Result<f64, DipError> {
    dip_with_diagnostics(sample, is_sorted).map(|result| result.dip)
}

/// Same as [`dip`], but also reports where the modal interval ended up.
pub fn dip_with_diagnostics(sample: &[f64], is_sorted: bool) -> Result<DipResult, DipError> {
    if let Some(index) = sample.iter().position(|v| !v.is_finite()) {
        return NonFiniteValueSnafu { index }.fail();
    }

    let sorted: Cow<[f64]> = if is_sorted {
        debug_assert!(
            sample.windows(2).all(|w| w[0] <= w[1]),
            "sample flagged as sorted is not in ascending order",
        );
        Cow::Borrowed(sample)
    } else {
        let mut owned = sample.to_vec();
        owned.sort_by(f64::total_cmp);
        Cow::Owned(owned)
    };

    let n = sorted.len();
    if n < MIN_POINTS || sorted[0] == sorted[n - 1] {
        return Ok(DipResult::degenerate());
    }

    Ok(hartigan(&sorted))
}

fn hartigan(x: &[f64]) -> DipResult {
    let n = x.len();
    let mn = minorant_links(x);
    let mj = majorant_links(x);

    let mut low = 0;
    let mut high = n - 1;
    // Smallest possible dip, 1 / (2n), in scaled units
    let mut dip = 1.0;
    let mut triangle = None;

    let mut gcm = Vec::with_capacity(n);
    let mut lcm = Vec::with_capacity(n);

    loop {
        // Knots of the convex minorant, from high down to low
        gcm.clear();
        let mut g = high;
        gcm.push(g);
        while g > low {
            g = mn[g];
            gcm.push(g);
        }

        // Knots of the concave majorant, from low up to high
        lcm.clear();
        let mut l = low;
        lcm.push(l);
        while l < high {
            l = mj[l];
            lcm.push(l);
        }

        let (d, ig, ih) = widest_gap(x, &gcm, &lcm);
        if d < dip {
            break;
        }

        let (dip_l, triangle_l) = minorant_dip(x, &gcm, ig);
        let (dip_u, triangle_u) = majorant_dip(x, &lcm, ih);
        let (dip_new, triangle_new) = if dip_u > dip_l {
            (dip_u, triangle_u)
        } else {
            (dip_l, triangle_l)
        };
        if dip < dip_new {
            dip = dip_new;
            triangle = triangle_new;
        }

        // Without this exit the iteration can cycle forever
        if low == gcm[ig] && high == lcm[ih] {
            break;
        }
        low = gcm[ig];
        high = lcm[ih];
    }

    DipResult {
        dip: dip / (2 * n) as f64,
        modal_interval: Some(ModalInterval {
            low,
            high,
            gcm_len: gcm.len(),
            lcm_len: lcm.len(),
        }),
        modal_triangle: triangle,
    }
}

/// `mn[j]` is the previous knot of the convex minorant of `x[0..=j]`.
fn minorant_links(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut mn = vec![0usize; n];
    for j in 1..n {
        mn[j] = j - 1;
        loop {
            let a = mn[j];
            let b = mn[a];
            if a == 0 || (x[j] - x[a]) * ((a - b) as f64) < (x[a] - x[b]) * ((j - a) as f64) {
                break;
            }
            mn[j] = b;
        }
    }
    mn
}

/// `mj[k]` is the next knot of the concave majorant of `x[k..]`.
fn majorant_links(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut mj = vec![0usize; n];
    mj[n - 1] = n - 1;
    for k in (0..n - 1).rev() {
        mj[k] = k + 1;
        loop {
            let a = mj[k];
            let b = mj[a];
            if a == n - 1
                || (x[k] - x[a]) * (a as f64 - b as f64) < (x[a] - x[b]) * (k as f64 - a as f64)
            {
                break;
            }
            mj[k] = b;
        }
    }
    mj
}

/// Largest vertical distance between the two hulls over the current interval.
///
/// Returns the distance together with the gcm/lcm positions that bound the
/// new candidate modal interval.
fn widest_gap(x: &[f64], gcm: &[usize], lcm: &[usize]) -> (f64, usize, usize) {
    let mut ig = gcm.len() - 1;
    let mut ih = lcm.len() - 1;
    if gcm.len() <= 2 && lcm.len() <= 2 {
        return (1.0, ig, ih);
    }

    let mut d = 0.0;
    let mut ix = gcm.len() - 2;
    let mut iv = 1;
    loop {
        let gcm_ix = gcm[ix];
        let lcm_iv = lcm[iv];
        if gcm_ix > lcm_iv {
            // Next point comes from the majorant
            let gcm_next = gcm[ix + 1];
            let dx = (lcm_iv as f64 - gcm_next as f64 + 1.0)
                - (x[lcm_iv] - x[gcm_next]) * (gcm_ix - gcm_next) as f64
                    / (x[gcm_ix] - x[gcm_next]);
            iv += 1;
            if dx >= d {
                d = dx;
                ig = ix + 1;
                ih = iv - 1;
            }
        } else {
            // Next point comes from the minorant
            let lcm_prev = lcm[iv - 1];
            let dx = (x[gcm_ix] - x[lcm_prev]) * (lcm_iv - lcm_prev) as f64
                / (x[lcm_iv] - x[lcm_prev])
                - (gcm_ix as f64 - lcm_prev as f64 - 1.0);
            if dx >= d {
                d = dx;
                ig = ix;
                ih = iv;
            }
            ix = ix.saturating_sub(1);
        }
        iv = iv.min(lcm.len() - 1);
        if gcm[ix] == lcm[iv] {
            break;
        }
    }

    (d, ig, ih)
}

fn minorant_dip(x: &[f64], gcm: &[usize], from: usize) -> (f64, Option<ModalTriangle>) {
    let mut best = 0.0;
    let mut triangle = None;
    for j in from..gcm.len() - 1 {
        let (start, end) = (gcm[j + 1], gcm[j]);
        let mut max_t = 1.0;
        let mut deepest = None;
        if end - start > 1 && x[end] != x[start] {
            let c = (end - start) as f64 / (x[end] - x[start]);
            for (jj, &xj) in x.iter().enumerate().take(end + 1).skip(start) {
                let t = (jj - start + 1) as f64 - (xj - x[start]) * c;
                if max_t < t {
                    max_t = t;
                    deepest = Some(jj);
                }
            }
        }
        if best < max_t {
            best = max_t;
            triangle = deepest.map(|deepest| ModalTriangle {
                start,
                deepest,
                end,
            });
        }
    }
    (best, triangle)
}

fn majorant_dip(x: &[f64], lcm: &[usize], from: usize) -> (f64, Option<ModalTriangle>) {
    let mut best = 0.0;
    let mut triangle = None;
    for j in from..lcm.len() - 1 {
        let (start, end) = (lcm[j], lcm[j + 1]);
        let mut max_t = 1.0;
        let mut deepest = None;
        if end - start > 1 && x[end] != x[start] {
            let c = (end - start) as f64 / (x[end] - x[start]);
            for (jj, &xj) in x.iter().enumerate().take(end + 1).skip(start) {
                let t = (xj - x[start]) * c - (jj as f64 - start as f64 - 1.0);
                if max_t < t {
                    max_t = t;
                    deepest = Some(jj);
                }
            }
        }
        if best < max_t {
            best = max_t;
            triangle = deepest.map(|deepest| ModalTriangle {
                start,
                deepest,
                end,
            });
        }
    }
    (best, triangle)
}
