use crate::table::{CV, N, SIG, interp};

/// Approximate p-value of a dip statistic observed on `n_points` values.
///
/// The critical values for `n_points` are interpolated linearly between the
/// two bracketing rows of the table on the `sqrt(n)` scale, then the observed
/// `sqrt(n) * dip` is located on that curve. Sizes beyond the last breakpoint
/// extrapolate from the last two rows.
///
/// A dip of exactly `0.0` comes from a degenerate sample (too small or
/// constant) and carries no evidence of multimodality: callers report `1.0`
/// for it instead of looking it up, see [`crate::dip_test`]. Sizes below the
/// first breakpoint have no bracket and also give `1.0`.
pub fn dip_pvalue(dip_value: f64, n_points: usize) -> f64 {
    let n = n_points as f64;
    if n < N[0] {
        return 1.0;
    }

    let last = N.len() - 1;
    let pos = N.partition_point(|&v| v < n);
    let i1 = pos.min(last);
    let mut i0 = pos.saturating_sub(1);
    if i0 == i1 && i0 == last {
        i0 = i1 - 1;
    }

    // i0 == i1 only when n sits on the first breakpoint
    let fraction = if i0 == i1 {
        0.0
    } else {
        (n - N[i0]) / (N[i1] - N[i0])
    };

    let (s0, s1) = (N[i0].sqrt(), N[i1].sqrt());
    let mut curve = [0.0f64; SIG.len()];
    for (c, (&cv0, &cv1)) in curve.iter_mut().zip(CV[i0].iter().zip(CV[i1].iter())) {
        let y0 = s0 * cv0;
        let y1 = s1 * cv1;
        *c = y0 + fraction * (y1 - y0);
    }

    let scaled_dip = n.sqrt() * dip_value;
    1.0 - interp(scaled_dip, &curve, &SIG)
}
