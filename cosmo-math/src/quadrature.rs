//! One-dimensional quadrature rules.

use crate::error::{CosmoError, Result};

/// Composite Simpson rule over `[a, b]` with `intervals` subintervals.
///
/// An odd interval count is rounded up to the next even number.
pub fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, intervals: usize) -> Result<f64> {
    if intervals == 0 {
        return Err(CosmoError::InvalidInput(
            "Simpson rule needs at least one interval".to_string(),
        ));
    }
    let n = intervals + intervals % 2;
    let h = (b - a) / n as f64;

    let mut sum = f(a) + f(b);
    for i in 1..n {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + h * i as f64);
    }
    Ok(sum * h / 3.0)
}

/// Adaptive Simpson quadrature with absolute tolerance `tolerance`.
///
/// Panels that still miss the tolerance at `max_depth` are accepted as they
/// are, so the call always terminates.
pub fn adaptive_simpson<F: Fn(f64) -> f64>(
    f: F,
    a: f64,
    b: f64,
    tolerance: f64,
    max_depth: usize,
) -> Result<f64> {
    if tolerance.is_nan() || tolerance <= 0.0 {
        return Err(CosmoError::InvalidInput(format!(
            "adaptive Simpson tolerance must be positive, got {tolerance}"
        )));
    }

    struct Panel {
        a: f64,
        b: f64,
        fa: f64,
        fm: f64,
        fb: f64,
        whole: f64,
        tolerance: f64,
        depth: usize,
    }

    let panel_estimate =
        |a: f64, b: f64, fa: f64, fm: f64, fb: f64| (b - a) / 6.0 * (fa + 4.0 * fm + fb);

    let (fa, fb) = (f(a), f(b));
    let fm = f(0.5 * (a + b));
    let mut stack = vec![Panel {
        a,
        b,
        fa,
        fm,
        fb,
        whole: panel_estimate(a, b, fa, fm, fb),
        tolerance,
        depth: 0,
    }];

    let mut total = 0.0;
    while let Some(panel) = stack.pop() {
        let m = 0.5 * (panel.a + panel.b);
        let lm = 0.5 * (panel.a + m);
        let rm = 0.5 * (m + panel.b);
        let (flm, frm) = (f(lm), f(rm));
        let left = panel_estimate(panel.a, m, panel.fa, flm, panel.fm);
        let right = panel_estimate(m, panel.b, panel.fm, frm, panel.fb);
        let delta = left + right - panel.whole;

        if panel.depth >= max_depth || delta.abs() <= 15.0 * panel.tolerance {
            // Richardson correction
            total += left + right + delta / 15.0;
        } else {
            let tolerance = 0.5 * panel.tolerance;
            let depth = panel.depth + 1;
            stack.push(Panel {
                a: panel.a,
                b: m,
                fa: panel.fa,
                fm: flm,
                fb: panel.fm,
                whole: left,
                tolerance,
                depth,
            });
            stack.push(Panel {
                a: m,
                b: panel.b,
                fa: panel.fm,
                fm: frm,
                fb: panel.fb,
                whole: right,
                tolerance,
                depth,
            });
        }
    }
    Ok(total)
}

/// Trapezoidal rule over tabulated samples.
pub fn trapezoid(xs: &[f64], ys: &[f64]) -> Result<f64> {
    if xs.len() != ys.len() {
        return Err(CosmoError::InvalidInput(format!(
            "trapezoid needs matching lengths, got {} and {}",
            xs.len(),
            ys.len()
        )));
    }
    Ok(xs
        .windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum())
}
