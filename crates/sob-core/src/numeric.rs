use crate::CoreError;

/// Floating point type used throughout the harness
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, index: usize) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { index })
    }
}

/// `n` evenly spaced samples over `[start, end]`, both ends included.
pub fn linspace(start: Real, end: Real, n: usize) -> Vec<Real> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as Real;
            (0..n).map(|i| start + step * i as Real).collect()
        }
    }
}

/// Piecewise-linear interpolation through `(xs, ys)`, clamped to the end values
/// outside the sampled range. `xs` must be ascending.
pub fn interp_linear(xs: &[Real], ys: &[Real], x: Real) -> Real {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len().min(ys.len());
    if n == 0 {
        return Real::NAN;
    }
    if n == 1 || x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let hi = xs[..n].partition_point(|&xi| xi <= x).min(n - 1);
    let lo = hi - 1;
    let span = xs[hi] - xs[lo];
    if span <= 0.0 {
        return ys[lo];
    }
    let w = (x - xs[lo]) / span;
    ys[lo] + w * (ys[hi] - ys[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, 3).unwrap_err();
        assert_eq!(err, CoreError::NonFinite { index: 3 });
    }

    #[test]
    fn linspace_includes_both_ends() {
        let v = linspace(2.0, 10.0, 5);
        assert_eq!(v, vec![2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(linspace(1.0, 5.0, 1), vec![1.0]);
        assert!(linspace(1.0, 5.0, 0).is_empty());
    }

    #[test]
    fn interp_clamps_and_blends() {
        let xs = [0.0, 10.0, 20.0];
        let ys = [1.0, 3.0, 2.0];
        assert_eq!(interp_linear(&xs, &ys, -5.0), 1.0);
        assert_eq!(interp_linear(&xs, &ys, 25.0), 2.0);
        assert!(nearly_equal(
            interp_linear(&xs, &ys, 5.0),
            2.0,
            Tolerances::default()
        ));
        assert!(nearly_equal(
            interp_linear(&xs, &ys, 15.0),
            2.5,
            Tolerances::default()
        ));
    }
}
