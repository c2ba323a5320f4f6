//! Deterministic float ordering.
//!
//! Nearest-hit selection must not depend on NaN placement or on the sign of
//! zero, so every distance comparison in the pipeline goes through
//! [`stable_total_cmp_f64`].

use core::cmp::Ordering;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// `-0.0` becomes `0.0`; all NaNs become a single canonical NaN.
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Total ordering for floats after canonicalization.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Index and key of the smallest key. Ties keep the earliest item.
pub fn argmin_by_key<T>(items: &[T], mut key: impl FnMut(&T) -> f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, item) in items.iter().enumerate() {
        let k = key(item);
        if k.is_nan() {
            continue;
        }
        best = match best {
            Some((bi, bk)) if stable_total_cmp_f64(k, bk).is_ge() => Some((bi, bk)),
            _ => Some((i, k)),
        };
    }
    best
}

#[cfg(test)]
mod tests {
    use super::{argmin_by_key, canonical_f64, stable_total_cmp_f64};
    use core::cmp::Ordering;

    #[test]
    fn canonicalizes_negative_zero() {
        assert_eq!(canonical_f64(-0.0).to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn stable_cmp_is_total() {
        assert_eq!(stable_total_cmp_f64(1.0, 2.0), Ordering::Less);
        assert_eq!(stable_total_cmp_f64(-0.0, 0.0), Ordering::Equal);
        assert_eq!(stable_total_cmp_f64(f64::NAN, f64::NAN), Ordering::Equal);
    }

    #[test]
    fn argmin_keeps_first_on_ties_and_skips_nan() {
        let d = [3.0, f64::NAN, 1.0, 1.0];
        assert_eq!(argmin_by_key(&d, |v| *v), Some((2, 1.0)));
        let empty: [f64; 0] = [];
        assert_eq!(argmin_by_key(&empty, |v| *v), None);
    }
}
