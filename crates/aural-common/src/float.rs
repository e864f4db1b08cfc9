//! Float comparison and range helpers.

/// Tolerance used when deciding whether an edited value actually changed.
pub const FLOAT_EPSILON: f32 = 1.0e-6;

/// Returns true when `a` and `b` are equal within [`FLOAT_EPSILON`].
#[must_use]
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= FLOAT_EPSILON
}

/// Returns true when `a` and `b` differ by more than [`FLOAT_EPSILON`].
#[must_use]
pub fn not_equal(a: f32, b: f32) -> bool {
    !approx_eq(a, b)
}

/// Clamps `value` into `[min, max]`, mapping NaN to `min`.
#[must_use]
pub fn clamp_f32(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// Clamps a unit-interval value such as a volume.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    clamp_f32(value, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(0.5, 0.5));
        assert!(approx_eq(1.0, 1.0 + FLOAT_EPSILON / 2.0));
        assert!(not_equal(1.0, 1.001));
    }

    #[test]
    fn test_clamp_nan() {
        assert_eq!(clamp_f32(f32::NAN, 0.0, 360.0), 0.0);
    }

    proptest! {
        #[test]
        fn clamp_unit_stays_in_range(v in proptest::num::f32::ANY) {
            let c = clamp_unit(v);
            prop_assert!((0.0..=1.0).contains(&c));
        }
    }
}
