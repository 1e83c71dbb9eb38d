//! Exact timestamp arithmetic.
//!
//! Frame indices and container timestamps live in different rational time
//! bases. [`rescale`] converts between them with 128-bit intermediates so that
//! multi-hour streams at 1/90000 (or finer) resolution never overflow, and
//! [`almost_equal`] is the unit-in-last-place comparison used to reject
//! variable frame rate streams.

use ffmpeg_next::Rational;

/// Rescale `value` from the `from` time base into the `to` time base.
///
/// Computes `value * from.num * to.den / (from.den * to.num)`, rounding to the
/// nearest integer with halfway cases away from zero.
///
/// Both time bases must have non-zero components; a zero denominator is a
/// programming error and panics.
///
/// # Example
///
/// ```
/// use ffmpeg_next::Rational;
/// use framewindow::rational::rescale;
///
/// let frame_base = Rational::new(1, 30);
/// let stream_base = Rational::new(1, 90_000);
/// assert_eq!(rescale(100, frame_base, stream_base), 300_000);
/// assert_eq!(rescale(300_000, stream_base, frame_base), 100);
/// ```
pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
    let numerator = value as i128 * from.numerator() as i128 * to.denominator() as i128;
    let denominator = from.denominator() as i128 * to.numerator() as i128;
    assert!(denominator != 0, "rescale with a zero time base component");

    let (numerator, denominator) = if denominator < 0 {
        (-numerator, -denominator)
    } else {
        (numerator, denominator)
    };

    let half = denominator / 2;
    let rounded = if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    };

    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Convert a rational to a float.
pub fn to_f64(value: Rational) -> f64 {
    value.numerator() as f64 / value.denominator() as f64
}

/// Compare two floats within `ulp` units in the last place.
///
/// Machine epsilon is scaled to the magnitude of the operands; differences in
/// the subnormal range always compare equal.
///
/// # Example
///
/// ```
/// use framewindow::rational::almost_equal;
///
/// assert!(almost_equal(1.0 / 30.0, 3000.0 / 90_000.0, 2));
/// assert!(!almost_equal(1.0 / 29.97, 1.0 / 30.0, 2));
/// ```
pub fn almost_equal(x: f64, y: f64, ulp: u64) -> bool {
    if x == y {
        return true;
    }
    let difference = (x - y).abs();
    difference <= f64::EPSILON * (x + y).abs() * ulp as f64 || difference < f64::MIN_POSITIVE
}

/// Time base of one frame: the inverse of the average frame rate.
pub fn frame_base(average_frame_rate: Rational) -> Rational {
    Rational::new(
        average_frame_rate.denominator(),
        average_frame_rate.numerator(),
    )
}
