//! Type definitions of Float and Spectrum, otherwise constants and
//! functions which can be used almost everywhere else in the code.

// std
use std::ops::{Add, Mul, Sub};
// others
use num;
// ngp
use crate::core::spectrum::RGBSpectrum;

pub type Spectrum = RGBSpectrum;

pub type Float = f32;

pub const INV_PI: Float = 0.318_309_886_183_790_671_54;
pub const SQRT_3: Float = 1.732_050_807_568_877_2;

/// Transmittance below which a ray is considered opaque.
pub const T_THRESH: Float = 1e-4;

/// Reinterpret the bits of a *f32* as *u32*.
pub fn float_to_bits(f: f32) -> u32 {
    f.to_bits()
}

/// Is used to write sRGB-compatible 8-bit image files.
pub fn gamma_correct(value: Float) -> Float {
    if value <= 0.003_130_8 {
        12.92 * value
    } else {
        1.055 as Float * value.powf((1.0 / 2.4) as Float) - 0.055
    }
}

/// Clamp the given value *val* to lie between the values *low* and *high*.
pub fn clamp_t<T>(val: T, low: T, high: T) -> T
where
    T: PartialOrd,
{
    let r: T;
    if val < low {
        r = low;
    } else if val > high {
        r = high;
    } else {
        r = val;
    }
    r
}

/// Convert from angles expressed in degrees to radians.
pub fn radians(deg: Float) -> Float {
    (std::f32::consts::PI / 180.0) * deg
}

/// Binary exponent of *x* as returned by C's `frexp()`, i.e. the
/// integer `e` with `x = m * 2^e` and `0.5 <= |m| < 1`. Zero, denormal
/// and non-finite values report 0.
pub fn frexp_exponent(x: Float) -> i32 {
    let biased: i32 = ((float_to_bits(x) >> 23) & 0xff) as i32;
    if biased == 0 || biased == 0xff {
        0
    } else {
        biased - 126
    }
}

/// Helper function which emulates the behavior of std::upper_bound().
pub fn find_interval<P>(size: i32, pred: P) -> i32
where
    P: Fn(i32) -> bool,
{
    let mut first: i32 = 0;
    let mut len: i32 = size;
    while len > 0 {
        let half = len >> 1;
        let middle = first + half;
        // bisect range based on value of _pred_ at _middle_
        if pred(middle) {
            first = middle + 1;
            len -= half + 1;
        } else {
            len = half;
        }
    }
    clamp_t(first - 1, 0, size - 2)
}

/// Interpolate linearly between two provided values.
pub fn lerp<S, T>(t: S, a: T, b: T) -> T
where
    S: num::One,
    S: Sub<S, Output = S>,
    S: Copy,
    T: Add<T, Output = T>,
    T: Mul<S, Output = T>,
{
    let one: S = num::One::one();
    a * (one - t) + b * t
}

/// `n` evenly spaced values from *start* to *end* (both inclusive).
pub fn linspace(start: Float, end: Float, n: usize) -> Vec<Float> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step: Float = (end - start) / (n - 1) as Float;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        end
                    } else {
                        start + step * i as Float
                    }
                })
                .collect()
        }
    }
}

/// Find solution(s) of the quadratic equation at<sup>2</sup> + bt + c = 0.
pub fn quadratic(a: Float, b: Float, c: Float, t0: &mut Float, t1: &mut Float) -> bool {
    // find quadratic discriminant
    let discrim: f64 = (b as f64) * (b as f64) - 4.0 * (a as f64) * (c as f64);
    if discrim < 0.0 {
        false
    } else {
        let root_discrim: f64 = discrim.sqrt();
        // compute quadratic _t_ values
        let q = if b < 0.0 {
            -0.5 * (b as f64 - root_discrim)
        } else {
            -0.5 * (b as f64 + root_discrim)
        };
        *t0 = q as Float / a;
        *t1 = c / q as Float;
        if *t0 > *t1 {
            std::mem::swap(&mut (*t0), &mut (*t1))
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frexp_matches_c_semantics() {
        assert_eq!(frexp_exponent(0.0), 0);
        assert_eq!(frexp_exponent(0.5), 0);
        assert_eq!(frexp_exponent(0.75), 0);
        assert_eq!(frexp_exponent(1.0), 1);
        assert_eq!(frexp_exponent(1.99), 1);
        assert_eq!(frexp_exponent(2.0), 2);
        assert_eq!(frexp_exponent(0.25), -1);
        assert_eq!(frexp_exponent(Float::INFINITY), 0);
    }

    #[test]
    fn linspace_endpoints() {
        let v = linspace(0.0, 1.0, 5);
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn find_interval_brackets() {
        let cdf: [Float; 4] = [0.0, 0.25, 0.75, 1.0];
        let i = find_interval(4, |idx| cdf[idx as usize] <= 0.5);
        assert_eq!(i, 1);
        let i = find_interval(4, |idx| cdf[idx as usize] <= 1.0);
        assert_eq!(i, 2);
    }
}
