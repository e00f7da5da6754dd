//! Real spherical harmonics up to degree 3, the usual basis for
//! view-dependent color.
//!
//! The evaluation is linear in the coefficients: band `l` contributes
//! `2 l + 1` terms and is only summed when `degree >= l`.
//!
//! ```rust
//! use rs_ngp::core::geometry::Vector3f;
//! use rs_ngp::core::sh::{eval_sh, SH_C0};
//!
//! let d = Vector3f::new(0.0, 0.0, 1.0);
//! assert_eq!(eval_sh(0, &[1.0], &d).unwrap(), SH_C0);
//! ```

// ngp
use crate::core::error::{NgpError, Result};
use crate::core::geometry::Vector3f;
use crate::core::ngp::{Float, Spectrum};

pub const SH_MAX_DEGREE: u32 = 3;

pub const SH_C0: Float = 0.282_094_791_773_878_14;
pub const SH_C1: Float = 0.488_602_511_902_919_9;
pub const SH_C2: [Float; 5] = [
    1.092_548_430_592_079_2,
    -1.092_548_430_592_079_2,
    0.315_391_565_252_520_05,
    -1.092_548_430_592_079_2,
    0.546_274_215_296_039_6,
];
pub const SH_C3: [Float; 7] = [
    -0.590_043_589_926_643_5,
    2.890_611_442_640_554,
    -0.457_045_799_464_465_8,
    0.373_176_332_590_115_4,
    -0.457_045_799_464_465_8,
    1.445_305_721_320_277,
    -0.590_043_589_926_643_5,
];
/// Degree 4 normalization constants. Listed for completeness, the
/// evaluator stops at degree 3.
pub const SH_C4: [Float; 9] = [
    2.503_342_941_796_704_6,
    -1.770_130_769_779_930_4,
    0.946_174_695_757_560_1,
    -0.669_046_543_557_289_2,
    0.105_785_546_915_204_31,
    -0.669_046_543_557_289_2,
    0.473_087_347_878_780_04,
    -1.770_130_769_779_930_4,
    0.625_835_735_449_176_1,
];

/// Number of coefficients per channel for *degree*.
pub fn sh_num_coeffs(degree: u32) -> usize {
    ((degree + 1) * (degree + 1)) as usize
}

/// Reject unsupported degrees and mismatched coefficient counts.
pub fn check_sh(degree: u32, num_coeffs: usize) -> Result<()> {
    if degree > SH_MAX_DEGREE {
        return Err(NgpError::InvalidShDegree(degree));
    }
    let expected: usize = sh_num_coeffs(degree);
    if num_coeffs != expected {
        return Err(NgpError::ShCoefficientMismatch {
            found: num_coeffs,
            expected,
            degree,
        });
    }
    Ok(())
}

/// Evaluate the spherical harmonics expansion *coeffs* of *degree* in
/// direction *d* (expected to be unit length).
pub fn eval_sh(degree: u32, coeffs: &[Float], d: &Vector3f) -> Result<Float> {
    check_sh(degree, coeffs.len())?;
    Ok(eval_sh_unchecked(degree, coeffs, d))
}

fn eval_sh_unchecked(degree: u32, sh: &[Float], d: &Vector3f) -> Float {
    let mut result: Float = SH_C0 * sh[0];
    if degree > 0 {
        let (x, y, z) = (d.x, d.y, d.z);
        result = result - SH_C1 * y * sh[1] + SH_C1 * z * sh[2] - SH_C1 * x * sh[3];
        if degree > 1 {
            let (xx, yy, zz) = (x * x, y * y, z * z);
            let (xy, yz, xz) = (x * y, y * z, x * z);
            result = result
                + SH_C2[0] * xy * sh[4]
                + SH_C2[1] * yz * sh[5]
                + SH_C2[2] * (2.0 * zz - xx - yy) * sh[6]
                + SH_C2[3] * xz * sh[7]
                + SH_C2[4] * (xx - yy) * sh[8];
            if degree > 2 {
                result = result
                    + SH_C3[0] * y * (3.0 * xx - yy) * sh[9]
                    + SH_C3[1] * xy * z * sh[10]
                    + SH_C3[2] * y * (4.0 * zz - xx - yy) * sh[11]
                    + SH_C3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy) * sh[12]
                    + SH_C3[4] * x * (4.0 * zz - xx - yy) * sh[13]
                    + SH_C3[5] * z * (xx - yy) * sh[14]
                    + SH_C3[6] * x * (xx - 3.0 * yy) * sh[15];
            }
        }
    }
    result
}

/// Per-channel coefficients for an RGB signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ShColor {
    pub degree: u32,
    pub coeffs: [Vec<Float>; 3],
}

impl ShColor {
    pub fn new(degree: u32, r: Vec<Float>, g: Vec<Float>, b: Vec<Float>) -> Result<Self> {
        for c in [&r, &g, &b] {
            check_sh(degree, c.len())?;
        }
        Ok(ShColor {
            degree,
            coeffs: [r, g, b],
        })
    }
    /// Constant color, i.e. a degree 0 expansion.
    pub fn constant(color: &Spectrum) -> Self {
        ShColor {
            degree: 0,
            coeffs: [
                vec![color[0] / SH_C0],
                vec![color[1] / SH_C0],
                vec![color[2] / SH_C0],
            ],
        }
    }
    pub fn eval(&self, d: &Vector3f) -> Spectrum {
        Spectrum::rgb(
            eval_sh_unchecked(self.degree, &self.coeffs[0], d),
            eval_sh_unchecked(self.degree, &self.coeffs[1], d),
            eval_sh_unchecked(self.degree, &self.coeffs[2], d),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn degree_zero_is_c0() {
        let d = Vector3f::new(0.0, 0.0, 1.0);
        assert_eq!(eval_sh(0, &[1.0], &d).unwrap(), SH_C0);
        assert!((SH_C0 - 0.2821).abs() < 1e-4);
    }

    #[test]
    fn rejects_bad_degree_and_count() {
        let d = Vector3f::new(0.0, 0.0, 1.0);
        match eval_sh(4, &[0.0; 25], &d) {
            Err(NgpError::InvalidShDegree(4)) => {}
            other => panic!("unexpected {:?}", other),
        }
        match eval_sh(1, &[0.0; 3], &d) {
            Err(NgpError::ShCoefficientMismatch {
                found: 3,
                expected: 4,
                degree: 1,
            }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn degree_one_terms() {
        let d = Vector3f::new(0.0, 0.0, 1.0);
        // only the z term survives
        let v = eval_sh(1, &[0.0, 5.0, 1.0, 7.0], &d).unwrap();
        assert!((v - SH_C1).abs() < 1e-7);
        let d = Vector3f::new(1.0, 0.0, 0.0);
        let v = eval_sh(1, &[0.0, 0.0, 0.0, 1.0], &d).unwrap();
        assert!((v + SH_C1).abs() < 1e-7);
    }

    #[test]
    fn higher_bands_are_additive() {
        let d = Vector3f::new(0.48, -0.6, 0.64);
        let mut coeffs: Vec<Float> = (0..16).map(|i| 0.1 * i as Float - 0.7).collect();
        let full = eval_sh(3, &coeffs, &d).unwrap();
        let low = eval_sh(2, &coeffs[..9], &d).unwrap();
        for c in coeffs.iter_mut().take(9) {
            *c = 0.0;
        }
        let high_only = eval_sh(3, &coeffs, &d).unwrap();
        assert!((full - (low + high_only)).abs() < 1e-5);
    }

    #[test]
    fn degree_two_zonal_term() {
        let d = Vector3f::new(0.0, 0.0, 1.0);
        let mut coeffs = [0.0 as Float; 9];
        coeffs[6] = 1.0;
        let v = eval_sh(2, &coeffs, &d).unwrap();
        assert!((v - 2.0 * SH_C2[2]).abs() < 1e-6);
    }

    #[test]
    fn constant_color_round_trips() {
        let c = Spectrum::rgb(0.25, 0.5, 0.75);
        let sh = ShColor::constant(&c);
        let v = sh.eval(&Vector3f::new(0.0, 1.0, 0.0));
        assert!(v.max_abs_diff(&c) < 1e-6);
    }
}
