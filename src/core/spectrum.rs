//! RGB color triples used for sample colors, background colors and
//! composited pixels.

// std
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Sub};
// ngp
use crate::core::ngp::{clamp_t, Float};

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct RGBSpectrum {
    pub c: [Float; 3],
}

impl RGBSpectrum {
    pub fn new(v: Float) -> Self {
        RGBSpectrum { c: [v, v, v] }
    }
    pub fn rgb(r: Float, g: Float, b: Float) -> RGBSpectrum {
        RGBSpectrum { c: [r, g, b] }
    }
    pub fn has_nans(&self) -> bool {
        self.c.iter().any(|v| v.is_nan())
    }
    pub fn clamp(&self, low: Float, high: Float) -> RGBSpectrum {
        RGBSpectrum {
            c: [
                clamp_t(self.c[0], low, high),
                clamp_t(self.c[1], low, high),
                clamp_t(self.c[2], low, high),
            ],
        }
    }
    /// Largest absolute per-channel difference.
    pub fn max_abs_diff(&self, other: &RGBSpectrum) -> Float {
        (0..3)
            .map(|i| (self.c[i] - other.c[i]).abs())
            .fold(0.0 as Float, Float::max)
    }
}

impl Add for RGBSpectrum {
    type Output = RGBSpectrum;
    fn add(self, rhs: RGBSpectrum) -> RGBSpectrum {
        RGBSpectrum {
            c: [
                self.c[0] + rhs.c[0],
                self.c[1] + rhs.c[1],
                self.c[2] + rhs.c[2],
            ],
        }
    }
}

impl AddAssign for RGBSpectrum {
    fn add_assign(&mut self, rhs: RGBSpectrum) {
        self.c[0] += rhs.c[0];
        self.c[1] += rhs.c[1];
        self.c[2] += rhs.c[2];
    }
}

impl Mul for RGBSpectrum {
    type Output = RGBSpectrum;
    fn mul(self, rhs: RGBSpectrum) -> RGBSpectrum {
        RGBSpectrum {
            c: [
                self.c[0] * rhs.c[0],
                self.c[1] * rhs.c[1],
                self.c[2] * rhs.c[2],
            ],
        }
    }
}

impl Mul<Float> for RGBSpectrum {
    type Output = RGBSpectrum;
    fn mul(self, rhs: Float) -> RGBSpectrum {
        RGBSpectrum {
            c: [self.c[0] * rhs, self.c[1] * rhs, self.c[2] * rhs],
        }
    }
}

impl Sub for RGBSpectrum {
    type Output = RGBSpectrum;
    fn sub(self, rhs: RGBSpectrum) -> RGBSpectrum {
        RGBSpectrum {
            c: [
                self.c[0] - rhs.c[0],
                self.c[1] - rhs.c[1],
                self.c[2] - rhs.c[2],
            ],
        }
    }
}

impl Index<usize> for RGBSpectrum {
    type Output = Float;
    fn index(&self, index: usize) -> &Float {
        &self.c[index]
    }
}

impl IndexMut<usize> for RGBSpectrum {
    fn index_mut(&mut self, index: usize) -> &mut Float {
        &mut self.c[index]
    }
}

impl From<Float> for RGBSpectrum {
    fn from(f: Float) -> RGBSpectrum {
        RGBSpectrum::new(f)
    }
}
