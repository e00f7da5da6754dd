//! Inverse transform sampling of piecewise linear distributions, used
//! to place importance samples where a coarse pass found density.

// ngp
use crate::core::ngp::{clamp_t, find_interval, linspace, Float};
use crate::core::rng::Rng;

/// Floor added to every weight so that all-zero weights still define
/// a (uniform) distribution.
pub const PDF_WEIGHT_EPSILON: Float = 1e-5;
/// CDF spans below this are treated as empty.
pub const PDF_DENOM_EPSILON: Float = 1e-5;

/// A piecewise linear CDF over `bins`, with `weights[i]` being the mass
/// between `bins[i]` and `bins[i + 1]`.
#[derive(Debug, Default, Clone)]
pub struct PiecewiseCdf {
    pub bins: Vec<Float>,
    pub cdf: Vec<Float>,
}

impl PiecewiseCdf {
    pub fn new(bins: &[Float], weights: &[Float]) -> Self {
        debug_assert_eq!(bins.len(), weights.len() + 1);
        let n: usize = weights.len();
        let w_sum: Float = weights.iter().map(|w| w + PDF_WEIGHT_EPSILON).sum();
        // compute integral of step function at $x_i$
        let mut cdf: Vec<Float> = Vec::with_capacity(n + 1);
        cdf.push(0.0 as Float);
        for i in 0..n {
            let previous: Float = cdf[i];
            cdf.push(previous + (weights[i] + PDF_WEIGHT_EPSILON) / w_sum);
        }
        PiecewiseCdf {
            bins: bins.to_vec(),
            cdf,
        }
    }
    /// Map `u` in `[0, 1)` to a position between the first and last bin.
    pub fn sample(&self, u: Float) -> Float {
        let size: usize = self.cdf.len();
        if size < 2 {
            return self.bins.first().copied().unwrap_or(0.0 as Float);
        }
        // find surrounding CDF segments and _offset_
        let below: usize = find_interval(size as i32, |index| self.cdf[index as usize] <= u) as usize;
        let above: usize = below + 1;
        let mut denom: Float = self.cdf[above] - self.cdf[below];
        if denom < PDF_DENOM_EPSILON {
            denom = 1.0 as Float;
        }
        let t: Float = clamp_t((u - self.cdf[below]) / denom, 0.0 as Float, 1.0 as Float);
        self.bins[below] + t * (self.bins[above] - self.bins[below])
    }
}

/// Draw *n_samples* positions from the distribution given by *bins*
/// and *weights*. Deterministic evaluation uses evenly spaced
/// quantiles, otherwise quantiles come from *rng*.
pub fn sample_pdf(
    bins: &[Float],
    weights: &[Float],
    n_samples: usize,
    det: bool,
    rng: &mut Rng,
) -> Vec<Float> {
    let distrib: PiecewiseCdf = PiecewiseCdf::new(bins, weights);
    if det {
        let u: Vec<Float> = linspace(
            0.5 / n_samples as Float,
            1.0 - 0.5 / n_samples as Float,
            n_samples,
        );
        u.iter().map(|u| distrib.sample(*u)).collect()
    } else {
        (0..n_samples)
            .map(|_| distrib.sample(rng.uniform_float()))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn in_range(samples: &[Float], bins: &[Float]) -> bool {
        let lo = bins.iter().cloned().fold(Float::INFINITY, Float::min);
        let hi = bins.iter().cloned().fold(Float::NEG_INFINITY, Float::max);
        samples.iter().all(|s| s.is_finite() && *s >= lo && *s <= hi)
    }

    #[test]
    fn samples_stay_inside_bins() {
        let bins: Vec<Float> = linspace(2.0, 4.0, 9);
        let weights: Vec<Float> = vec![0.0, 0.1, 3.0, 0.0, 0.0, 7.5, 0.2, 0.0];
        let mut rng = Rng::with_sequence(3);
        for det in [true, false] {
            let s = sample_pdf(&bins, &weights, 64, det, &mut rng);
            assert_eq!(s.len(), 64);
            assert!(in_range(&s, &bins));
        }
    }

    #[test]
    fn zero_weights_give_uniform_finite_samples() {
        let bins: Vec<Float> = linspace(0.0, 1.0, 5);
        let weights: Vec<Float> = vec![0.0; 4];
        let mut rng = Rng::new();
        let s = sample_pdf(&bins, &weights, 4, true, &mut rng);
        assert!(in_range(&s, &bins));
        let expected: [Float; 4] = [0.125, 0.375, 0.625, 0.875];
        for (a, b) in s.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn mass_concentrates_on_heavy_interval() {
        let bins: Vec<Float> = linspace(0.0, 4.0, 5);
        let weights: Vec<Float> = vec![0.0, 0.0, 1.0, 0.0];
        let mut rng = Rng::new();
        let s = sample_pdf(&bins, &weights, 32, true, &mut rng);
        let inside = s.iter().filter(|v| **v >= 2.0 && **v <= 3.0).count();
        assert!(inside >= 30);
    }

    #[test]
    fn degenerate_interval_falls_back_to_lower_bound() {
        let bins: Vec<Float> = vec![0.0, 1.0, 2.0];
        let cdf = PiecewiseCdf {
            bins: bins.clone(),
            cdf: vec![0.0, 0.5, 0.5 + 1e-7],
        };
        let v = cdf.sample(0.5);
        assert!((v - 1.0).abs() < 1e-5);
    }

    #[test]
    fn tiny_distributions() {
        let mut rng = Rng::new();
        assert_eq!(sample_pdf(&[1.5], &[], 3, true, &mut rng), vec![1.5; 3]);
        assert!(sample_pdf(&[0.0, 1.0], &[1.0], 0, true, &mut rng).is_empty());
    }
}
