//! Two pass sampling without an occupancy grid: equally spaced samples
//! between `near` and `far`, followed by importance samples drawn from
//! the weights the first pass produced.

// ngp
use crate::core::field::DensityOutputs;
use crate::core::geometry::Point3f;
use crate::core::integrator::compute_weights;
use crate::core::ngp::{linspace, Float};
use crate::core::rng::Rng;
use crate::core::sampling::sample_pdf;

/// A sample along a ray with the field's answer for it. Kept together
/// so that sorting by `t` can never separate a position from its
/// density.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct RaySample {
    pub t: Float,
    pub p: Point3f,
    pub density: DensityOutputs,
}

/// *n* parametric distances spaced evenly from *near* to *far*. With
/// *perturb* each one moves by up to half a step in either direction.
pub fn uniform_ts(near: Float, far: Float, n: usize, perturb: bool, rng: &mut Rng) -> Vec<Float> {
    let sample_dist: Float = (far - near) / n as Float;
    let mut ts: Vec<Float> = linspace(0.0, 1.0, n)
        .iter()
        .map(|u| near + (far - near) * u)
        .collect();
    if perturb {
        for t in ts.iter_mut() {
            *t += (rng.uniform_float() - 0.5) * sample_dist;
        }
    }
    ts
}

/// Distances to the next sample, the last interval being *sample_dist*.
pub fn interval_deltas(ts: &[Float], sample_dist: Float) -> Vec<Float> {
    let mut deltas: Vec<Float> = ts.windows(2).map(|w| w[1] - w[0]).collect();
    if !ts.is_empty() {
        deltas.push(sample_dist);
    }
    deltas
}

/// Draw *n* new distances from the weight distribution of the coarse
/// samples at *ts*. The CDF is built on interval midpoints from the
/// interior weights only.
pub fn importance_ts(
    ts: &[Float],
    sigmas: &[Float],
    density_scale: Float,
    sample_dist: Float,
    n: usize,
    det: bool,
    rng: &mut Rng,
) -> Vec<Float> {
    if ts.len() < 3 || n == 0 {
        return Vec::new();
    }
    let deltas: Vec<Float> = interval_deltas(ts, sample_dist);
    let weights: Vec<Float> = compute_weights(&deltas, sigmas, density_scale);
    let mids: Vec<Float> = ts[..ts.len() - 1]
        .iter()
        .zip(deltas.iter())
        .map(|(t, d)| t + 0.5 * d)
        .collect();
    sample_pdf(&mids, &weights[1..weights.len() - 1], n, det, rng)
}

/// Both sample sets in one list ordered by `t`.
pub fn merge_samples(coarse: &[RaySample], fine: &[RaySample]) -> Vec<RaySample> {
    let mut all: Vec<RaySample> = Vec::with_capacity(coarse.len() + fine.len());
    all.extend_from_slice(coarse);
    all.extend_from_slice(fine);
    all.sort_by(|a, b| a.t.total_cmp(&b.t));
    all
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uniform_samples_span_near_to_far() {
        let mut rng = Rng::new();
        let ts = uniform_ts(2.0, 4.0, 5, false, &mut rng);
        assert_eq!(ts, vec![2.0, 2.5, 3.0, 3.5, 4.0]);
        let jittered = uniform_ts(2.0, 4.0, 5, true, &mut rng);
        for (a, b) in ts.iter().zip(jittered.iter()) {
            assert!((a - b).abs() <= 0.2 + 1e-6);
        }
    }

    #[test]
    fn deltas_end_with_sample_dist() {
        let d = interval_deltas(&[1.0, 1.5, 2.5], 0.25);
        assert_eq!(d, vec![0.5, 1.0, 0.25]);
        assert!(interval_deltas(&[], 0.25).is_empty());
    }

    #[test]
    fn importance_samples_follow_density() {
        let mut rng = Rng::new();
        let ts = uniform_ts(0.0, 1.0, 11, false, &mut rng);
        // a dense slab around t = 0.5
        let sigmas: Vec<Float> = ts
            .iter()
            .map(|t| if (*t - 0.5).abs() < 0.06 { 50.0 } else { 0.0 })
            .collect();
        let fine = importance_ts(&ts, &sigmas, 1.0, 1.0 / 11.0, 16, true, &mut rng);
        assert_eq!(fine.len(), 16);
        let near_slab = fine.iter().filter(|t| (**t - 0.5).abs() < 0.15).count();
        assert!(near_slab >= 12);
        assert!(fine.iter().all(|t| *t >= 0.0 && *t <= 1.0));
    }

    #[test]
    fn merge_keeps_attributes_together() {
        let s = |t: Float, sigma: Float| RaySample {
            t,
            p: Point3f::new(t, 0.0, 0.0),
            density: DensityOutputs { sigma },
        };
        let coarse = vec![s(0.0, 0.0), s(1.0, 10.0), s(2.0, 20.0)];
        let fine = vec![s(1.5, 15.0), s(0.5, 5.0)];
        let merged = merge_samples(&coarse, &fine);
        let ts: Vec<Float> = merged.iter().map(|m| m.t).collect();
        assert_eq!(ts, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        for m in merged.iter() {
            assert_eq!(m.p.x, m.t);
            assert_eq!(m.density.sigma, m.t * 10.0);
        }
    }
}
