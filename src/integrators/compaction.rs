//! Inference marching with a shrinking worklist of alive rays.
//!
//! Every step marches each alive ray by a few samples, queries the
//! field for all of them at once, composites front to back and then
//! compacts the worklist: rays that became opaque or left the scene are
//! retired, the rest move (in order) to the other buffer.

// std
use std::mem;
// others
use rayon::prelude::*;
use smallvec::SmallVec;
// ngp
use crate::accelerators::occupancy::OccupancyGrid;
use crate::core::error::{NgpError, Result};
use crate::core::field::{DensityOutputs, RadianceField};
use crate::core::geometry::{Point3f, Ray, Vector3f};
use crate::core::integrator::{alpha, normalized_t, Composite};
use crate::core::ngp::{clamp_t, Float, Spectrum, T_THRESH};
use crate::core::rng::Rng;
use crate::samplers::march::{march_ray, MarchParams, MarchSample};

/// Upper bound for the samples one ray takes per step.
pub const MAX_STEPS_PER_ITERATION: usize = 8;

/// Worklist entry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AliveRay {
    /// position in the batch
    pub index: u32,
    /// where the march continues
    pub t: Float,
    pub near: Float,
    pub far: Float,
    pub transmittance: Float,
    pub acc: Composite,
}

/// Results of [`StreamCompactor::run`].
#[derive(Debug, Clone)]
pub struct CompactedRender {
    pub composites: Vec<Composite>,
    /// alive rays at the start of every step
    pub alive_counts: Vec<usize>,
    pub sample_count: usize,
    /// samples per ray summed over all steps
    pub steps: u32,
    /// rays still alive when `max_steps` was reached
    pub unfinished: usize,
}

/// Settings shared by all steps of one inference march.
pub struct StreamCompactor<'a> {
    pub grid: &'a OccupancyGrid,
    pub params: MarchParams,
    pub density_scale: Float,
    /// called before every step, `true` stops the march
    pub cancelled: &'a (dyn Fn() -> bool + Sync),
}

impl<'a> StreamCompactor<'a> {
    /// Samples per alive ray for the next step.
    pub fn steps_per_ray(n_rays: usize, n_alive: usize) -> usize {
        clamp_t(n_rays / n_alive.max(1), 1, MAX_STEPS_PER_ITERATION)
    }
    /// March *rays* (with their `near`/`far` interval, `None` for rays
    /// missing the box) until every ray is retired or `max_steps`
    /// samples were taken.
    pub fn run<F>(
        &self,
        field: &F,
        rays: &[Ray],
        near_far: &[Option<(Float, Float)>],
        rngs: &mut [Rng],
    ) -> Result<CompactedRender>
    where
        F: RadianceField + ?Sized,
    {
        let n_rays: usize = rays.len();
        let mut composites: Vec<Composite> = vec![Composite::default(); n_rays];
        let mut alive: Vec<AliveRay> = near_far
            .iter()
            .zip(rngs.iter_mut())
            .enumerate()
            .filter_map(|(i, (nf, rng))| {
                nf.map(|(near, far)| AliveRay {
                    index: i as u32,
                    t: self.params.start(near, rng),
                    near,
                    far,
                    transmittance: 1.0,
                    acc: Composite::default(),
                })
            })
            .collect();
        let mut next: Vec<AliveRay> = Vec::with_capacity(alive.len());
        let mut alive_counts: Vec<usize> = Vec::new();
        let mut sample_count: usize = 0;
        let mut step: u32 = 0;
        while !alive.is_empty() && step < self.params.max_steps {
            if (self.cancelled)() {
                return Err(NgpError::Cancelled { step });
            }
            let n_alive: usize = alive.len();
            alive_counts.push(n_alive);
            let n_step: usize = StreamCompactor::steps_per_ray(n_rays, n_alive);
            // march
            let marched: Vec<SmallVec<[MarchSample; MAX_STEPS_PER_ITERATION]>> = alive
                .par_iter_mut()
                .map(|r| {
                    let mut samples: SmallVec<[MarchSample; MAX_STEPS_PER_ITERATION]> =
                        SmallVec::new();
                    march_ray(
                        self.grid,
                        &rays[r.index as usize],
                        &mut r.t,
                        r.far,
                        n_step,
                        &self.params,
                        |s| samples.push(s),
                    );
                    samples
                })
                .collect();
            // query the field for all samples of this step
            let positions: Vec<Point3f> = marched.iter().flatten().map(|s| s.p).collect();
            let directions: Vec<Vector3f> = marched.iter().flatten().map(|s| s.d).collect();
            let densities: Vec<DensityOutputs> = field.density_batch(&positions);
            let colors: Vec<Spectrum> = field.color_batch(&positions, &directions, None, &densities);
            sample_count += positions.len();
            // composite
            let mut offset: usize = 0;
            let mut finished: Vec<bool> = Vec::with_capacity(n_alive);
            for (r, samples) in alive.iter_mut().zip(marched.iter()) {
                for (k, s) in samples.iter().enumerate() {
                    let a: Float = alpha(s.dt, self.density_scale * densities[offset + k].sigma);
                    let weight: Float = a * r.transmittance;
                    r.acc
                        .add(weight, normalized_t(s.t, r.near, r.far), &colors[offset + k]);
                    r.transmittance *= 1.0 as Float - a;
                    if r.transmittance < T_THRESH {
                        break;
                    }
                }
                offset += samples.len();
                finished.push(
                    r.transmittance < T_THRESH || samples.len() < n_step || r.t >= r.far,
                );
            }
            // compact
            next.clear();
            for (r, done) in alive.drain(..).zip(finished.into_iter()) {
                if done {
                    composites[r.index as usize] = r.acc;
                } else {
                    next.push(r);
                }
            }
            mem::swap(&mut alive, &mut next);
            debug!(
                "step {}: {} of {} rays alive, {} samples per ray",
                step,
                alive.len(),
                n_rays,
                n_step
            );
            step += n_step as u32;
        }
        // rays stopped by max_steps
        for r in alive.iter() {
            composites[r.index as usize] = r.acc;
        }
        if !alive.is_empty() {
            debug!("{} rays stopped after {} steps", alive.len(), step);
        }
        Ok(CompactedRender {
            composites,
            alive_counts,
            sample_count,
            steps: step,
            unfinished: alive.len(),
        })
    }
}
