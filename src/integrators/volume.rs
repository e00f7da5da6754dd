//! The volume renderer: owns the occupancy grid and its bookkeeping and
//! turns batches of rays into color, depth and opacity.
//!
//! Three paths produce the per-ray samples:
//!
//! - without acceleration every ray gets `num_uniform_steps` equally
//!   spaced samples plus `num_importance_steps` samples drawn from the
//!   resulting weight distribution;
//! - accelerated training marches every ray through the occupied
//!   voxels in one go (optionally under a sample budget);
//! - accelerated inference marches a few samples per ray and step and
//!   retires rays as soon as they are opaque or leave the scene.
//!
//! All paths share the compositing and background handling.

// std
use std::io::{Read, Write};
// others
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;
// ngp
use crate::accelerators::occupancy::OccupancyGrid;
use crate::core::api::{RenderMode, RenderOptions, RendererOptions};
use crate::core::camera::{CameraPose, Intrinsics};
use crate::core::error::{NgpError, Result};
use crate::core::field::{Background, DensityOutputs, RadianceField};
use crate::core::geometry::{Bounds3f, Point3f, Ray, Vector3f};
use crate::core::integrator::{
    composite, compute_weights, distortion_loss, BackgroundSource, Composite,
    COLOR_WEIGHT_THRESHOLD,
};
use crate::core::ngp::{Float, Spectrum};
use crate::core::rng::Rng;
use crate::integrators::compaction::StreamCompactor;
use crate::integrators::render_staged;
use crate::samplers::hierarchical::{
    importance_ts, interval_deltas, merge_samples, uniform_ts, RaySample,
};
use crate::samplers::march::{
    aligned_capacity, march_rays_train, MarchParams, MarchSample, MarchedSamples, RaySpan,
};

/// Entries of the step counter ring.
pub const STEP_COUNTER_SIZE: usize = 16;
/// Updates performed by [`VolumeRenderer::initialize_states`] after the
/// first one.
pub const INITIAL_STATE_UPDATES: usize = 30;

const STATE_MAGIC: &[u8; 4] = b"NGPG";
const STATE_VERSION: u32 = 1;

/// Samples and active rays of the last [`STEP_COUNTER_SIZE`] training
/// marches.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct StepCounter {
    /// `[samples, rays]` per march
    pub entries: [[u32; 2]; STEP_COUNTER_SIZE],
    pub local_step: u32,
}

impl StepCounter {
    pub fn record(&mut self, samples: usize, rays: usize) {
        let slot: usize = self.local_step as usize % STEP_COUNTER_SIZE;
        self.entries[slot] = [
            samples.min(u32::MAX as usize) as u32,
            rays.min(u32::MAX as usize) as u32,
        ];
        self.local_step += 1;
    }
    /// Mean sample count of the recorded marches, `None` if there are
    /// none.
    pub fn mean_samples(&self) -> Option<usize> {
        let n: usize = (self.local_step as usize).min(STEP_COUNTER_SIZE);
        if n == 0 {
            None
        } else {
            let total: u64 = self.entries[..n].iter().map(|e| e[0] as u64).sum();
            Some((total / n as u64) as usize)
        }
    }
    pub fn reset(&mut self) {
        *self = StepCounter::default();
    }
}

/// Result of [`VolumeRenderer::render`], one entry per ray.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RenderOutput {
    pub image: Vec<Spectrum>,
    /// weighted mean of `(t - near) / (far - near)`
    pub depth: Vec<Float>,
    /// opacity, `1 - T` of the last sample
    pub weight_sum: Vec<Float>,
    /// `weight_sum > 0.95`
    pub mask: Vec<bool>,
    /// mean distortion loss, if requested and available
    pub distortion_loss: Option<Float>,
    /// generation of the occupancy grid the rays were marched against
    pub grid_generation: Option<u64>,
    /// field samples evaluated
    pub sample_count: usize,
}

impl RenderOutput {
    fn with_capacity(n: usize) -> Self {
        RenderOutput {
            image: Vec::with_capacity(n),
            depth: Vec::with_capacity(n),
            weight_sum: Vec::with_capacity(n),
            mask: Vec::with_capacity(n),
            ..Default::default()
        }
    }
    pub fn len(&self) -> usize {
        self.image.len()
    }
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

/// Per-ray composites of one batch (or chunk) before the background is
/// applied.
struct TracedRays {
    composites: Vec<Composite>,
    distortion_sum: Float,
    sample_count: usize,
    /// training marches: samples wanted and rays that wanted some
    requested: usize,
    active_rays: usize,
}

pub struct VolumeRenderer {
    pub options: RendererOptions,
    pub grid: Option<OccupancyGrid>,
    pub step_counter: StepCounter,
    /// sample budget of capacity limited training marches
    pub mean_count: usize,
    rng: Rng,
}

impl VolumeRenderer {
    pub fn new(options: RendererOptions) -> Result<Self> {
        options.validate()?;
        let grid: Option<OccupancyGrid> = if options.accelerated {
            Some(OccupancyGrid::new(
                options.bound,
                options.grid_size,
                options.density_thresh,
                options.seed,
            )?)
        } else {
            None
        };
        Ok(VolumeRenderer {
            options,
            grid,
            step_counter: StepCounter::default(),
            mean_count: 0,
            rng: Rng::with_sequence(options.seed),
        })
    }
    fn aabb(&self, mode: RenderMode) -> Bounds3f {
        match mode {
            RenderMode::Training => self.options.aabb_train,
            RenderMode::Inference => self.options.aabb_infer,
        }
    }
    fn next_call_seed(&mut self) -> u64 {
        let hi: u64 = self.rng.uniform_uint32() as u64;
        let lo: u64 = self.rng.uniform_uint32() as u64;
        (hi << 32) | lo
    }
    /// Render a batch of rays. Large batches are split into chunks of
    /// `max_batch_size` rays when `options.staged` is set; the result
    /// does not depend on the chunking.
    pub fn render<F>(
        &mut self,
        field: &F,
        background: Option<&dyn Background>,
        rays_o: &[Point3f],
        rays_d: &[Vector3f],
        options: &RenderOptions,
    ) -> Result<RenderOutput>
    where
        F: RadianceField + ?Sized,
    {
        options.validate()?;
        if rays_o.len() != rays_d.len() {
            return Err(NgpError::RayBatchMismatch {
                origins: rays_o.len(),
                directions: rays_d.len(),
            });
        }
        let n_rays: usize = rays_o.len();
        let call_seed: u64 = self.next_call_seed();
        let staged: bool = options.staged && n_rays > options.max_batch_size;
        let capacity: Option<usize> =
            if options.force_all_rays || options.staged || self.mean_count == 0 {
                None
            } else {
                Some(aligned_capacity(self.mean_count))
            };
        let (mut output, summary) = if staged {
            let this: &VolumeRenderer = self;
            let chunks = render_staged(
                n_rays,
                options.max_batch_size,
                self.options.num_threads,
                |range| {
                    let first: usize = range.start;
                    this.render_rays(
                        field,
                        background,
                        &rays_o[range.clone()],
                        &rays_d[range],
                        first,
                        call_seed,
                        options,
                        capacity,
                    )
                },
            )?;
            let mut output: RenderOutput = RenderOutput::with_capacity(n_rays);
            let mut summary: TracedRaysSummary = TracedRaysSummary::default();
            for (_, (chunk, traced)) in chunks.into_iter() {
                output.image.extend(chunk.image);
                output.depth.extend(chunk.depth);
                output.weight_sum.extend(chunk.weight_sum);
                output.mask.extend(chunk.mask);
                output.sample_count += chunk.sample_count;
                summary.distortion_sum += traced.distortion_sum;
                summary.requested += traced.requested;
                summary.active_rays += traced.active_rays;
            }
            (output, summary)
        } else {
            self.render_rays(
                field, background, rays_o, rays_d, 0, call_seed, options, capacity,
            )?
        };
        if options.cal_dist_loss && self.grid.is_none() && n_rays > 0 {
            output.distortion_loss = Some(summary.distortion_sum / n_rays as Float);
        }
        output.grid_generation = self.grid.as_ref().map(|g| g.generation());
        if self.grid.is_some() && options.mode == RenderMode::Training {
            self.step_counter.record(summary.requested, summary.active_rays);
        }
        debug!(
            "rendered {} rays, {} samples (staged: {})",
            n_rays, output.sample_count, staged
        );
        Ok(output)
    }
    /// Render rays `first..first + rays_o.len()` of a batch.
    #[allow(clippy::too_many_arguments)]
    fn render_rays<F>(
        &self,
        field: &F,
        background: Option<&dyn Background>,
        rays_o: &[Point3f],
        rays_d: &[Vector3f],
        first: usize,
        call_seed: u64,
        options: &RenderOptions,
        capacity: Option<usize>,
    ) -> Result<(RenderOutput, TracedRaysSummary)>
    where
        F: RadianceField + ?Sized,
    {
        if options.is_cancelled() {
            return Err(NgpError::Cancelled { step: 0 });
        }
        let rays: Vec<Ray> = unit_rays(rays_o, rays_d);
        let aabb: Bounds3f = self.aabb(options.mode);
        let near_far: Vec<Option<(Float, Float)>> = rays
            .par_iter()
            .map(|r| aabb.near_far(r, self.options.min_near))
            .collect();
        let mut rngs: Vec<Rng> = (0..rays.len())
            .map(|i| Rng::with_sequence(Rng::stream(call_seed, (first + i) as u64)))
            .collect();
        let traced: TracedRays = match (&self.grid, options.mode) {
            (None, _) => self.run_hierarchical(field, &rays, &near_far, &mut rngs, options),
            (Some(grid), RenderMode::Training) => {
                self.run_accelerated_training(field, grid, &rays, &near_far, &mut rngs, options, capacity)
            }
            (Some(grid), RenderMode::Inference) => {
                self.run_accelerated_inference(field, grid, &rays, &near_far, &mut rngs, options)?
            }
        };
        let bg: BackgroundSource =
            BackgroundSource::select(background, self.options.bg_radius, options.bg_color);
        let mut output: RenderOutput = RenderOutput::with_capacity(rays.len());
        let mut nans: usize = 0;
        for (c, ray) in traced.composites.iter().zip(rays.iter()) {
            let mut color: Spectrum = c.finish(&bg.color(&ray.o, &ray.d));
            if color.has_nans() {
                nans += 1;
                color = Spectrum::new(0.0);
            }
            output.image.push(color);
            output.depth.push(c.depth);
            output.weight_sum.push(c.weight_sum);
            output.mask.push(c.covered());
        }
        if nans > 0 {
            warn!(
                "not-a-number color for {} of {} rays, setting to black",
                nans,
                rays.len()
            );
        }
        output.sample_count = traced.sample_count;
        Ok((
            output,
            TracedRaysSummary {
                distortion_sum: traced.distortion_sum,
                requested: traced.requested,
                active_rays: traced.active_rays,
            },
        ))
    }
    /// Uniform samples followed by importance samples, without the
    /// occupancy grid.
    fn run_hierarchical<F>(
        &self,
        field: &F,
        rays: &[Ray],
        near_far: &[Option<(Float, Float)>],
        rngs: &mut [Rng],
        options: &RenderOptions,
    ) -> TracedRays
    where
        F: RadianceField + ?Sized,
    {
        let density_scale: Float = self.options.density_scale;
        let aabb: Bounds3f = self.aabb(options.mode);
        let n_uniform: usize = options.num_uniform_steps;
        let n_importance: usize = if n_uniform >= 3 {
            options.num_importance_steps
        } else {
            0
        };
        let det: bool = options.mode == RenderMode::Inference;
        let sample_dist = |nf: &Option<(Float, Float)>| match nf {
            Some((near, far)) => (far - near) / n_uniform.max(1) as Float,
            None => 0.0,
        };
        // uniform pass
        let coarse_ts: Vec<Vec<Float>> = near_far
            .par_iter()
            .zip(rngs.par_iter_mut())
            .map(|(nf, rng)| match nf {
                Some((near, far)) => uniform_ts(*near, *far, n_uniform, options.perturb, rng),
                None => Vec::new(),
            })
            .collect();
        let coarse: Vec<Vec<RaySample>> = query_samples(field, rays, &coarse_ts, &aabb);
        let mut sample_count: usize = coarse.iter().map(|s| s.len()).sum();
        // importance pass
        let samples: Vec<Vec<RaySample>> = if n_importance > 0 {
            let fine_ts: Vec<Vec<Float>> = coarse
                .par_iter()
                .zip(near_far.par_iter())
                .zip(rngs.par_iter_mut())
                .map(|((samples, nf), rng)| {
                    if samples.is_empty() {
                        return Vec::new();
                    }
                    let ts: Vec<Float> = samples.iter().map(|s| s.t).collect();
                    let sigmas: Vec<Float> = samples.iter().map(|s| s.density.sigma).collect();
                    importance_ts(
                        &ts,
                        &sigmas,
                        density_scale,
                        sample_dist(nf),
                        n_importance,
                        det,
                        rng,
                    )
                })
                .collect();
            let fine: Vec<Vec<RaySample>> = query_samples(field, rays, &fine_ts, &aabb);
            sample_count += fine.iter().map(|s| s.len()).sum::<usize>();
            coarse
                .par_iter()
                .zip(fine.par_iter())
                .map(|(c, f)| merge_samples(c, f))
                .collect()
        } else {
            coarse
        };
        // weights and colors
        let deltas: Vec<Vec<Float>> = samples
            .par_iter()
            .zip(near_far.par_iter())
            .map(|(s, nf)| {
                let ts: Vec<Float> = s.iter().map(|s| s.t).collect();
                interval_deltas(&ts, sample_dist(nf))
            })
            .collect();
        let weights: Vec<Vec<Float>> = samples
            .par_iter()
            .zip(deltas.par_iter())
            .map(|(s, d)| {
                let sigmas: Vec<Float> = s.iter().map(|s| s.density.sigma).collect();
                compute_weights(d, &sigmas, density_scale)
            })
            .collect();
        let positions: Vec<Point3f> = samples.iter().flatten().map(|s| s.p).collect();
        let directions: Vec<Vector3f> = samples
            .iter()
            .zip(rays.iter())
            .flat_map(|(s, r)| std::iter::repeat(r.d).take(s.len()))
            .collect();
        let densities: Vec<DensityOutputs> = samples.iter().flatten().map(|s| s.density).collect();
        let mask: Vec<bool> = weights
            .iter()
            .flatten()
            .map(|w| *w > COLOR_WEIGHT_THRESHOLD)
            .collect();
        let colors: Vec<Spectrum> =
            field.color_batch(&positions, &directions, Some(mask.as_slice()), &densities);
        // composite
        let mut offsets: Vec<usize> = Vec::with_capacity(samples.len());
        let mut offset: usize = 0;
        for s in samples.iter() {
            offsets.push(offset);
            offset += s.len();
        }
        let composites: Vec<Composite> = (0..samples.len())
            .into_par_iter()
            .map(|i| match near_far[i] {
                Some((near, far)) => {
                    let ts: Vec<Float> = samples[i].iter().map(|s| s.t).collect();
                    let n: usize = ts.len();
                    composite(
                        &weights[i],
                        &ts,
                        &colors[offsets[i]..offsets[i] + n],
                        near,
                        far,
                    )
                }
                None => Composite::default(),
            })
            .collect();
        let distortion_sum: Float = if options.cal_dist_loss {
            (0..samples.len())
                .into_par_iter()
                .map(|i| match near_far[i] {
                    Some((near, far)) => {
                        let range: Float = far - near;
                        let mids: Vec<Float> = samples[i]
                            .iter()
                            .zip(deltas[i].iter())
                            .map(|(s, d)| (s.t + 0.5 * d - near) / range)
                            .collect();
                        let intervals: Vec<Float> = deltas[i].iter().map(|d| d / range).collect();
                        distortion_loss(&weights[i], &mids, &intervals)
                    }
                    None => 0.0,
                })
                .sum()
        } else {
            0.0
        };
        TracedRays {
            composites,
            distortion_sum,
            sample_count,
            requested: 0,
            active_rays: 0,
        }
    }
    #[allow(clippy::too_many_arguments)]
    fn run_accelerated_training<F>(
        &self,
        field: &F,
        grid: &OccupancyGrid,
        rays: &[Ray],
        near_far: &[Option<(Float, Float)>],
        rngs: &mut [Rng],
        options: &RenderOptions,
        capacity: Option<usize>,
    ) -> TracedRays
    where
        F: RadianceField + ?Sized,
    {
        let params: MarchParams =
            MarchParams::new(grid, options.dt_gamma, options.max_steps, options.perturb);
        let marched: MarchedSamples =
            march_rays_train(grid, rays, near_far, rngs, &params, capacity);
        let positions: Vec<Point3f> = marched.samples.iter().map(|s| s.p).collect();
        let directions: Vec<Vector3f> = marched.samples.iter().map(|s| s.d).collect();
        let densities: Vec<DensityOutputs> = field.density_batch(&positions);
        let weights: Vec<Vec<Float>> = marched
            .rays
            .par_iter()
            .map(|span| {
                let range = span.offset as usize..(span.offset + span.count) as usize;
                let deltas: Vec<Float> = marched.samples[range.clone()].iter().map(|s| s.dt).collect();
                let sigmas: Vec<Float> = densities[range].iter().map(|d| d.sigma).collect();
                compute_weights(&deltas, &sigmas, self.options.density_scale)
            })
            .collect();
        let mask: Vec<bool> = weights
            .iter()
            .flatten()
            .map(|w| *w > COLOR_WEIGHT_THRESHOLD)
            .collect();
        let colors: Vec<Spectrum> =
            field.color_batch(&positions, &directions, Some(mask.as_slice()), &densities);
        let composites: Vec<Composite> = marched
            .rays
            .par_iter()
            .zip(weights.par_iter())
            .map(|(span, w)| match near_far[span.ray as usize] {
                Some((near, far)) if span.count > 0 => {
                    let samples: &[MarchSample] = marched.ray_samples(span);
                    let ts: Vec<Float> = samples.iter().map(|s| s.t).collect();
                    let range = span.offset as usize..(span.offset + span.count) as usize;
                    composite(w, &ts, &colors[range], near, far)
                }
                _ => Composite::default(),
            })
            .collect();
        TracedRays {
            composites,
            distortion_sum: 0.0,
            sample_count: marched.samples.len(),
            requested: marched.requested,
            active_rays: marched.active_rays,
        }
    }
    fn run_accelerated_inference<F>(
        &self,
        field: &F,
        grid: &OccupancyGrid,
        rays: &[Ray],
        near_far: &[Option<(Float, Float)>],
        rngs: &mut [Rng],
        options: &RenderOptions,
    ) -> Result<TracedRays>
    where
        F: RadianceField + ?Sized,
    {
        let cancelled = || options.is_cancelled();
        let compactor = StreamCompactor {
            grid,
            params: MarchParams::new(grid, options.dt_gamma, options.max_steps, options.perturb),
            density_scale: self.options.density_scale,
            cancelled: &cancelled,
        };
        let compacted = compactor.run(field, rays, near_far, rngs)?;
        Ok(TracedRays {
            composites: compacted.composites,
            distortion_sum: 0.0,
            sample_count: compacted.sample_count,
            requested: 0,
            active_rays: 0,
        })
    }
    /// March a batch of training rays and return the packed samples
    /// without evaluating the field. Without an occupancy grid every
    /// ray gets its uniform samples instead.
    pub fn sample(
        &mut self,
        rays_o: &[Point3f],
        rays_d: &[Vector3f],
        options: &RenderOptions,
    ) -> Result<MarchedSamples> {
        options.validate()?;
        if rays_o.len() != rays_d.len() {
            return Err(NgpError::RayBatchMismatch {
                origins: rays_o.len(),
                directions: rays_d.len(),
            });
        }
        let call_seed: u64 = self.next_call_seed();
        let rays: Vec<Ray> = unit_rays(rays_o, rays_d);
        let aabb: Bounds3f = self.options.aabb_train;
        let near_far: Vec<Option<(Float, Float)>> = rays
            .par_iter()
            .map(|r| aabb.near_far(r, self.options.min_near))
            .collect();
        let mut rngs: Vec<Rng> = (0..rays.len())
            .map(|i| Rng::with_sequence(Rng::stream(call_seed, i as u64)))
            .collect();
        match &self.grid {
            Some(grid) => {
                let params: MarchParams =
                    MarchParams::new(grid, options.dt_gamma, options.max_steps, options.perturb);
                let capacity: Option<usize> = if options.force_all_rays || self.mean_count == 0 {
                    None
                } else {
                    Some(aligned_capacity(self.mean_count))
                };
                let marched = march_rays_train(grid, &rays, &near_far, &mut rngs, &params, capacity);
                self.step_counter.record(marched.requested, marched.active_rays);
                Ok(marched)
            }
            None => Ok(uniform_marched_samples(
                &rays,
                &near_far,
                &mut rngs,
                options,
                &aabb,
            )),
        }
    }
    /// Refresh the occupancy grid from *field* and the sample budget
    /// from the step counter.
    pub fn update_extra_state<F>(
        &mut self,
        field: &F,
        decay: Float,
        force_full_update: bool,
        force_full_grid: bool,
    ) where
        F: RadianceField + ?Sized,
    {
        let density_scale: Float = self.options.density_scale;
        if let Some(grid) = self.grid.as_mut() {
            grid.update(field, density_scale, decay, force_full_update, force_full_grid);
            if let Some(mean) = self.step_counter.mean_samples() {
                self.mean_count = mean;
            }
            self.step_counter.local_step = 0;
        }
    }
    /// Estimate the grid from scratch.
    pub fn initialize_states<F>(&mut self, field: &F)
    where
        F: RadianceField + ?Sized,
    {
        let density_scale: Float = self.options.density_scale;
        if let Some(grid) = self.grid.as_mut() {
            grid.update(field, density_scale, 0.0, true, true);
            for _ in 0..INITIAL_STATE_UPDATES {
                grid.update(field, density_scale, 1.0, true, true);
            }
        }
    }
    pub fn reset_extra_state(&mut self) {
        if let Some(grid) = self.grid.as_mut() {
            grid.reset();
        }
        self.step_counter.reset();
        self.mean_count = 0;
    }
    /// Invalidate the voxels no training view sees.
    pub fn mark_untrained_grid(&mut self, poses: &[CameraPose], intrinsics: &Intrinsics) {
        if let Some(grid) = self.grid.as_mut() {
            grid.mark_untrained(poses, intrinsics);
        }
    }
    /// Write the grid and the step counter.
    pub fn save_state<W: Write>(&self, w: &mut W) -> Result<()> {
        let grid: &OccupancyGrid = match &self.grid {
            Some(grid) => grid,
            None => return Ok(()),
        };
        w.write_all(STATE_MAGIC)?;
        w.write_u32::<LittleEndian>(STATE_VERSION)?;
        w.write_u64::<LittleEndian>(self.mean_count as u64)?;
        w.write_u32::<LittleEndian>(self.step_counter.local_step)?;
        for entry in self.step_counter.entries.iter() {
            w.write_u32::<LittleEndian>(entry[0])?;
            w.write_u32::<LittleEndian>(entry[1])?;
        }
        grid.write(w)
    }
    /// Restore what [`VolumeRenderer::save_state`] wrote. The stored
    /// grid has to have the shape of this renderer's grid.
    pub fn load_state<R: Read>(&mut self, r: &mut R) -> Result<()> {
        let grid: &mut OccupancyGrid = match self.grid.as_mut() {
            Some(grid) => grid,
            None => return Ok(()),
        };
        let mut magic: [u8; 4] = [0; 4];
        r.read_exact(&mut magic)?;
        if &magic != STATE_MAGIC {
            return Err(NgpError::InvalidState(format!(
                "unknown magic {:?}",
                magic
            )));
        }
        let version: u32 = r.read_u32::<LittleEndian>()?;
        if version != STATE_VERSION {
            return Err(NgpError::InvalidState(format!(
                "state version {} unsupported (expected {})",
                version, STATE_VERSION
            )));
        }
        let mean_count: usize = r.read_u64::<LittleEndian>()? as usize;
        let mut step_counter: StepCounter = StepCounter {
            local_step: r.read_u32::<LittleEndian>()?,
            ..Default::default()
        };
        for entry in step_counter.entries.iter_mut() {
            entry[0] = r.read_u32::<LittleEndian>()?;
            entry[1] = r.read_u32::<LittleEndian>()?;
        }
        grid.read(r)?;
        self.mean_count = mean_count;
        self.step_counter = step_counter;
        info!(
            "loaded grid state: iteration {}, mean density {:.4}",
            grid.iter_density, grid.mean_density
        );
        Ok(())
    }
}

/// Counters of a traced batch needed after the background pass.
#[derive(Debug, Default)]
struct TracedRaysSummary {
    distortion_sum: Float,
    requested: usize,
    active_rays: usize,
}

/// Positions and field answers at *ts* along each ray, clipped to
/// *aabb*. All rays are queried in one batch.
/// Rays with unit directions, so that `t` measures world distance.
/// Zero or non-finite directions become the zero vector and miss the
/// scene box.
fn unit_rays(rays_o: &[Point3f], rays_d: &[Vector3f]) -> Vec<Ray> {
    rays_o
        .iter()
        .zip(rays_d.iter())
        .map(|(o, d)| {
            let length: Float = d.length();
            if length > 0.0 as Float && length.is_finite() {
                Ray::new(*o, *d / length)
            } else {
                Ray::new(*o, Vector3f::default())
            }
        })
        .collect()
}

fn query_samples<F>(field: &F, rays: &[Ray], ts: &[Vec<Float>], aabb: &Bounds3f) -> Vec<Vec<RaySample>>
where
    F: RadianceField + ?Sized,
{
    let positions: Vec<Point3f> = ts
        .iter()
        .zip(rays.iter())
        .flat_map(|(ts, ray)| ts.iter().map(move |t| aabb.clip(&ray.position(*t))))
        .collect();
    let densities: Vec<DensityOutputs> = field.density_batch(&positions);
    let mut samples: Vec<Vec<RaySample>> = Vec::with_capacity(ts.len());
    let mut offset: usize = 0;
    for ts in ts.iter() {
        samples.push(
            ts.iter()
                .enumerate()
                .map(|(k, t)| RaySample {
                    t: *t,
                    p: positions[offset + k],
                    density: densities[offset + k],
                })
                .collect(),
        );
        offset += ts.len();
    }
    samples
}

/// The uniform pass of the hierarchical sampler in the packed layout of
/// a training march.
fn uniform_marched_samples(
    rays: &[Ray],
    near_far: &[Option<(Float, Float)>],
    rngs: &mut [Rng],
    options: &RenderOptions,
    aabb: &Bounds3f,
) -> MarchedSamples {
    let n: usize = options.num_uniform_steps;
    let mut marched: MarchedSamples = MarchedSamples::default();
    for (i, (nf, rng)) in near_far.iter().zip(rngs.iter_mut()).enumerate() {
        let offset: usize = marched.samples.len();
        if let Some((near, far)) = nf {
            let ts: Vec<Float> = uniform_ts(*near, *far, n, options.perturb, rng);
            let deltas: Vec<Float> = interval_deltas(&ts, (far - near) / n.max(1) as Float);
            for (t, dt) in ts.iter().zip(deltas.iter()) {
                marched.samples.push(MarchSample {
                    p: aabb.clip(&rays[i].position(*t)),
                    d: rays[i].d,
                    dt: *dt,
                    t: *t,
                });
            }
        }
        let count: usize = marched.samples.len() - offset;
        if count > 0 {
            marched.active_rays += 1;
        }
        marched.rays.push(RaySpan {
            ray: i as u32,
            offset: offset as u32,
            count: count as u32,
        });
    }
    marched.requested = marched.samples.len();
    marched
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fields::homogeneous::HomogeneousSphere;

    fn sphere() -> HomogeneousSphere {
        HomogeneousSphere::new(Point3f::default(), 0.5, 50.0, Spectrum::rgb(1.0, 0.5, 0.25))
    }

    fn accelerated() -> VolumeRenderer {
        let mut options = RendererOptions::new(1.0);
        options.accelerated = true;
        options.grid_size = 32;
        options.seed = 5;
        VolumeRenderer::new(options).unwrap()
    }

    fn rays(n: usize) -> (Vec<Point3f>, Vec<Vector3f>) {
        let o: Vec<Point3f> = (0..n)
            .map(|i| Point3f::new(0.0, -0.9 + 1.8 * i as Float / (n - 1) as Float, 3.0))
            .collect();
        let d: Vec<Vector3f> = vec![Vector3f::new(0.0, 0.0, -1.0); n];
        (o, d)
    }

    #[test]
    fn step_counter_ring() {
        let mut counter = StepCounter::default();
        assert_eq!(counter.mean_samples(), None);
        counter.record(100, 10);
        counter.record(300, 10);
        assert_eq!(counter.mean_samples(), Some(200));
        for _ in 0..STEP_COUNTER_SIZE {
            counter.record(50, 1);
        }
        assert_eq!(counter.mean_samples(), Some(50));
    }

    #[test]
    fn mismatched_batches_are_rejected() {
        let mut renderer = VolumeRenderer::new(RendererOptions::default()).unwrap();
        let o = vec![Point3f::default(); 2];
        let d = vec![Vector3f::new(0.0, 0.0, 1.0); 3];
        match renderer.render(&sphere(), None, &o, &d, &RenderOptions::default()) {
            Err(NgpError::RayBatchMismatch { origins, directions }) => {
                assert_eq!((origins, directions), (2, 3));
            }
            r => panic!("unexpected {:?}", r.map(|o| o.len())),
        }
    }

    #[test]
    fn misses_show_the_background() {
        let mut renderer = VolumeRenderer::new(RendererOptions::default()).unwrap();
        let o = vec![Point3f::new(0.0, 0.0, 3.0), Point3f::new(0.0, 0.0, 3.0)];
        // the second ray points away from the box, the first has no direction
        let d = vec![Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 0.0, 1.0)];
        let mut options = RenderOptions::default();
        options.bg_color = Some(Spectrum::rgb(0.1, 0.2, 0.3));
        let out = renderer.render(&sphere(), None, &o, &d, &options).unwrap();
        for i in 0..2 {
            assert_eq!(out.weight_sum[i], 0.0);
            assert_eq!(out.depth[i], 0.0);
            assert!(!out.mask[i]);
            assert_eq!(out.image[i], Spectrum::rgb(0.1, 0.2, 0.3));
        }
        assert_eq!(out.sample_count, 0);
        assert_eq!(out.grid_generation, None);
    }

    #[test]
    fn hierarchical_render_hits_the_sphere() {
        let mut renderer = VolumeRenderer::new(RendererOptions::default()).unwrap();
        let (o, d) = rays(5);
        let mut options = RenderOptions::default();
        options.bg_color = Some(Spectrum::new(0.0));
        options.cal_dist_loss = true;
        let out = renderer.render(&sphere(), None, &o, &d, &options).unwrap();
        assert_eq!(out.len(), 5);
        // center ray
        assert!(out.mask[2]);
        assert!(out.image[2].max_abs_diff(&Spectrum::rgb(1.0, 0.5, 0.25)) < 0.01);
        // ray from z = 3 enters the box at z = 1 and the sphere at z = 0.5
        assert!((out.depth[2] - 0.25).abs() < 0.02);
        // outer rays miss
        assert!(!out.mask[0]);
        assert!(out.weight_sum[0] < 1e-4);
        assert!(out.distortion_loss.is_some());
        for w in out.weight_sum.iter() {
            assert!(*w >= 0.0 && *w <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn accelerated_render_reports_generation() {
        let mut renderer = accelerated();
        let field = sphere();
        renderer.initialize_states(&field);
        let (o, d) = rays(5);
        let options = RenderOptions::default();
        let out = renderer.render(&field, None, &o, &d, &options).unwrap();
        let generation = renderer.grid.as_ref().unwrap().generation();
        assert_eq!(out.grid_generation, Some(generation));
        assert!(out.mask[2]);
        assert!((out.depth[2] - 0.25).abs() < 0.02);
        assert!(!out.mask[0]);
        // distortion is only computed without the grid
        assert_eq!(out.distortion_loss, None);
        renderer.update_extra_state(&field, 0.95, false, false);
        assert!(renderer.grid.as_ref().unwrap().generation() > generation);
    }

    #[test]
    fn training_marches_feed_the_sample_budget() {
        let mut renderer = accelerated();
        let field = sphere();
        renderer.initialize_states(&field);
        let (o, d) = rays(9);
        let mut options = RenderOptions::default();
        options.mode = RenderMode::Training;
        let marched = renderer.sample(&o, &d, &options).unwrap();
        assert_eq!(marched.rays.len(), 9);
        assert_eq!(renderer.step_counter.local_step, 1);
        let out = renderer.render(&field, None, &o, &d, &options).unwrap();
        assert_eq!(out.sample_count, marched.samples.len());
        assert_eq!(renderer.step_counter.local_step, 2);
        renderer.update_extra_state(&field, 0.95, false, false);
        assert_eq!(renderer.step_counter.local_step, 0);
        assert_eq!(renderer.mean_count, marched.requested);
        // a tiny budget drops rays but keeps their table entries
        renderer.mean_count = 1;
        let limited = renderer.sample(&o, &d, &options).unwrap();
        assert_eq!(limited.rays.len(), 9);
        assert!(limited.samples.len() <= 128);
        options.force_all_rays = true;
        let all = renderer.sample(&o, &d, &options).unwrap();
        assert_eq!(all.samples.len(), marched.samples.len());
    }

    #[test]
    fn unaccelerated_sample_is_uniform() {
        let mut renderer = VolumeRenderer::new(RendererOptions::default()).unwrap();
        let (o, d) = rays(3);
        let mut options = RenderOptions::default();
        options.num_uniform_steps = 16;
        let marched = renderer.sample(&o, &d, &options).unwrap();
        assert_eq!(marched.samples.len(), 3 * 16);
        assert!(marched.rays.iter().all(|s| s.count == 16));
        assert_eq!(renderer.step_counter.local_step, 0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut renderer = accelerated();
        renderer.initialize_states(&sphere());
        renderer.step_counter.record(10, 1);
        renderer.mean_count = 10;
        renderer.reset_extra_state();
        let grid = renderer.grid.as_ref().unwrap();
        assert!(grid.density_grid.iter().all(|v| *v == 0.0));
        assert_eq!(grid.occupied_count(), 0);
        assert_eq!(grid.iter_density, 0);
        assert_eq!(renderer.mean_count, 0);
        assert_eq!(renderer.step_counter, StepCounter::default());
    }

    #[test]
    fn state_round_trip() {
        let mut renderer = accelerated();
        renderer.initialize_states(&sphere());
        renderer.step_counter.record(42, 3);
        renderer.mean_count = 7;
        let mut buf: Vec<u8> = Vec::new();
        renderer.save_state(&mut buf).unwrap();
        assert_eq!(&buf[..4], b"NGPG");
        let mut restored = accelerated();
        restored.load_state(&mut buf.as_slice()).unwrap();
        assert_eq!(restored.mean_count, 7);
        assert_eq!(restored.step_counter, renderer.step_counter);
        let (a, b) = (renderer.grid.as_ref().unwrap(), restored.grid.as_ref().unwrap());
        assert_eq!(a.density_grid, b.density_grid);
        assert_eq!(a.bitfield, b.bitfield);
        assert_eq!(a.mean_density, b.mean_density);
        // a grid of another shape is refused and left alone
        let mut options = RendererOptions::new(2.0);
        options.accelerated = true;
        options.grid_size = 32;
        let mut other = VolumeRenderer::new(options).unwrap();
        assert!(matches!(
            other.load_state(&mut buf.as_slice()),
            Err(NgpError::InvalidState(_))
        ));
        assert_eq!(other.mean_count, 0);
        assert!(matches!(
            restored.load_state(&mut &b"XXXX"[..]),
            Err(NgpError::InvalidState(_))
        ));
    }
}
