//! Occupancy guided ray marching.
//!
//! Samples are only placed inside voxels whose occupancy bit is set;
//! empty voxels are skipped up to their far boundary. The step size
//! grows with the distance travelled (`dt_gamma`) between `dt_min` and
//! `dt_max`.
//!
//! Training marches every ray to the end in one go and packs the
//! variable number of samples per ray into one flat buffer indexed by
//! a table of [`RaySpan`]s. Inference marches a few steps at a time,
//! see `integrators::compaction`.

// others
use rayon::prelude::*;
// ngp
use crate::accelerators::occupancy::OccupancyGrid;
use crate::core::geometry::{Bounds3f, Point3f, Ray, Vector3f};
use crate::core::ngp::{clamp_t, Float, SQRT_3};
use crate::core::rng::Rng;

/// Flat buffer capacities are rounded up to a multiple of this.
pub const CAPACITY_ALIGN: usize = 128;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarchParams {
    pub dt_gamma: Float,
    pub dt_min: Float,
    pub dt_max: Float,
    pub max_steps: u32,
    pub perturb: bool,
}

impl MarchParams {
    pub fn new(grid: &OccupancyGrid, dt_gamma: Float, max_steps: u32, perturb: bool) -> Self {
        MarchParams {
            dt_gamma,
            dt_min: 2.0 * SQRT_3 / max_steps.max(1) as Float,
            dt_max: 2.0 * SQRT_3 * (1_u32 << (grid.cascades - 1)) as Float
                / grid.grid_size as Float,
            max_steps,
            perturb,
        }
    }
    pub fn step_size(&self, t: Float) -> Float {
        clamp_t(t * self.dt_gamma, self.dt_min, self.dt_max)
    }
    /// Starting distance, shifted by a random fraction of a step when
    /// perturbing.
    pub fn start(&self, near: Float, rng: &mut Rng) -> Float {
        if self.perturb {
            near + self.step_size(near) * rng.uniform_float()
        } else {
            near
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct MarchSample {
    pub p: Point3f,
    pub d: Vector3f,
    /// interval length used for compositing
    pub dt: Float,
    pub t: Float,
}

/// Advance `*t` along *ray* and emit up to *limit* samples in occupied
/// voxels before `far`. Returns the number of samples emitted.
pub fn march_ray<F>(
    grid: &OccupancyGrid,
    ray: &Ray,
    t: &mut Float,
    far: Float,
    limit: usize,
    params: &MarchParams,
    mut emit: F,
) -> usize
where
    F: FnMut(MarchSample),
{
    let bounds: Bounds3f = Bounds3f::cube(grid.bound);
    let rd: Vector3f = Vector3f::new(1.0 / ray.d.x, 1.0 / ray.d.y, 1.0 / ray.d.z);
    let r_g: Float = 1.0 / grid.grid_size as Float;
    let mut count: usize = 0;
    while *t < far && count < limit {
        let p: Point3f = bounds.clip(&ray.position(*t));
        let dt: Float = params.step_size(*t);
        let voxel = grid.lookup(&p, dt);
        if voxel.occupied {
            emit(MarchSample {
                p,
                d: ray.d,
                dt,
                t: *t,
            });
            *t += dt;
            count += 1;
        } else {
            // skip to the next voxel boundary
            let exit = |cell: u32, x: Float, dx: Float, rdx: Float| -> Float {
                if dx == 0.0 {
                    // never leaves through this pair of faces
                    return Float::INFINITY;
                }
                let side: Float = if dx > 0.0 { 1.0 } else { 0.0 };
                (((cell as Float + side) * r_g * 2.0 - 1.0) * voxel.mip_bound - x) * rdx
            };
            let tx: Float = exit(voxel.coords[0], p.x, ray.d.x, rd.x);
            let ty: Float = exit(voxel.coords[1], p.y, ray.d.y, rd.y);
            let tz: Float = exit(voxel.coords[2], p.z, ray.d.z, rd.z);
            let tt: Float = *t + tx.min(ty).min(tz).max(0.0);
            loop {
                *t += params.step_size(*t);
                if *t >= tt {
                    break;
                }
            }
        }
    }
    count
}

/// One entry of the rays table: samples `offset..offset + count` of the
/// flat buffer belong to ray `ray`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RaySpan {
    pub ray: u32,
    pub offset: u32,
    pub count: u32,
}

/// Samples of a whole batch of rays.
#[derive(Debug, Default, Clone)]
pub struct MarchedSamples {
    pub samples: Vec<MarchSample>,
    pub rays: Vec<RaySpan>,
    /// samples the march wanted to emit, including those dropped for
    /// lack of capacity
    pub requested: usize,
    /// rays with at least one requested sample
    pub active_rays: usize,
}

impl MarchedSamples {
    pub fn ray_samples(&self, span: &RaySpan) -> &[MarchSample] {
        &self.samples[span.offset as usize..(span.offset + span.count) as usize]
    }
}

/// `mean_count` rounded up to [`CAPACITY_ALIGN`].
pub fn aligned_capacity(mean_count: usize) -> usize {
    (mean_count + CAPACITY_ALIGN - 1) / CAPACITY_ALIGN * CAPACITY_ALIGN
}

/// March every ray from `near` to `far` (at most `max_steps` samples
/// each). Rays whose samples would not fit into *capacity* keep their
/// table entry with a count of zero.
pub fn march_rays_train(
    grid: &OccupancyGrid,
    rays: &[Ray],
    near_far: &[Option<(Float, Float)>],
    rngs: &mut [Rng],
    params: &MarchParams,
    capacity: Option<usize>,
) -> MarchedSamples {
    let limit: usize = params.max_steps as usize;
    // first pass: count
    let starts: Vec<Float> = near_far
        .par_iter()
        .zip(rngs.par_iter_mut())
        .map(|(nf, rng)| match nf {
            Some((near, _)) => params.start(*near, rng),
            None => 0.0,
        })
        .collect();
    let counts: Vec<usize> = (0..rays.len())
        .into_par_iter()
        .map(|i| match near_far[i] {
            Some((_, far)) => {
                let mut t: Float = starts[i];
                march_ray(grid, &rays[i], &mut t, far, limit, params, |_| {})
            }
            None => 0,
        })
        .collect();
    // offsets
    let requested: usize = counts.iter().sum();
    let capacity: usize = capacity.unwrap_or(requested);
    let mut spans: Vec<RaySpan> = Vec::with_capacity(rays.len());
    let mut offset: usize = 0;
    let mut dropped: usize = 0;
    for (i, count) in counts.iter().enumerate() {
        let count: usize = if offset + count > capacity {
            if *count > 0 {
                dropped += 1;
            }
            0
        } else {
            *count
        };
        spans.push(RaySpan {
            ray: i as u32,
            offset: offset as u32,
            count: count as u32,
        });
        offset += count;
    }
    if dropped > 0 {
        warn!(
            "{} rays dropped, {} samples requested for a capacity of {}",
            dropped, requested, capacity
        );
    }
    // second pass: write
    let mut samples: Vec<MarchSample> = vec![MarchSample::default(); offset];
    let mut slices: Vec<&mut [MarchSample]> = Vec::with_capacity(spans.len());
    let mut rest: &mut [MarchSample] = &mut samples[..];
    for span in spans.iter() {
        let (head, tail) = rest.split_at_mut(span.count as usize);
        slices.push(head);
        rest = tail;
    }
    slices
        .into_par_iter()
        .zip(spans.par_iter())
        .for_each(|(slice, span)| {
            if span.count == 0 {
                return;
            }
            if let Some((_, far)) = near_far[span.ray as usize] {
                let mut t: Float = starts[span.ray as usize];
                let mut k: usize = 0;
                march_ray(
                    grid,
                    &rays[span.ray as usize],
                    &mut t,
                    far,
                    span.count as usize,
                    params,
                    |s| {
                        slice[k] = s;
                        k += 1;
                    },
                );
            }
        });
    MarchedSamples {
        samples,
        rays: spans,
        requested,
        active_rays: counts.iter().filter(|c| **c > 0).count(),
    }
}
