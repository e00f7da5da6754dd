//! Cascaded occupancy grid.
//!
//! The grid stores one density estimate per voxel for `C` nested
//! cascades of `G^3` voxels each. Cascade `c` covers the cube of
//! radius `min(2^c, bound)`, so voxels get coarser further away from
//! the origin. Within a cascade voxels are stored in Morton order.
//! A packed bitfield with one bit per voxel marks the voxels whose
//! density exceeds `min(mean_density, density_thresh)`; the marcher
//! only places samples in those.
//!
//! Density values of `-1` mark voxels no training view ever saw. They
//! are left alone by regular updates.

// std
use std::io::{Read, Write};
// others
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;
// ngp
use crate::core::camera::{CameraPose, Intrinsics};
use crate::core::error::{NgpError, Result};
use crate::core::field::RadianceField;
use crate::core::geometry::Point3f;
use crate::core::morton::{morton3, morton3_invert, MORTON_MAX_COORD};
use crate::core::ngp::{clamp_t, frexp_exponent, Float};
use crate::core::rng::Rng;

/// Updates before this many iterations always resample every voxel.
pub const FULL_UPDATE_ITERATIONS: u32 = 16;
/// Density value of voxels that are never updated.
pub const INVALID_DENSITY: Float = -1.0;

/// Number of cascades needed to cover `[-bound, bound]^3`.
pub fn cascades_for_bound(bound: Float) -> u32 {
    let c: i32 = 1 + bound.log2().ceil() as i32;
    c.max(1) as u32
}

/// Result of locating a point in the grid.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct VoxelLookup {
    pub level: u32,
    /// Half extent of the cascade `level`.
    pub mip_bound: Float,
    pub coords: [u32; 3],
    pub index: usize,
    pub occupied: bool,
}

#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    pub cascades: u32,
    pub grid_size: u32,
    pub bound: Float,
    pub density_thresh: Float,
    /// `cascades * grid_size^3` densities, Morton ordered per cascade
    pub density_grid: Vec<Float>,
    /// one bit per entry of `density_grid`
    pub bitfield: Vec<u8>,
    pub mean_density: Float,
    pub iter_density: u32,
    generation: u64,
    seed: u64,
}

impl OccupancyGrid {
    pub fn new(bound: Float, grid_size: u32, density_thresh: Float, seed: u64) -> Result<Self> {
        if !(bound > 0.0 as Float && bound.is_finite()) {
            return Err(NgpError::InvalidBound(bound));
        }
        if !grid_size.is_power_of_two() || !(2..=MORTON_MAX_COORD).contains(&grid_size) {
            return Err(NgpError::InvalidConfig(format!(
                "grid size must be a power of two between 2 and {}, got {}",
                MORTON_MAX_COORD, grid_size
            )));
        }
        let cascades: u32 = cascades_for_bound(bound);
        let n: usize = cascades as usize * (grid_size as usize).pow(3);
        Ok(OccupancyGrid {
            cascades,
            grid_size,
            bound,
            density_thresh,
            density_grid: vec![0.0 as Float; n],
            bitfield: vec![0_u8; n / 8],
            mean_density: 0.0,
            iter_density: 0,
            generation: 0,
            seed,
        })
    }
    pub fn cells_per_cascade(&self) -> usize {
        (self.grid_size as usize).pow(3)
    }
    pub fn len(&self) -> usize {
        self.density_grid.len()
    }
    pub fn is_empty(&self) -> bool {
        self.density_grid.is_empty()
    }
    /// Incremented by every mutation; renders report the generation
    /// they were marched against.
    pub fn generation(&self) -> u64 {
        self.generation
    }
    /// Half extent of cascade *cascade*.
    pub fn cascade_bound(&self, cascade: u32) -> Float {
        ((1_u32 << cascade) as Float).min(self.bound)
    }
    /// World position of the voxel with Morton code *code* in
    /// *cascade*, optionally jittered within the voxel.
    pub fn cell_position(&self, cascade: u32, code: u32, jitter: Option<&mut Rng>) -> Point3f {
        let (x, y, z) = morton3_invert(code);
        let cas_bound: Float = self.cascade_bound(cascade);
        let half_grid_size: Float = cas_bound / self.grid_size as Float;
        let scale: Float = cas_bound - half_grid_size;
        let g1: Float = (self.grid_size - 1) as Float;
        let to_unit = |c: u32| 2.0 * c as Float / g1 - 1.0;
        let mut p: Point3f = Point3f::new(to_unit(x), to_unit(y), to_unit(z)) * scale;
        if let Some(rng) = jitter {
            p.x += (rng.uniform_float() * 2.0 - 1.0) * half_grid_size;
            p.y += (rng.uniform_float() * 2.0 - 1.0) * half_grid_size;
            p.z += (rng.uniform_float() * 2.0 - 1.0) * half_grid_size;
        }
        p
    }
    /// Current bitfield threshold.
    pub fn threshold(&self) -> Float {
        self.mean_density.min(self.density_thresh)
    }
    /// Regenerate the bitfield: bit set iff the density exceeds
    /// *threshold*.
    pub fn pack_bitfield(&mut self, threshold: Float) {
        self.density_grid
            .par_chunks(8)
            .map(|chunk| {
                let mut bits: u8 = 0;
                for (i, v) in chunk.iter().enumerate() {
                    if *v > threshold {
                        bits |= 1 << i;
                    }
                }
                bits
            })
            .collect_into_vec(&mut self.bitfield);
    }
    pub fn is_occupied_index(&self, index: usize) -> bool {
        self.bitfield[index / 8] & (1 << (index % 8)) != 0
    }
    pub fn occupied_count(&self) -> usize {
        self.bitfield.iter().map(|b| b.count_ones() as usize).sum()
    }
    /// Cascade to use for a sample at *p* with step size *dt*: the
    /// coarser of the cascade containing *p* and the one whose voxels
    /// match *dt*.
    pub fn mip_level(&self, p: &Point3f, dt: Float) -> u32 {
        let max_level: i32 = self.cascades as i32 - 1;
        let mip_from_pos: i32 = clamp_t(frexp_exponent(p.max_abs_component()), 0, max_level);
        let mip_from_dt: i32 = clamp_t(
            frexp_exponent(dt * self.grid_size as Float * 0.5),
            0,
            max_level,
        );
        mip_from_pos.max(mip_from_dt) as u32
    }
    pub fn lookup(&self, p: &Point3f, dt: Float) -> VoxelLookup {
        let level: u32 = self.mip_level(p, dt);
        let mip_bound: Float = self.cascade_bound(level);
        let mip_rbound: Float = 1.0 / mip_bound;
        let g: Float = self.grid_size as Float;
        let to_cell = |v: Float| clamp_t(0.5 * (v * mip_rbound + 1.0) * g, 0.0, g - 1.0) as u32;
        let coords: [u32; 3] = [to_cell(p.x), to_cell(p.y), to_cell(p.z)];
        let index: usize = level as usize * self.cells_per_cascade()
            + morton3(coords[0], coords[1], coords[2]) as usize;
        VoxelLookup {
            level,
            mip_bound,
            coords,
            index,
            occupied: self.is_occupied_index(index),
        }
    }
    /// Resample the field at the voxels and fold the result into the
    /// grid with `max(old * decay, new)`.
    pub fn update<F>(
        &mut self,
        field: &F,
        density_scale: Float,
        decay: Float,
        force_full_update: bool,
        force_full_grid: bool,
    ) where
        F: RadianceField + ?Sized,
    {
        let g3: usize = self.cells_per_cascade();
        let mut tmp_grid: Vec<Float> = vec![INVALID_DENSITY; self.len()];
        let update_seed: u64 = Rng::stream(self.seed, self.generation);
        let full: bool = self.iter_density < FULL_UPDATE_ITERATIONS || force_full_update;
        for cas in 0..self.cascades {
            let offset: usize = cas as usize * g3;
            let codes: Vec<u32> = if full {
                (0..g3 as u32).collect()
            } else {
                self.partial_update_codes(cas, update_seed)
            };
            let positions: Vec<Point3f> = codes
                .par_iter()
                .enumerate()
                .map(|(i, code)| {
                    let mut rng = Rng::with_sequence(Rng::stream(
                        update_seed,
                        (offset + i) as u64,
                    ));
                    self.cell_position(cas, *code, Some(&mut rng))
                })
                .collect();
            let densities = field.density_batch(&positions);
            for (code, d) in codes.iter().zip(densities.iter()) {
                tmp_grid[offset + *code as usize] = d.sigma * density_scale;
            }
        }
        // ema update
        self.density_grid
            .par_iter_mut()
            .zip(tmp_grid.par_iter())
            .for_each(|(old, new)| {
                if force_full_grid || (*old >= 0.0 && *new >= 0.0) {
                    *old = (*old * decay).max(*new);
                }
            });
        self.mean_density = self
            .density_grid
            .par_iter()
            .map(|v| v.max(0.0))
            .sum::<Float>()
            / self.len() as Float;
        self.iter_density += 1;
        self.pack_bitfield(self.threshold());
        self.generation += 1;
        info!(
            "grid update {} ({}): mean density {:.4}, occupied {:.4}",
            self.iter_density,
            if full { "full" } else { "partial" },
            self.mean_density,
            self.occupied_count() as Float / self.len() as Float
        );
    }
    /// A quarter of the voxels of *cascade* at random, plus as many
    /// drawn (with repetition) from its currently occupied voxels.
    fn partial_update_codes(&self, cascade: u32, update_seed: u64) -> Vec<u32> {
        let g3: usize = self.cells_per_cascade();
        let n: usize = g3 / 4;
        let mut rng = Rng::with_sequence(Rng::stream(update_seed, u64::MAX - cascade as u64));
        let mut codes: Vec<u32> = (0..n)
            .map(|_| rng.uniform_uint32_bounded(g3 as u32))
            .collect();
        let offset: usize = cascade as usize * g3;
        let occupied: Vec<u32> = self.density_grid[offset..offset + g3]
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.0)
            .map(|(i, _)| i as u32)
            .collect();
        if !occupied.is_empty() {
            codes.extend(
                (0..n).map(|_| occupied[rng.uniform_uint32_bounded(occupied.len() as u32) as usize]),
            );
        }
        codes
    }
    /// Invalidate every voxel that lies outside the view frustums of
    /// all *poses*.
    pub fn mark_untrained(&mut self, poses: &[CameraPose], intrinsics: &Intrinsics) {
        let g3: usize = self.cells_per_cascade();
        let mut masked: usize = 0;
        for cas in 0..self.cascades {
            let half_grid_size: Float = self.cascade_bound(cas) / self.grid_size as Float;
            let offset: usize = cas as usize * g3;
            let covered: Vec<bool> = (0..g3 as u32)
                .into_par_iter()
                .map(|code| {
                    let p: Point3f = self.cell_position(cas, code, None);
                    poses.iter().any(|pose| {
                        let cam = pose.to_camera(&p);
                        cam.z > 0.0
                            && cam.x.abs() < intrinsics.cx / intrinsics.fx * cam.z + half_grid_size * 2.0
                            && cam.y.abs() < intrinsics.cy / intrinsics.fy * cam.z + half_grid_size * 2.0
                    })
                })
                .collect();
            for (i, c) in covered.iter().enumerate() {
                if !c {
                    self.density_grid[offset + i] = INVALID_DENSITY;
                    masked += 1;
                }
            }
        }
        self.pack_bitfield(self.threshold());
        self.generation += 1;
        info!(
            "marked {} of {} voxels as untrained ({} views)",
            masked,
            self.len(),
            poses.len()
        );
    }
    /// Back to an empty, never updated grid.
    pub fn reset(&mut self) {
        self.density_grid.iter_mut().for_each(|v| *v = 0.0);
        self.bitfield.iter_mut().for_each(|b| *b = 0);
        self.mean_density = 0.0;
        self.iter_density = 0;
        self.generation += 1;
    }
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.cascades)?;
        w.write_u32::<LittleEndian>(self.grid_size)?;
        w.write_f32::<LittleEndian>(self.bound)?;
        w.write_f32::<LittleEndian>(self.mean_density)?;
        w.write_u32::<LittleEndian>(self.iter_density)?;
        for v in self.density_grid.iter() {
            w.write_f32::<LittleEndian>(*v)?;
        }
        w.write_all(&self.bitfield)?;
        Ok(())
    }
    /// Restore state written by [`OccupancyGrid::write`] into a grid of
    /// the same shape.
    pub fn read<R: Read>(&mut self, r: &mut R) -> Result<()> {
        let cascades: u32 = r.read_u32::<LittleEndian>()?;
        let grid_size: u32 = r.read_u32::<LittleEndian>()?;
        let bound: Float = r.read_f32::<LittleEndian>()?;
        if cascades != self.cascades || grid_size != self.grid_size || bound != self.bound {
            return Err(NgpError::InvalidState(format!(
                "stored grid has {} cascades of {}^3 voxels for bound {}, expected {} of {}^3 for bound {}",
                cascades, grid_size, bound, self.cascades, self.grid_size, self.bound
            )));
        }
        let mean_density: Float = r.read_f32::<LittleEndian>()?;
        let iter_density: u32 = r.read_u32::<LittleEndian>()?;
        let mut density_grid: Vec<Float> = vec![0.0 as Float; self.density_grid.len()];
        r.read_f32_into::<LittleEndian>(&mut density_grid)?;
        let mut bitfield: Vec<u8> = vec![0_u8; self.bitfield.len()];
        r.read_exact(&mut bitfield)?;
        // nothing changes unless everything could be read
        self.mean_density = mean_density;
        self.iter_density = iter_density;
        self.density_grid = density_grid;
        self.bitfield = bitfield;
        self.generation += 1;
        Ok(())
    }
}
