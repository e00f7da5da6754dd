//! The interfaces the renderer consumes: a radiance field answering
//! density and color queries, and an optional background model for
//! whatever the field leaves transparent.

// others
use rayon::prelude::*;
// ngp
use crate::core::geometry::{Point2f, Point3f, Vector3f};
use crate::core::ngp::{Float, Spectrum};

/// Output of a density query. Color queries receive it back so that a
/// field can share work between the two.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct DensityOutputs {
    pub sigma: Float,
}

pub trait RadianceField: Send + Sync {
    fn density(&self, p: &Point3f) -> DensityOutputs;
    /// Color leaving `p` in direction `d`.
    fn color(&self, p: &Point3f, d: &Vector3f, density: &DensityOutputs) -> Spectrum;
    /// Batched density query.
    fn density_batch(&self, ps: &[Point3f]) -> Vec<DensityOutputs> {
        ps.par_iter().map(|p| self.density(p)).collect()
    }
    /// Batched color query. Entries with `mask[i] == false` carry
    /// negligible weight; their colors are never read and come back
    /// black.
    fn color_batch(
        &self,
        ps: &[Point3f],
        ds: &[Vector3f],
        mask: Option<&[bool]>,
        densities: &[DensityOutputs],
    ) -> Vec<Spectrum> {
        (0..ps.len())
            .into_par_iter()
            .map(|i| match mask {
                Some(m) if !m[i] => Spectrum::default(),
                _ => self.color(&ps[i], &ds[i], &densities[i]),
            })
            .collect()
    }
}

pub trait Background: Send + Sync {
    /// Color seen along direction `d`, which leaves the background
    /// sphere at polar coordinates `polar` (both in `[-1, 1]`).
    fn background(&self, polar: &Point2f, d: &Vector3f) -> Spectrum;
}
