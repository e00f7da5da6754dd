// ngp
use crate::core::error::{NgpError, Result};
use crate::core::field::{DensityOutputs, RadianceField};
use crate::core::geometry::{Bounds3f, Point3f, Vector3f};
use crate::core::ngp::{lerp, Float, Spectrum};
use crate::core::paramset::ParamSet;
use crate::core::sh::{sh_num_coeffs, ShColor};

/// Density samples on a regular `nx * ny * nz` lattice spanning
/// `bounds`, interpolated trilinearly. Colors come from a spherical
/// harmonics expansion in the viewing direction.
#[derive(Debug, Clone)]
pub struct GridDensityField {
    pub nx: i32,
    pub ny: i32,
    pub nz: i32,
    pub bounds: Bounds3f,
    pub density: Vec<Float>,
    pub color: ShColor,
}

impl GridDensityField {
    pub fn new(
        nx: i32,
        ny: i32,
        nz: i32,
        bounds: Bounds3f,
        density: Vec<Float>,
        color: ShColor,
    ) -> Result<Self> {
        if nx <= 0 || ny <= 0 || nz <= 0 {
            return Err(NgpError::InvalidConfig(format!(
                "density lattice {} x {} x {} is empty",
                nx, ny, nz
            )));
        }
        let expected: usize = (nx * ny * nz) as usize;
        if density.len() != expected {
            return Err(NgpError::InvalidConfig(format!(
                "density lattice {} x {} x {} needs {} values, {} given",
                nx,
                ny,
                nz,
                expected,
                density.len()
            )));
        }
        if !bounds.is_valid() {
            return Err(NgpError::InvalidConfig(format!(
                "density lattice bounds {:?} are degenerate",
                bounds
            )));
        }
        Ok(GridDensityField {
            nx,
            ny,
            nz,
            bounds,
            density,
            color,
        })
    }
    pub fn create(params: &ParamSet) -> Result<Self> {
        let nx: i32 = params.find_one_int("nx", 1);
        let ny: i32 = params.find_one_int("ny", 1);
        let nz: i32 = params.find_one_int("nz", 1);
        let p0: Point3f = params.find_one_point3f("p0", Point3f::new(-1.0, -1.0, -1.0));
        let p1: Point3f = params.find_one_point3f("p1", Point3f::new(1.0, 1.0, 1.0));
        let density: Vec<Float> = params.find_float("density");
        let degree: i32 = params.find_one_int("sh_degree", -1);
        let color: ShColor = if degree < 0 {
            ShColor::constant(&params.find_one_spectrum("color", Spectrum::new(1.0)))
        } else {
            let degree: u32 = degree as u32;
            let zeros = || vec![0.0 as Float; sh_num_coeffs(degree.min(3))];
            let channel = |name: &str| {
                let c: Vec<Float> = params.find_float(name);
                if c.is_empty() {
                    zeros()
                } else {
                    c
                }
            };
            ShColor::new(degree, channel("sh_r"), channel("sh_g"), channel("sh_b"))?
        };
        GridDensityField::new(nx, ny, nz, Bounds3f::new(p0, p1), density, color)
    }
    /// Lattice value, zero outside.
    pub fn d(&self, x: i32, y: i32, z: i32) -> Float {
        if x < 0 || x >= self.nx || y < 0 || y >= self.ny || z < 0 || z >= self.nz {
            0.0 as Float
        } else {
            self.density[((z * self.ny + y) * self.nx + x) as usize]
        }
    }
    /// Trilinear interpolation at lattice position *p* in `[0, 1]^3`.
    pub fn interpolate(&self, p: &Point3f) -> Float {
        let p_samples: Point3f = Point3f {
            x: p.x * self.nx as Float - 0.5 as Float,
            y: p.y * self.ny as Float - 0.5 as Float,
            z: p.z * self.nz as Float - 0.5 as Float,
        };
        let (x, y, z) = (
            p_samples.x.floor() as i32,
            p_samples.y.floor() as i32,
            p_samples.z.floor() as i32,
        );
        let d: Vector3f = Vector3f {
            x: p_samples.x - x as Float,
            y: p_samples.y - y as Float,
            z: p_samples.z - z as Float,
        };
        let d00: Float = lerp(d.x, self.d(x, y, z), self.d(x + 1, y, z));
        let d10: Float = lerp(d.x, self.d(x, y + 1, z), self.d(x + 1, y + 1, z));
        let d01: Float = lerp(d.x, self.d(x, y, z + 1), self.d(x + 1, y, z + 1));
        let d11: Float = lerp(d.x, self.d(x, y + 1, z + 1), self.d(x + 1, y + 1, z + 1));
        let d0: Float = lerp(d.y, d00, d10);
        let d1: Float = lerp(d.y, d01, d11);
        lerp(d.z, d0, d1)
    }
}

impl RadianceField for GridDensityField {
    fn density(&self, p: &Point3f) -> DensityOutputs {
        if !self.bounds.inside(p) {
            return DensityOutputs { sigma: 0.0 };
        }
        let diag: Vector3f = self.bounds.diagonal();
        let local: Point3f = Point3f {
            x: (p.x - self.bounds.p_min.x) / diag.x,
            y: (p.y - self.bounds.p_min.y) / diag.y,
            z: (p.z - self.bounds.p_min.z) / diag.z,
        };
        DensityOutputs {
            sigma: self.interpolate(&local).max(0.0),
        }
    }
    fn color(&self, _p: &Point3f, d: &Vector3f, _density: &DensityOutputs) -> Spectrum {
        // SH colors may leave [0, 1]
        self.color.eval(&d.normalize()).clamp(0.0, 1.0)
    }
}
