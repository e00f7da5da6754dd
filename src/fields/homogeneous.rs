// ngp
use crate::core::error::{NgpError, Result};
use crate::core::field::{DensityOutputs, RadianceField};
use crate::core::geometry::{Point3f, Vector3f};
use crate::core::ngp::{Float, Spectrum};
use crate::core::paramset::ParamSet;

/// Constant density inside a sphere, nothing outside.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HomogeneousSphere {
    pub center: Point3f,
    pub radius: Float,
    pub sigma: Float,
    pub color: Spectrum,
}

impl HomogeneousSphere {
    pub fn new(center: Point3f, radius: Float, sigma: Float, color: Spectrum) -> Self {
        HomogeneousSphere {
            center,
            radius,
            sigma,
            color,
        }
    }
    pub fn create(params: &ParamSet) -> Result<Self> {
        let center: Point3f = params.find_one_point3f("center", Point3f::default());
        let radius: Float = params.find_one_float("radius", 0.5);
        let sigma: Float = params.find_one_float("sigma", 50.0);
        let color: Spectrum = params.find_one_spectrum("color", Spectrum::new(1.0));
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(NgpError::Parse(format!(
                "sphere radius has to be positive, got {}",
                radius
            )));
        }
        if sigma < 0.0 {
            return Err(NgpError::Parse(format!(
                "sphere density can't be negative, got {}",
                sigma
            )));
        }
        Ok(HomogeneousSphere::new(center, radius, sigma, color))
    }
}

impl RadianceField for HomogeneousSphere {
    fn density(&self, p: &Point3f) -> DensityOutputs {
        let v: Vector3f = *p - self.center;
        DensityOutputs {
            sigma: if v.length_squared() <= self.radius * self.radius {
                self.sigma
            } else {
                0.0
            },
        }
    }
    fn color(&self, _p: &Point3f, _d: &Vector3f, _density: &DensityOutputs) -> Spectrum {
        self.color
    }
}
