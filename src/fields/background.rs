// ngp
use crate::core::field::Background;
use crate::core::geometry::{Point2f, Vector3f};
use crate::core::ngp::{lerp, Float, Spectrum};
use crate::core::paramset::ParamSet;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConstantBackground {
    pub color: Spectrum,
}

impl ConstantBackground {
    pub fn create(params: &ParamSet) -> Self {
        ConstantBackground {
            color: params.find_one_spectrum("color", Spectrum::new(1.0)),
        }
    }
}

impl Background for ConstantBackground {
    fn background(&self, _polar: &Point2f, _d: &Vector3f) -> Spectrum {
        self.color
    }
}

/// Gradient from `ground` through `horizon` to `zenith`, driven by the
/// polar angle where the ray leaves the background sphere (`+z` is up).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SkyBackground {
    pub zenith: Spectrum,
    pub horizon: Spectrum,
    pub ground: Spectrum,
}

impl SkyBackground {
    pub fn create(params: &ParamSet) -> Self {
        SkyBackground {
            zenith: params.find_one_spectrum("zenith", Spectrum::rgb(0.3, 0.5, 0.9)),
            horizon: params.find_one_spectrum("horizon", Spectrum::rgb(0.9, 0.9, 1.0)),
            ground: params.find_one_spectrum("ground", Spectrum::rgb(0.3, 0.3, 0.3)),
        }
    }
}

impl Background for SkyBackground {
    fn background(&self, polar: &Point2f, _d: &Vector3f) -> Spectrum {
        // polar.y is -1 at the zenith and 1 at the nadir
        let elevation: Float = -polar.y;
        if elevation >= 0.0 {
            lerp(elevation, self.horizon, self.zenith)
        } else {
            lerp(-elevation, self.horizon, self.ground)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sky_gradient_ends() {
        let sky = SkyBackground::create(&ParamSet::new("Background", "sky"));
        let d = Vector3f::new(0.0, 0.0, 1.0);
        assert_eq!(sky.background(&Point2f { x: 0.0, y: -1.0 }, &d), sky.zenith);
        assert_eq!(sky.background(&Point2f { x: 0.0, y: 0.0 }, &d), sky.horizon);
        assert_eq!(sky.background(&Point2f { x: 0.5, y: 1.0 }, &d), sky.ground);
    }
}
