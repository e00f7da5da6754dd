//! Front-to-back alpha compositing of ordered samples into weight sum
//! (opacity), normalized depth and color.

// std
use std::f32::consts::PI;
// ngp
use crate::core::field::Background;
use crate::core::geometry::{vec3_dot_vec3f, Point2f, Point3f, Vector3f};
use crate::core::ngp::{clamp_t, quadratic, Float, Spectrum, INV_PI};

/// Keeps the transmittance product from locking at exactly zero.
pub const TRANSMITTANCE_EPSILON: Float = 1e-15;
/// Samples whose weight does not exceed this do not need a color.
pub const COLOR_WEIGHT_THRESHOLD: Float = 1e-4;
/// Rays with a larger weight sum count as covered.
pub const MASK_THRESHOLD: Float = 0.95;

/// Opacity of an interval of length *delta* with density *sigma*.
pub fn alpha(delta: Float, sigma: Float) -> Float {
    1.0 as Float - (-delta * sigma).exp()
}

/// Per-sample weights `alpha_i * prod_{j<i} (1 - alpha_j + eps)`.
pub fn compute_weights(deltas: &[Float], sigmas: &[Float], density_scale: Float) -> Vec<Float> {
    let mut weights: Vec<Float> = Vec::with_capacity(deltas.len());
    let mut transmittance: Float = 1.0;
    for (delta, sigma) in deltas.iter().zip(sigmas.iter()) {
        let a: Float = alpha(*delta, density_scale * *sigma);
        weights.push(a * transmittance);
        transmittance *= 1.0 as Float - a + TRANSMITTANCE_EPSILON;
    }
    weights
}

/// `clamp((t - near) / (far - near), 0, 1)`
pub fn normalized_t(t: Float, near: Float, far: Float) -> Float {
    clamp_t((t - near) / (far - near), 0.0 as Float, 1.0 as Float)
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Composite {
    pub weight_sum: Float,
    pub depth: Float,
    pub color: Spectrum,
}

impl Composite {
    /// Accumulate one sample.
    pub fn add(&mut self, weight: Float, depth: Float, color: &Spectrum) {
        self.weight_sum += weight;
        self.depth += weight * depth;
        self.color += *color * weight;
    }
    /// Mix in the background for the remaining transmittance.
    pub fn finish(&self, bg_color: &Spectrum) -> Spectrum {
        self.color + *bg_color * (1.0 as Float - self.weight_sum)
    }
    pub fn covered(&self) -> bool {
        self.weight_sum > MASK_THRESHOLD
    }
}

/// Composite precomputed *weights* for samples at *ts*.
pub fn composite(
    weights: &[Float],
    ts: &[Float],
    colors: &[Spectrum],
    near: Float,
    far: Float,
) -> Composite {
    let mut c: Composite = Composite::default();
    for i in 0..weights.len() {
        c.add(weights[i], normalized_t(ts[i], near, far), &colors[i]);
    }
    c
}

/// Polar coordinates (both in `[-1, 1]`) where the ray leaves a sphere
/// of *radius* around the origin.
pub fn polar_from_ray(o: &Point3f, d: &Vector3f, radius: Float) -> Point2f {
    let ov: Vector3f = Vector3f::new(o.x, o.y, o.z);
    let a: Float = vec3_dot_vec3f(d, d);
    let b: Float = 2.0 * vec3_dot_vec3f(&ov, d);
    let c: Float = vec3_dot_vec3f(&ov, &ov) - radius * radius;
    let mut t0: Float = 0.0;
    let mut t1: Float = 0.0;
    let t: Float = if quadratic(a, b, c, &mut t0, &mut t1) {
        t1
    } else {
        // closest approach
        -b / (2.0 * a)
    };
    let p: Point3f = *o + *d * t;
    let theta: Float = clamp_t(p.z / radius, -1.0 as Float, 1.0 as Float).acos();
    Point2f {
        x: p.y.atan2(p.x) * INV_PI,
        y: theta * 2.0 / PI - 1.0,
    }
}

/// Where the background color of a ray comes from.
pub enum BackgroundSource<'a> {
    Model {
        model: &'a dyn Background,
        radius: Float,
    },
    Constant(Spectrum),
}

impl<'a> BackgroundSource<'a> {
    /// A background model wins when one is given and `bg_radius > 0`,
    /// then an explicit color, then white.
    pub fn select(
        model: Option<&'a dyn Background>,
        bg_radius: Float,
        bg_color: Option<Spectrum>,
    ) -> Self {
        match model {
            Some(model) if bg_radius > 0.0 as Float => BackgroundSource::Model {
                model,
                radius: bg_radius,
            },
            _ => BackgroundSource::Constant(bg_color.unwrap_or_else(|| Spectrum::new(1.0))),
        }
    }
    pub fn color(&self, o: &Point3f, d: &Vector3f) -> Spectrum {
        match self {
            BackgroundSource::Model { model, radius } => {
                model.background(&polar_from_ray(o, d, *radius), d)
            }
            BackgroundSource::Constant(c) => *c,
        }
    }
}

/// Efficient distortion loss for one ray: `sum_ij w_i w_j |m_i - m_j|
/// + 1/3 sum_i w_i^2 d_i`, evaluated in linear time on sorted interval
/// midpoints *mids* with widths *intervals*.
pub fn distortion_loss(weights: &[Float], mids: &[Float], intervals: &[Float]) -> Float {
    let mut loss_uni: Float = 0.0;
    let mut loss_bi: Float = 0.0;
    let mut w_prefix: Float = 0.0;
    let mut wm_prefix: Float = 0.0;
    for i in 0..weights.len() {
        let w: Float = weights[i];
        let m: Float = mids[i];
        loss_uni += w * w * intervals[i];
        loss_bi += 2.0 * w * (m * w_prefix - wm_prefix);
        w_prefix += w;
        wm_prefix += w * m;
    }
    loss_bi + loss_uni / 3.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn weights_sum_to_at_most_one() {
        let deltas: Vec<Float> = vec![0.1; 64];
        let sigmas: Vec<Float> = (0..64).map(|i| (i % 7) as Float * 13.0).collect();
        let w = compute_weights(&deltas, &sigmas, 1.0);
        let sum: Float = w.iter().sum();
        assert!(sum <= 1.0 + 1e-5);
        assert!(w.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn zero_density_is_transparent() {
        let w = compute_weights(&[0.5, 0.5, 0.5], &[0.0, 0.0, 0.0], 1.0);
        assert_eq!(w.iter().sum::<Float>(), 0.0);
        let c = composite(
            &w,
            &[1.0, 1.5, 2.0],
            &[Spectrum::new(1.0); 3],
            1.0,
            2.0,
        );
        let bg = Spectrum::rgb(0.2, 0.3, 0.4);
        assert_eq!(c.finish(&bg), bg);
        assert!(!c.covered());
    }

    #[test]
    fn opaque_sample_takes_everything() {
        let w = compute_weights(&[1.0, 1.0], &[1e4, 5.0], 1.0);
        assert!((w[0] - 1.0).abs() < 1e-6);
        assert!(w[1] < 1e-6);
        let c = composite(&w, &[3.0, 3.5], &[Spectrum::rgb(1.0, 0.0, 0.0), Spectrum::new(1.0)], 2.0, 4.0);
        assert!((c.depth - 0.5).abs() < 1e-5);
        assert!(c.covered());
        let color = c.finish(&Spectrum::new(1.0));
        assert!(color.max_abs_diff(&Spectrum::rgb(1.0, 0.0, 0.0)) < 1e-5);
    }

    #[test]
    fn density_scale_multiplies_sigma() {
        let a = compute_weights(&[0.1], &[2.0], 3.0);
        let b = compute_weights(&[0.1], &[6.0], 1.0);
        assert!((a[0] - b[0]).abs() < 1e-7);
    }

    #[test]
    fn polar_coordinates_of_axis_rays() {
        let o = Point3f::new(0.0, 0.0, 0.0);
        let up = polar_from_ray(&o, &Vector3f::new(0.0, 0.0, 1.0), 2.0);
        assert!((up.y + 1.0).abs() < 1e-5);
        let side = polar_from_ray(&o, &Vector3f::new(0.0, 1.0, 0.0), 2.0);
        assert!(side.y.abs() < 1e-5);
        assert!((side.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn background_selection() {
        let red = Spectrum::rgb(1.0, 0.0, 0.0);
        let o = Point3f::default();
        let d = Vector3f::new(0.0, 0.0, 1.0);
        assert_eq!(BackgroundSource::select(None, 2.0, Some(red)).color(&o, &d), red);
        assert_eq!(
            BackgroundSource::select(None, -1.0, None).color(&o, &d),
            Spectrum::new(1.0)
        );
    }

    #[test]
    fn distortion_of_single_spike_is_small() {
        let spread = distortion_loss(&[0.5, 0.5], &[0.1, 0.9], &[0.1, 0.1]);
        let spike = distortion_loss(&[1.0, 0.0], &[0.1, 0.9], &[0.1, 0.1]);
        assert!(spike < spread);
        // 2 * 0.5 * 0.5 * 0.8 + (0.25 * 0.1 * 2) / 3
        assert!((spread - (0.4 + 0.05 / 3.0)).abs() < 1e-6);
    }
}
