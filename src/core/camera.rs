//! Pinhole cameras. Camera space looks down `+z` with `+x` to the
//! right and `+y` down the image, the convention of the poses used to
//! mask untrained regions of the occupancy grid.

// ngp
use crate::core::error::{NgpError, Result};
use crate::core::geometry::{vec3_cross_vec3, vec3_dot_vec3f, Point3f, Ray, Vector3f};
use crate::core::ngp::{radians, Float};

/// Focal lengths and principal point in pixels.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Intrinsics {
    pub fx: Float,
    pub fy: Float,
    pub cx: Float,
    pub cy: Float,
}

impl Intrinsics {
    /// Intrinsics of a `width` x `height` image with a vertical field
    /// of view of `fov` degrees.
    pub fn from_fov(fov: Float, width: u32, height: u32) -> Self {
        let focal: Float = 0.5 * height as Float / (0.5 * radians(fov)).tan();
        Intrinsics {
            fx: focal,
            fy: focal,
            cx: 0.5 * width as Float,
            cy: 0.5 * height as Float,
        }
    }
}

/// Camera-to-world rigid transform. The columns of `rotation` are the
/// camera axes expressed in world space, `translation` is the camera
/// center.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraPose {
    pub rotation: [[Float; 3]; 3],
    pub translation: Vector3f,
}

impl Default for CameraPose {
    fn default() -> Self {
        CameraPose {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: Vector3f::default(),
        }
    }
}

impl CameraPose {
    pub fn look_at(pos: &Point3f, look: &Point3f, up: &Vector3f) -> Result<CameraPose> {
        let dir: Vector3f = (*look - *pos).normalize();
        let right: Vector3f = vec3_cross_vec3(&dir, &up.normalize());
        if dir.has_nans() || right.length() == 0.0 as Float {
            return Err(NgpError::InvalidConfig(format!(
                "\"up\" vector ({}, {}, {}) and viewing direction ({}, {}, {}) passed to \
                 look_at are degenerate",
                up.x, up.y, up.z, dir.x, dir.y, dir.z
            )));
        }
        let right: Vector3f = right.normalize();
        let down: Vector3f = vec3_cross_vec3(&dir, &right);
        Ok(CameraPose {
            rotation: [
                [right.x, down.x, dir.x],
                [right.y, down.y, dir.y],
                [right.z, down.z, dir.z],
            ],
            translation: Vector3f::new(pos.x, pos.y, pos.z),
        })
    }
    pub fn origin(&self) -> Point3f {
        Point3f::new(self.translation.x, self.translation.y, self.translation.z)
    }
    /// Rotate a camera space direction into world space.
    pub fn to_world(&self, v: &Vector3f) -> Vector3f {
        let m = &self.rotation;
        Vector3f {
            x: m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            y: m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            z: m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        }
    }
    /// `R^T (p - t)`
    pub fn to_camera(&self, p: &Point3f) -> Vector3f {
        let v: Vector3f = *p - self.origin();
        let m = &self.rotation;
        let col = |j: usize| Vector3f::new(m[0][j], m[1][j], m[2][j]);
        Vector3f {
            x: vec3_dot_vec3f(&v, &col(0)),
            y: vec3_dot_vec3f(&v, &col(1)),
            z: vec3_dot_vec3f(&v, &col(2)),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct PinholeCamera {
    pub pose: CameraPose,
    pub intrinsics: Intrinsics,
    pub width: u32,
    pub height: u32,
}

impl PinholeCamera {
    pub fn new(pose: CameraPose, intrinsics: Intrinsics, width: u32, height: u32) -> Self {
        PinholeCamera {
            pose,
            intrinsics,
            width,
            height,
        }
    }
    /// Unit-direction ray through the center of pixel `(px, py)`.
    pub fn generate_ray(&self, px: u32, py: u32) -> Ray {
        let k = &self.intrinsics;
        let d_cam: Vector3f = Vector3f {
            x: (px as Float + 0.5 - k.cx) / k.fx,
            y: (py as Float + 0.5 - k.cy) / k.fy,
            z: 1.0,
        };
        Ray::new(self.pose.origin(), self.pose.to_world(&d_cam).normalize())
    }
    /// All rays in scanline order.
    pub fn generate_rays(&self) -> (Vec<Point3f>, Vec<Vector3f>) {
        let n: usize = (self.width * self.height) as usize;
        let mut rays_o: Vec<Point3f> = Vec::with_capacity(n);
        let mut rays_d: Vec<Vector3f> = Vec::with_capacity(n);
        for py in 0..self.height {
            for px in 0..self.width {
                let ray: Ray = self.generate_ray(px, py);
                rays_o.push(ray.o);
                rays_d.push(ray.d);
            }
        }
        (rays_o, rays_d)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn look_at_points_down_z() {
        let pose = CameraPose::look_at(
            &Point3f::new(0.0, 0.0, 3.0),
            &Point3f::new(0.0, 0.0, 0.0),
            &Vector3f::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        let cam = pose.to_camera(&Point3f::new(0.0, 0.0, 0.0));
        assert!((cam.z - 3.0).abs() < 1e-6);
        assert!(cam.x.abs() < 1e-6 && cam.y.abs() < 1e-6);
        // a point above the target appears in the upper half of the image
        let above = pose.to_camera(&Point3f::new(0.0, 1.0, 0.0));
        assert!(above.y < 0.0);
    }

    #[test]
    fn central_ray_hits_target() {
        let pose = CameraPose::look_at(
            &Point3f::new(0.0, 0.0, 3.0),
            &Point3f::new(0.0, 0.0, 0.0),
            &Vector3f::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        let camera = PinholeCamera::new(pose, Intrinsics::from_fov(45.0, 2, 2), 2, 2);
        let (o, d) = camera.generate_rays();
        assert_eq!(o.len(), 4);
        for dir in d.iter() {
            assert!((dir.length() - 1.0).abs() < 1e-5);
            assert!(dir.z < 0.0);
        }
    }

    #[test]
    fn degenerate_look_at() {
        let r = CameraPose::look_at(
            &Point3f::new(0.0, 0.0, 3.0),
            &Point3f::new(0.0, 0.0, 0.0),
            &Vector3f::new(0.0, 0.0, 1.0),
        );
        assert!(r.is_err());
    }
}
