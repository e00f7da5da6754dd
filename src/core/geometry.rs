//! Geometric classes the renderer is built on: points, vectors, rays
//! and axis-aligned boxes.
//!
//! # Points and vectors
//!
//! A **point** is a location in 3D space, a **vector** a direction
//! (or displacement). Both use x, y, z coordinates, but differ in the
//! arithmetic that is allowed between them: subtracting two points
//! yields a vector, adding a vector to a point yields a point.
//!
//! ```rust
//! use rs_ngp::core::geometry::{Point3f, Vector3f};
//!
//! let o = Point3f { x: 0.0, y: 0.0, z: 3.0 };
//! let d = Vector3f { x: 0.0, y: 0.0, z: -1.0 };
//! let p = o + d * 2.5;
//! assert_eq!(p.z, 0.5);
//! ```
//!
//! # Bounding boxes
//!
//! The scene is confined to a **Bounds3f**, usually the cube
//! `[-bound, bound]^3`. Rays are clipped against it to obtain the
//! `near` and `far` distances between which samples are placed.
//!
//! ```rust
//! use rs_ngp::core::geometry::{Bounds3f, Point3f, Ray, Vector3f};
//!
//! let aabb = Bounds3f::cube(1.0);
//! let ray = Ray::new(
//!     Point3f { x: 0.0, y: 0.0, z: 3.0 },
//!     Vector3f { x: 0.0, y: 0.0, z: -1.0 },
//! );
//! let (near, far) = aabb.near_far(&ray, 0.2).unwrap();
//! assert_eq!((near, far), (2.0, 4.0));
//! ```

// std
use std::ops;
use std::ops::Index;
// others
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
// ngp
use crate::core::ngp::{clamp_t, Float};

#[derive(EnumIter, Debug, Copy, Clone)]
#[repr(u8)]
pub enum XYZEnum {
    X = 0,
    Y = 1,
    Z = 2,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Vector3f {
    pub x: Float,
    pub y: Float,
    pub z: Float,
}

impl Vector3f {
    pub fn new(x: Float, y: Float, z: Float) -> Self {
        Vector3f { x, y, z }
    }
    pub fn has_nans(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }
    pub fn length_squared(&self) -> Float {
        self.x * self.x + self.y * self.y + self.z * self.z
    }
    pub fn length(&self) -> Float {
        self.length_squared().sqrt()
    }
    /// Compute a new vector pointing in the same direction but with unit
    /// length.
    pub fn normalize(&self) -> Vector3f {
        *self / self.length()
    }
}

impl Index<XYZEnum> for Vector3f {
    type Output = Float;
    fn index(&self, index: XYZEnum) -> &Float {
        match index {
            XYZEnum::X => &self.x,
            XYZEnum::Y => &self.y,
            _ => &self.z,
        }
    }
}

/// Product of the Euclidean magnitudes of the two vectors and the
/// cosine of the angle between them.
pub fn vec3_dot_vec3f(v1: &Vector3f, v2: &Vector3f) -> Float {
    v1.x * v2.x + v1.y * v2.y + v1.z * v2.z
}

/// Given two vectors in 3D, the cross product is a vector that is
/// perpendicular to both of them.
pub fn vec3_cross_vec3(v1: &Vector3f, v2: &Vector3f) -> Vector3f {
    let v1x: f64 = v1.x as f64;
    let v1y: f64 = v1.y as f64;
    let v1z: f64 = v1.z as f64;
    let v2x: f64 = v2.x as f64;
    let v2y: f64 = v2.y as f64;
    let v2z: f64 = v2.z as f64;
    Vector3f {
        x: ((v1y * v2z) - (v1z * v2y)) as Float,
        y: ((v1z * v2x) - (v1x * v2z)) as Float,
        z: ((v1x * v2y) - (v1y * v2x)) as Float,
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Point2f {
    pub x: Float,
    pub y: Float,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Point3f {
    pub x: Float,
    pub y: Float,
    pub z: Float,
}

impl Point3f {
    pub fn new(x: Float, y: Float, z: Float) -> Self {
        Point3f { x, y, z }
    }
    pub fn has_nans(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }
    /// Largest absolute coordinate, i.e. the Chebyshev distance to the
    /// origin.
    pub fn max_abs_component(&self) -> Float {
        self.x.abs().max(self.y.abs().max(self.z.abs()))
    }
}

impl Index<XYZEnum> for Point3f {
    type Output = Float;
    fn index(&self, index: XYZEnum) -> &Float {
        match index {
            XYZEnum::X => &self.x,
            XYZEnum::Y => &self.y,
            _ => &self.z,
        }
    }
}

impl_op_ex!(+|a: &Vector3f, b: &Vector3f| -> Vector3f {
    Vector3f {
        x: a.x + b.x,
        y: a.y + b.y,
        z: a.z + b.z,
    }
});

impl_op_ex!(-|a: &Vector3f, b: &Vector3f| -> Vector3f {
    Vector3f {
        x: a.x - b.x,
        y: a.y - b.y,
        z: a.z - b.z,
    }
});

impl_op_ex!(*|a: &Vector3f, b: Float| -> Vector3f {
    Vector3f {
        x: a.x * b,
        y: a.y * b,
        z: a.z * b,
    }
});

impl_op_ex!(/|a: &Vector3f, b: Float| -> Vector3f {
    let inv: Float = 1.0 as Float / b;
    Vector3f {
        x: a.x * inv,
        y: a.y * inv,
        z: a.z * inv,
    }
});

impl_op_ex!(-|a: &Vector3f| -> Vector3f {
    Vector3f {
        x: -a.x,
        y: -a.y,
        z: -a.z,
    }
});

impl_op_ex!(+|a: &Point3f, b: &Vector3f| -> Point3f {
    Point3f {
        x: a.x + b.x,
        y: a.y + b.y,
        z: a.z + b.z,
    }
});

impl_op_ex!(-|a: &Point3f, b: &Vector3f| -> Point3f {
    Point3f {
        x: a.x - b.x,
        y: a.y - b.y,
        z: a.z - b.z,
    }
});

impl_op_ex!(-|a: &Point3f, b: &Point3f| -> Vector3f {
    Vector3f {
        x: a.x - b.x,
        y: a.y - b.y,
        z: a.z - b.z,
    }
});

impl_op_ex!(+|a: &Point3f, b: &Point3f| -> Point3f {
    Point3f {
        x: a.x + b.x,
        y: a.y + b.y,
        z: a.z + b.z,
    }
});

impl_op_ex!(*|a: &Point3f, b: Float| -> Point3f {
    Point3f {
        x: a.x * b,
        y: a.y * b,
        z: a.z * b,
    }
});

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds3f {
    pub p_min: Point3f,
    pub p_max: Point3f,
}

impl Bounds3f {
    pub fn new(p1: Point3f, p2: Point3f) -> Self {
        let p_min: Point3f = Point3f {
            x: p1.x.min(p2.x),
            y: p1.y.min(p2.y),
            z: p1.z.min(p2.z),
        };
        let p_max: Point3f = Point3f {
            x: p1.x.max(p2.x),
            y: p1.y.max(p2.y),
            z: p1.z.max(p2.z),
        };
        Bounds3f { p_min, p_max }
    }
    /// The cube `[-bound, bound]^3`.
    pub fn cube(bound: Float) -> Self {
        Bounds3f {
            p_min: Point3f::new(-bound, -bound, -bound),
            p_max: Point3f::new(bound, bound, bound),
        }
    }
    pub fn diagonal(&self) -> Vector3f {
        self.p_max - self.p_min
    }
    pub fn is_valid(&self) -> bool {
        let d = self.diagonal();
        d.x > 0.0 && d.y > 0.0 && d.z > 0.0 && d.x.is_finite() && d.y.is_finite() && d.z.is_finite()
    }
    pub fn inside(&self, p: &Point3f) -> bool {
        p.x >= self.p_min.x
            && p.x <= self.p_max.x
            && p.y >= self.p_min.y
            && p.y <= self.p_max.y
            && p.z >= self.p_min.z
            && p.z <= self.p_max.z
    }
    /// Clamp a point into the box.
    pub fn clip(&self, p: &Point3f) -> Point3f {
        Point3f {
            x: clamp_t(p.x, self.p_min.x, self.p_max.x),
            y: clamp_t(p.y, self.p_min.y, self.p_max.y),
            z: clamp_t(p.z, self.p_min.z, self.p_max.z),
        }
    }
    /// Slab test from `t = 0` up to `ray.t_max`.
    pub fn intersect_b(&self, ray: &Ray, hitt0: &mut Float, hitt1: &mut Float) -> bool {
        let mut t0: Float = 0.0;
        let mut t1: Float = ray.t_max;
        for i in XYZEnum::iter() {
            // update interval for _i_th bounding box slab
            let inv_ray_dir: Float = 1.0 as Float / ray.d[i];
            let mut t_near: Float = (self.p_min[i] - ray.o[i]) * inv_ray_dir;
            let mut t_far: Float = (self.p_max[i] - ray.o[i]) * inv_ray_dir;
            // origin on a slab plane with a parallel direction
            if t_near.is_nan() || t_far.is_nan() {
                if ray.o[i] < self.p_min[i] || ray.o[i] > self.p_max[i] {
                    return false;
                }
                continue;
            }
            // update parametric interval from slab intersection $t$ values
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }
            t0 = if t_near > t0 { t_near } else { t0 };
            t1 = if t_far < t1 { t_far } else { t1 };
            if t0 > t1 {
                return false;
            }
        }
        *hitt0 = t0;
        *hitt1 = t1;
        true
    }
    /// Entry and exit distance of *ray*, with the entry clamped to
    /// *min_near*. `None` if the ray misses the box, has a degenerate
    /// direction, or leaves the box before *min_near*.
    pub fn near_far(&self, ray: &Ray, min_near: Float) -> Option<(Float, Float)> {
        if ray.d.has_nans() || ray.o.has_nans() || ray.d.length_squared() == 0.0 as Float {
            return None;
        }
        let mut t0: Float = 0.0;
        let mut t1: Float = 0.0;
        if !self.intersect_b(ray, &mut t0, &mut t1) {
            return None;
        }
        let near: Float = t0.max(min_near);
        if near >= t1 || !t1.is_finite() {
            None
        } else {
            Some((near, t1))
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    /// origin
    pub o: Point3f,
    /// direction
    pub d: Vector3f,
    /// limits the ray to a segment along its infinite extent
    pub t_max: Float,
}

impl Default for Ray {
    fn default() -> Self {
        Ray {
            o: Point3f::default(),
            d: Vector3f::default(),
            t_max: Float::INFINITY,
        }
    }
}

impl Ray {
    pub fn new(o: Point3f, d: Vector3f) -> Self {
        Ray {
            o,
            d,
            t_max: Float::INFINITY,
        }
    }
    pub fn position(&self, t: Float) -> Point3f {
        self.o + self.d * t
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn near_far_axis_aligned() {
        let aabb = Bounds3f::cube(1.0);
        let ray = Ray::new(Point3f::new(0.0, 0.0, 3.0), Vector3f::new(0.0, 0.0, -1.0));
        assert_eq!(aabb.near_far(&ray, 0.2), Some((2.0, 4.0)));
    }

    #[test]
    fn near_is_clamped_inside_the_box() {
        let aabb = Bounds3f::cube(1.0);
        let ray = Ray::new(Point3f::new(0.0, 0.0, 0.0), Vector3f::new(1.0, 0.0, 0.0));
        assert_eq!(aabb.near_far(&ray, 0.2), Some((0.2, 1.0)));
    }

    #[test]
    fn misses_and_degenerate_rays() {
        let aabb = Bounds3f::cube(1.0);
        let miss = Ray::new(Point3f::new(0.0, 3.0, 3.0), Vector3f::new(0.0, 0.0, -1.0));
        assert_eq!(aabb.near_far(&miss, 0.2), None);
        let zero = Ray::new(Point3f::new(0.0, 0.0, 0.0), Vector3f::default());
        assert_eq!(aabb.near_far(&zero, 0.2), None);
        let behind = Ray::new(Point3f::new(0.0, 0.0, 3.0), Vector3f::new(0.0, 0.0, 1.0));
        assert_eq!(aabb.near_far(&behind, 0.2), None);
    }

    #[test]
    fn clip_keeps_points_in_the_box() {
        let aabb = Bounds3f::cube(1.0);
        let p = aabb.clip(&Point3f::new(1.5, -2.0, 0.25));
        assert_eq!(p, Point3f::new(1.0, -1.0, 0.25));
        assert!(aabb.inside(&p));
    }
}
