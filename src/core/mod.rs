//! Types and functions everything else builds on.
//!
//! - Numbers, geometry and colors: [ngp], [geometry], [spectrum]
//! - Random numbers and sampling: [rng], [sampling], [morton]
//! - Spherical harmonics: [sh]
//! - Cameras: [camera]
//! - What the renderer consumes: [field]
//! - Compositing: [integrator]
//! - Errors: [error]
//! - Scene descriptions: [paramset], [parser], [api]

pub mod api;
pub mod camera;
pub mod error;
pub mod field;
pub mod geometry;
pub mod integrator;
pub mod morton;
pub mod ngp;
pub mod paramset;
pub mod parser;
pub mod rng;
pub mod sampling;
pub mod sh;
pub mod spectrum;
