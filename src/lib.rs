//! # ngp
//!
//! [Rust][rust] crate to render learned volumetric scene
//! representations (radiance fields) with a cascaded occupancy grid.
//!
//! The entry point is the [volume renderer][renderer]. It answers
//! batches of rays with color, depth and opacity, and keeps the
//! occupancy grid that lets the ray marcher skip empty space.
//!
//! There are three sampling paths:
//!
//! 1. [uniform and importance sampling][hierarchical] without a grid
//! 2. [occupancy guided marching][march] of whole rays for training
//! 3. [alive ray compaction][compaction] for inference
//!
//! [rust]: https://www.rust-lang.org
//! [renderer]: integrators/volume/struct.VolumeRenderer.html
//! [hierarchical]: samplers/hierarchical/index.html
//! [march]: samplers/march/index.html
//! [compaction]: integrators/compaction/index.html

#[macro_use]
extern crate impl_ops;
#[macro_use]
extern crate log;

pub mod accelerators;
pub mod blockqueue;
pub mod core;
pub mod fields;
pub mod integrators;
pub mod samplers;
