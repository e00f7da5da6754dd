//! Where along a ray the field gets queried.
//!
//! ## Hierarchical Sampler
//!
//! Equally spaced (optionally jittered) samples between the ray's
//! entry and exit points of the scene box, followed by importance
//! samples drawn by inverting the CDF of the weights the first pass
//! produced.
//!
//! ## Occupancy Guided Marching
//!
//! Samples are only placed in voxels the occupancy grid marks as
//! occupied; the step size grows with the distance travelled.

pub mod hierarchical;
pub mod march;
