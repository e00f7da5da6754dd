//! Acceleration structures let the ray marcher skip empty space.
//! Without them every ray would need samples spread over its whole
//! extent through the scene box, most of them wasted on empty space.
//!
//! - OccupancyGrid

pub mod occupancy;
