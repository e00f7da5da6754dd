//! Analytic and tabulated radiance fields plus background models. They
//! stand in for a learned model when rendering scene files and in
//! tests.
//!
//! - [`homogeneous::HomogeneousSphere`]
//! - [`grid::GridDensityField`]
//! - [`background::ConstantBackground`]
//! - [`background::SkyBackground`]

pub mod background;
pub mod grid;
pub mod homogeneous;
