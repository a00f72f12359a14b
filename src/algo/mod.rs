//! Mesh processing algorithms.
//!
//! - **Deformation**: constrained biharmonic deformation with uniform,
//!   normalized, cotangent and mean value Laplacians

pub mod deform;
