//! Constrained biharmonic mesh deformation.
//!
//! Interior vertices are moved to minimize the squared Laplacian of their
//! displacement, `|L(x - x₀)|²`, while boundary vertices stay fixed and
//! constrained vertices are pulled toward (soft) or pinned to (post-fix)
//! target positions.
//!
//! The pipeline, leaves first:
//!
//! - [`VertexLinearization`]: vertex ids to contiguous indices, interior first
//! - [`construct_laplacian`]: interior and boundary Laplacian blocks for a
//!   [`LaplacianWeightScheme`]
//! - [`ConstrainedMeshDeformationSolver`]: `B = Lᵀ·L`, the constraint table
//!   and the lazily refactored system
//! - [`ConstrainedMeshDeformer`]: the driver most callers want
//!
//! # Example
//!
//! ```
//! use flexmesh::algo::deform::{ConstrainedMeshDeformer, DeformOptions};
//! use flexmesh::prelude::*;
//! use nalgebra::Point3;
//!
//! // 3x3 grid with one interior vertex in the middle.
//! let mut vertices = Vec::new();
//! for j in 0..3 {
//!     for i in 0..3 {
//!         vertices.push(Point3::new(i as f64, j as f64, 0.0));
//!     }
//! }
//! let faces = vec![
//!     [0, 1, 4], [0, 4, 3], [1, 2, 5], [1, 5, 4],
//!     [3, 4, 7], [3, 7, 6], [4, 5, 8], [4, 8, 7],
//! ];
//! let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! let mut deformer = ConstrainedMeshDeformer::new(&mesh, &DeformOptions::default()).unwrap();
//! deformer.add_constraint(4, 10.0, Point3::new(1.0, 1.0, 1.0), false).unwrap();
//!
//! let mut positions = Vec::new();
//! assert!(deformer.deform(&mut positions));
//! assert!(positions[4].z > 0.0 && positions[4].z < 1.0);
//! assert_eq!(positions[0], vertices[0]);
//! ```

mod deformer;
mod laplacian;
mod linearize;
mod solver;
mod sparse;

pub use deformer::{ConstrainedMeshDeformer, DeformOptions};
pub use laplacian::{
    construct_cotangent_laplacian, construct_laplacian, construct_scaled_cotangent_laplacian,
    Laplacian, LaplacianWeightScheme, MAX_AREA_SCALE, MIN_AREA_SCALE,
};
pub use linearize::VertexLinearization;
pub use solver::{
    ConstrainedMeshDeformationSolver, Constraint, SolverType, DEFAULT_CG_TOLERANCE,
    DEFAULT_MAX_CG_ITERATIONS,
};
