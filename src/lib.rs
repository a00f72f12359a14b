//! # Flexmesh
//!
//! Constrained biharmonic deformation of triangle meshes.
//!
//! Flexmesh moves the interior of a surface so that it bends as smoothly as
//! possible while a handful of vertices follow user-placed targets. The open
//! boundary stays where it is.
//!
//! ## Features
//!
//! - **Half-edge data structure**: O(1) adjacency queries with type-safe indices
//! - **Mesh-agnostic core**: any mesh implementing [`mesh::MeshTopology`] can be deformed
//! - **Six Laplacians**: uniform, umbrella, valence, cotangent, clamped cotangent, mean value
//! - **Cheap re-solves**: moving a constraint target reuses the factorization
//!
//! ## Quick Start
//!
//! ```
//! use flexmesh::prelude::*;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 0.0),
//! ];
//! let faces = vec![[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]];
//! let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! let mut deformer = ConstrainedMeshDeformer::new(&mesh, &DeformOptions::default()).unwrap();
//! deformer.add_constraint(4, 1.0, Point3::new(0.5, 0.5, 0.5), true).unwrap();
//!
//! let mut positions = Vec::new();
//! assert!(deformer.deform(&mut positions));
//!
//! // Drag the handle and re-solve without rebuilding anything.
//! deformer.update_constraint_position(4, Point3::new(0.5, 0.5, 1.0), true);
//! assert!(deformer.deform(&mut positions));
//! assert_eq!(positions[4].z, 1.0);
//! ```
//!
//! ## Logging
//!
//! Assembly, factorization and solve failures are reported through the
//! [`log`](https://docs.rs/log) facade. Install any logger to see them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use flexmesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::deform::{
        ConstrainedMeshDeformer, DeformOptions, LaplacianWeightScheme, SolverType,
    };
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_triangles, Face, FaceId, HalfEdge, HalfEdgeId, HalfEdgeMesh, MeshIndex,
        MeshTopology, Vertex, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;
