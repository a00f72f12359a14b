//! Core mesh data structures.
//!
//! [`HalfEdgeMesh`] is a half-edge triangle mesh with O(1) adjacency queries.
//! The deformer does not depend on it directly: it consumes any mesh through
//! the [`MeshTopology`] trait, which `HalfEdgeMesh` implements.
//!
//! ```
//! use flexmesh::mesh::{build_from_triangles, HalfEdgeMesh, MeshTopology};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
//!
//! assert!(mesh.is_boundary(0));
//! assert_eq!(mesh.one_ring(0).count(), 2);
//! ```

mod builder;
mod halfedge;
mod index;
mod topology;

pub use builder::build_from_triangles;
pub use halfedge::{Face, HalfEdge, HalfEdgeMesh, Vertex, VertexHalfEdgeIter};
pub use index::{FaceId, HalfEdgeId, MeshIndex, VertexId};
pub use topology::MeshTopology;
