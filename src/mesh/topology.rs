//! Read-only mesh capability consumed by the deformer.
//!
//! The deformation pipeline never walks half-edges itself. It only needs to
//! enumerate vertex ids, read positions, ask whether a vertex lies on the
//! boundary, and list one-rings and incident triangles. [`MeshTopology`]
//! captures exactly that, so meshes with sparse or non-contiguous vertex ids
//! can be deformed without converting them first.

use nalgebra::Point3;

use super::halfedge::HalfEdgeMesh;
use super::index::{MeshIndex, VertexId};

/// Adjacency and geometry queries over a triangle mesh, keyed by opaque
/// vertex ids.
pub trait MeshTopology {
    /// Iterate over every vertex id in the mesh.
    fn vertex_keys(&self) -> impl Iterator<Item = usize> + '_;

    /// One past the largest vertex id (zero for an empty mesh).
    ///
    /// Output buffers indexed by vertex id are sized to this bound.
    fn vertex_key_bound(&self) -> usize;

    /// Check whether `v` is a vertex of this mesh.
    fn contains_vertex(&self, v: usize) -> bool;

    /// Position of vertex `v`.
    fn vertex_position(&self, v: usize) -> Point3<f64>;

    /// Whether `v` touches a boundary edge (or has no faces at all).
    fn is_boundary(&self, v: usize) -> bool;

    /// Iterate over the distinct vertices sharing an edge with `v`.
    fn one_ring(&self, v: usize) -> impl Iterator<Item = usize> + '_;

    /// Iterate over the triangles incident to `v`, as vertex id triples in
    /// winding order.
    fn incident_triangles(&self, v: usize) -> impl Iterator<Item = [usize; 3]> + '_;
}

impl<I: MeshIndex> MeshTopology for HalfEdgeMesh<I> {
    fn vertex_keys(&self) -> impl Iterator<Item = usize> + '_ {
        0..self.num_vertices()
    }

    fn vertex_key_bound(&self) -> usize {
        self.num_vertices()
    }

    fn contains_vertex(&self, v: usize) -> bool {
        v < self.num_vertices()
    }

    fn vertex_position(&self, v: usize) -> Point3<f64> {
        *self.position(VertexId::new(v))
    }

    fn is_boundary(&self, v: usize) -> bool {
        self.is_boundary_vertex(VertexId::new(v))
    }

    fn one_ring(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.vertex_neighbors(VertexId::new(v)).map(|n| n.index())
    }

    fn incident_triangles(&self, v: usize) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.vertex_faces(VertexId::new(v))
            .map(move |f| self.face_triangle(f).map(|u| u.index()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;

    #[test]
    fn test_halfedge_topology() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.5, 0.5, 0.0),
        ];
        let faces = vec![[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]];
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.vertex_keys().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert_eq!(mesh.vertex_key_bound(), 5);
        assert!(mesh.contains_vertex(4));
        assert!(!mesh.contains_vertex(5));
        assert!(!mesh.is_boundary(4));
        assert!(mesh.is_boundary(0));

        let mut ring: Vec<usize> = mesh.one_ring(4).collect();
        ring.sort_unstable();
        assert_eq!(ring, vec![0, 1, 2, 3]);

        let triangles: Vec<[usize; 3]> = mesh.incident_triangles(4).collect();
        assert_eq!(triangles.len(), 4);
        assert!(triangles.iter().all(|t| t.contains(&4)));
    }
}
