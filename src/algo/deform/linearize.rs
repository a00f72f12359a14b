//! Interior-first linear indexing of mesh vertices.

use std::collections::HashMap;

use crate::mesh::MeshTopology;

/// Bijection between mesh vertex ids and a contiguous index space.
///
/// Indices `0..num_interior_verts()` are interior vertices and
/// `num_interior_verts()..num_verts()` are boundary vertices. Every matrix in
/// the deformation pipeline is split into interior and boundary blocks by
/// this index range alone. Within each block vertices keep ascending id order.
#[derive(Debug, Clone, Default)]
pub struct VertexLinearization {
    to_index: HashMap<usize, usize>,
    to_id: Vec<usize>,
    num_boundary: usize,
}

impl VertexLinearization {
    /// Build the linearization for a mesh.
    pub fn new<M: MeshTopology>(mesh: &M) -> Self {
        let mut linearization = Self::default();
        linearization.reset(mesh);
        linearization
    }

    /// Discard the current mapping and rebuild it from `mesh`.
    ///
    /// Must be called again whenever the mesh topology changes.
    pub fn reset<M: MeshTopology>(&mut self, mesh: &M) {
        self.to_index.clear();
        self.to_id.clear();

        let mut interior = Vec::new();
        let mut boundary = Vec::new();
        for v in mesh.vertex_keys() {
            if mesh.is_boundary(v) {
                boundary.push(v);
            } else {
                interior.push(v);
            }
        }
        interior.sort_unstable();
        boundary.sort_unstable();

        self.num_boundary = boundary.len();
        self.to_id.reserve(interior.len() + boundary.len());
        self.to_id.extend(interior);
        self.to_id.extend(boundary);

        self.to_index = self
            .to_id
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index))
            .collect();
    }

    /// Total number of vertices.
    #[inline]
    pub fn num_verts(&self) -> usize {
        self.to_id.len()
    }

    /// Number of boundary vertices.
    #[inline]
    pub fn num_boundary_verts(&self) -> usize {
        self.num_boundary
    }

    /// Number of interior vertices.
    #[inline]
    pub fn num_interior_verts(&self) -> usize {
        self.num_verts() - self.num_boundary_verts()
    }

    /// Linear index of a vertex id, if the id belongs to the mesh.
    #[inline]
    pub fn to_index(&self, id: usize) -> Option<usize> {
        self.to_index.get(&id).copied()
    }

    /// Vertex id at a linear index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= num_verts()`.
    #[inline]
    pub fn to_id(&self, index: usize) -> usize {
        self.to_id[index]
    }

    /// All vertex ids in linear index order.
    pub fn to_id_slice(&self) -> &[usize] {
        &self.to_id
    }

    /// Vertex ids of the interior block.
    pub fn interior_ids(&self) -> &[usize] {
        &self.to_id[..self.num_interior_verts()]
    }

    /// Vertex ids of the boundary block.
    pub fn boundary_ids(&self) -> &[usize] {
        &self.to_id[self.num_interior_verts()..]
    }

    /// Whether a linear index falls in the interior block.
    #[inline]
    pub fn is_interior_index(&self, index: usize) -> bool {
        index < self.num_interior_verts()
    }
}
