//! Half-edge triangle mesh.
//!
//! Each edge is stored as two opposed half-edges. A half-edge records its
//! origin, its twin, its successor and predecessor around the face, and the
//! face itself. Boundary half-edges have no face and are chained into
//! boundary loops through `next`/`prev`, so the one-ring walk
//! `next(twin(he))` closes around boundary vertices as well.

use nalgebra::Point3;

use super::index::{FaceId, HalfEdgeId, MeshIndex, VertexId};

/// Vertex record.
#[derive(Debug, Clone)]
pub struct Vertex<I: MeshIndex = u32> {
    /// Position in space.
    pub position: Point3<f64>,

    /// One outgoing half-edge, or null for isolated vertices. Boundary
    /// vertices point at a boundary half-edge so a one-ring walk starting
    /// here covers every face.
    pub halfedge: HalfEdgeId<I>,
}

/// Half-edge record.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge<I: MeshIndex = u32> {
    /// Vertex the half-edge leaves.
    pub origin: VertexId<I>,
    /// Opposed half-edge.
    pub twin: HalfEdgeId<I>,
    /// Successor around the face or boundary loop.
    pub next: HalfEdgeId<I>,
    /// Predecessor around the face or boundary loop.
    pub prev: HalfEdgeId<I>,
    /// Owning face, null on the boundary.
    pub face: FaceId<I>,
}

impl<I: MeshIndex> Default for HalfEdge<I> {
    fn default() -> Self {
        Self {
            origin: VertexId::invalid(),
            twin: HalfEdgeId::invalid(),
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
            face: FaceId::invalid(),
        }
    }
}

/// Triangle record.
#[derive(Debug, Clone, Copy)]
pub struct Face<I: MeshIndex = u32> {
    /// First of the three half-edges around the face.
    pub halfedge: HalfEdgeId<I>,
}

/// A half-edge triangle mesh with `I`-sized handles.
///
/// Build one with [`build_from_triangles`](super::build_from_triangles).
#[derive(Debug, Clone)]
pub struct HalfEdgeMesh<I: MeshIndex = u32> {
    pub(crate) vertices: Vec<Vertex<I>>,
    pub(crate) halfedges: Vec<HalfEdge<I>>,
    pub(crate) faces: Vec<Face<I>>,
}

impl<I: MeshIndex> Default for HalfEdgeMesh<I> {
    fn default() -> Self {
        Self::with_capacity(0, 0)
    }
}

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// An empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(num_vertices),
            // Interior edges share two half-edges, boundary edges add one more.
            halfedges: Vec::with_capacity(num_faces * 3 + num_faces / 2),
            faces: Vec::with_capacity(num_faces),
        }
    }

    /// Vertex count, isolated vertices included.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Half-edge count, boundary half-edges included.
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Triangle count.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    pub(crate) fn halfedge(&self, he: HalfEdgeId<I>) -> &HalfEdge<I> {
        &self.halfedges[he.index()]
    }

    #[inline]
    pub(crate) fn halfedge_mut(&mut self, he: HalfEdgeId<I>) -> &mut HalfEdge<I> {
        &mut self.halfedges[he.index()]
    }

    /// Position of `v`.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.vertices[v.index()].position
    }

    /// Move `v`, e.g. to write back a deformation result.
    #[inline]
    pub fn set_position(&mut self, v: VertexId<I>, position: Point3<f64>) {
        self.vertices[v.index()].position = position;
    }

    /// Opposed half-edge.
    #[inline]
    pub fn twin(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).twin
    }

    /// Successor of `he` around its face or boundary loop.
    #[inline]
    pub fn next(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).next
    }

    /// Vertex `he` leaves.
    #[inline]
    pub fn origin(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.halfedge(he).origin
    }

    /// Vertex `he` points to.
    #[inline]
    pub fn dest(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.origin(self.twin(he))
    }

    /// Face of `he`, null on the boundary.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId<I>) -> FaceId<I> {
        self.halfedge(he).face
    }

    /// Whether `he` has no face.
    #[inline]
    pub fn is_boundary_halfedge(&self, he: HalfEdgeId<I>) -> bool {
        !self.face_of(he).is_valid()
    }

    /// Whether `v` touches a boundary edge.
    ///
    /// Isolated vertices count as boundary, so they are never treated as
    /// unknowns by the deformer.
    pub fn is_boundary_vertex(&self, v: VertexId<I>) -> bool {
        let start = self.vertices[v.index()].halfedge;
        !start.is_valid() || self.vertex_halfedges(v).any(|he| self.is_boundary_halfedge(he))
    }

    /// All vertex handles in storage order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        (0..self.vertices.len()).map(VertexId::new)
    }

    /// All face handles in storage order.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        (0..self.faces.len()).map(FaceId::new)
    }

    /// Outgoing half-edges of `v`, one per neighbor.
    pub fn vertex_halfedges(&self, v: VertexId<I>) -> VertexHalfEdgeIter<'_, I> {
        let start = self.vertices[v.index()].halfedge;
        VertexHalfEdgeIter {
            mesh: self,
            start,
            current: start,
            done: !start.is_valid(),
        }
    }

    /// Vertices sharing an edge with `v`.
    pub fn vertex_neighbors(&self, v: VertexId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertex_halfedges(v).map(move |he| self.dest(he))
    }

    /// Triangles incident to `v`.
    pub fn vertex_faces(&self, v: VertexId<I>) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.vertex_halfedges(v)
            .map(move |he| self.face_of(he))
            .filter(|f| f.is_valid())
    }

    /// Corners of `f` in winding order.
    pub fn face_triangle(&self, f: FaceId<I>) -> [VertexId<I>; 3] {
        let first = self.faces[f.index()].halfedge;
        let second = self.next(first);
        [first, second, self.next(second)].map(|he| self.origin(he))
    }

    /// Corner positions of `f` in winding order.
    pub fn face_positions(&self, f: FaceId<I>) -> [Point3<f64>; 3] {
        self.face_triangle(f).map(|v| *self.position(v))
    }

    /// Area of `f`.
    pub fn face_area(&self, f: FaceId<I>) -> f64 {
        let [a, b, c] = self.face_positions(f);
        0.5 * (b - a).cross(&(c - a)).norm()
    }

    /// Number of edges at `v`.
    pub fn valence(&self, v: VertexId<I>) -> usize {
        self.vertex_halfedges(v).count()
    }

    pub(crate) fn add_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        self.vertices.push(Vertex {
            position,
            halfedge: HalfEdgeId::invalid(),
        });
        VertexId::new(self.vertices.len() - 1)
    }

    /// Check twin, next/prev and vertex anchor consistency.
    pub fn is_valid(&self) -> bool {
        let anchors_ok = self.vertex_ids().all(|v| {
            let he = self.vertices[v.index()].halfedge;
            !he.is_valid() || self.origin(he) == v
        });

        let links_ok = self.halfedges.iter().enumerate().all(|(i, he)| {
            let id = HalfEdgeId::new(i);
            he.twin.is_valid()
                && self.twin(he.twin) == id
                && (!he.next.is_valid() || self.halfedge(he.next).prev == id)
        });

        anchors_ok && links_ok && self.faces.iter().all(|f| f.halfedge.is_valid())
    }
}

/// Walks the outgoing half-edges of one vertex.
pub struct VertexHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    done: bool,
}

impl<I: MeshIndex> Iterator for VertexHalfEdgeIter<'_, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<HalfEdgeId<I>> {
        if self.done {
            return None;
        }

        let out = self.current;
        // he: v -> w, twin(he): w -> v, next(twin(he)) leaves v again.
        self.current = self.mesh.next(self.mesh.twin(out));
        self.done = self.current == self.start || !self.current.is_valid();

        Some(out)
    }
}
