//! Building half-edge meshes from face-vertex lists.

use std::collections::HashMap;

use nalgebra::Point3;

use super::halfedge::{Face, HalfEdge, HalfEdgeMesh};
use super::index::{FaceId, HalfEdgeId, MeshIndex, VertexId};
use crate::error::{MeshError, Result};

/// Build a half-edge mesh from vertices and triangle faces.
///
/// Faces must be consistently oriented. Vertices that no face references are
/// kept as isolated vertices.
///
/// # Errors
///
/// Returns an error if there are no faces, a face references a missing
/// vertex, a face repeats a vertex, a directed edge appears twice
/// (non-manifold or inconsistently oriented input), or separate face fans
/// touch at a single vertex.
///
/// # Example
///
/// ```
/// use flexmesh::mesh::{build_from_triangles, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_faces(), 1);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh<I>> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    for (fi, face) in faces.iter().enumerate() {
        if let Some(&vertex) = face.iter().find(|&&vi| vi >= vertices.len()) {
            return Err(MeshError::InvalidVertexIndex { face: fi, vertex });
        }
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            return Err(MeshError::DegenerateFace { face: fi });
        }
    }

    let mut mesh = HalfEdgeMesh::with_capacity(vertices.len(), faces.len());
    for &pos in vertices {
        mesh.add_vertex(pos);
    }

    // Directed edge (from, to) -> interior half-edge
    let mut edge_map: HashMap<(usize, usize), HalfEdgeId<I>> =
        HashMap::with_capacity(faces.len() * 3);

    for face in faces {
        let face_id = FaceId::<I>::new(mesh.faces.len());
        let base = mesh.halfedges.len();
        let ids = [0, 1, 2].map(|k| HalfEdgeId::<I>::new(base + k));

        mesh.faces.push(Face { halfedge: ids[0] });

        for k in 0..3 {
            let from = face[k];
            let to = face[(k + 1) % 3];
            if edge_map.insert((from, to), ids[k]).is_some() {
                return Err(MeshError::NonManifoldEdge { v0: from, v1: to });
            }

            mesh.halfedges.push(HalfEdge {
                origin: VertexId::new(from),
                twin: HalfEdgeId::invalid(),
                next: ids[(k + 1) % 3],
                prev: ids[(k + 2) % 3],
                face: face_id,
            });
            mesh.vertices[from].halfedge = ids[k];
        }
    }

    // Pair twins, creating boundary half-edges for unmatched edges. Sorting
    // keeps half-edge numbering independent of hash order.
    let mut directed: Vec<((usize, usize), HalfEdgeId<I>)> =
        edge_map.iter().map(|(&e, &he)| (e, he)).collect();
    directed.sort_unstable_by_key(|&(e, _)| e);

    for ((from, to), he) in directed {
        if let Some(&twin) = edge_map.get(&(to, from)) {
            mesh.halfedge_mut(he).twin = twin;
        } else {
            let boundary = HalfEdgeId::<I>::new(mesh.halfedges.len());
            mesh.halfedges.push(HalfEdge {
                origin: VertexId::new(to),
                twin: he,
                ..HalfEdge::default()
            });
            mesh.halfedge_mut(he).twin = boundary;
        }
    }

    link_boundary_loops(&mut mesh)?;
    anchor_boundary_vertices(&mut mesh);
    check_single_fans(&mesh, faces)?;

    Ok(mesh)
}

/// Chain boundary half-edges into loops via `next`/`prev`.
///
/// A vertex with two outgoing boundary half-edges sits where two fans touch;
/// its one-ring walk could not cover both, so it is rejected.
fn link_boundary_loops<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) -> Result<()> {
    let boundary: Vec<HalfEdgeId<I>> = (0..mesh.num_halfedges())
        .map(HalfEdgeId::new)
        .filter(|&he| mesh.is_boundary_halfedge(he))
        .collect();

    let mut outgoing: HashMap<usize, HalfEdgeId<I>> = HashMap::with_capacity(boundary.len());
    for &he in &boundary {
        let origin = mesh.origin(he).index();
        if outgoing.insert(origin, he).is_some() {
            return Err(MeshError::NonManifoldVertex { vertex: origin });
        }
    }

    for he in boundary {
        if let Some(&next) = outgoing.get(&mesh.dest(he).index()) {
            mesh.halfedge_mut(he).next = next;
            mesh.halfedge_mut(next).prev = he;
        }
    }
    Ok(())
}

/// Every face around a vertex must be reachable from its anchor half-edge.
/// Closed fans touching at a vertex have no boundary to give them away.
fn check_single_fans<I: MeshIndex>(mesh: &HalfEdgeMesh<I>, faces: &[[usize; 3]]) -> Result<()> {
    let mut corners = vec![0usize; mesh.num_vertices()];
    for face in faces {
        for &v in face {
            corners[v] += 1;
        }
    }

    match mesh
        .vertex_ids()
        .find(|&v| mesh.vertex_faces(v).count() != corners[v.index()])
    {
        Some(v) => Err(MeshError::NonManifoldVertex { vertex: v.index() }),
        None => Ok(()),
    }
}

/// Point every boundary vertex at its outgoing boundary half-edge.
fn anchor_boundary_vertices<I: MeshIndex>(mesh: &mut HalfEdgeMesh<I>) {
    for he in 0..mesh.num_halfedges() {
        let he = HalfEdgeId::<I>::new(he);
        if mesh.is_boundary_halfedge(he) {
            let origin = mesh.origin(he).index();
            mesh.vertices[origin].halfedge = he;
        }
    }
}
