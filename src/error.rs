//! Error types for flexmesh.
//!
//! Mesh construction and deformer setup report failures through [`MeshError`].
//! Per-solve numerical failures are not errors: [`deform`] reports them with a
//! boolean so the caller can adjust constraints and retry.
//!
//! [`deform`]: crate::algo::deform::ConstrainedMeshDeformer::deform

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while building meshes or deformers.
#[derive(Error, Debug, Clone)]
pub enum MeshError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices (degenerate triangle).
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A directed edge is used by more than one face.
    #[error("edge ({v0}, {v1}) is shared by more than two faces or has inconsistent orientation")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// Several face fans meet at a vertex without sharing an edge.
    #[error("vertex {vertex} joins face fans that share no edge (non-manifold vertex)")]
    NonManifoldVertex {
        /// The vertex index.
        vertex: usize,
    },

    /// An interior vertex has a zero (or negative) area neighborhood, so the
    /// area-scaled cotangent operator is undefined there.
    #[error("vertex {vertex} has degenerate one-ring area {area}")]
    DegenerateVertexArea {
        /// The mesh vertex id.
        vertex: usize,
        /// The offending area.
        area: f64,
    },

    /// A vertex id that is not part of the mesh.
    #[error("vertex {vertex} is not part of the mesh")]
    UnknownVertex {
        /// The mesh vertex id.
        vertex: usize,
    },

    /// Constraints can only be placed on interior vertices.
    #[error("vertex {vertex} lies on the boundary and cannot be constrained")]
    BoundaryVertex {
        /// The mesh vertex id.
        vertex: usize,
    },

    /// Algorithm failed to converge.
    #[error("algorithm failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// The constrained system could not be factored.
    #[error("factorization failed: {0}")]
    FactorizationFailed(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}
