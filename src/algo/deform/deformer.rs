//! The public deformation driver.

use nalgebra::{DMatrix, Point3};

use crate::error::{MeshError, Result};
use crate::mesh::MeshTopology;

use super::laplacian::{construct_laplacian, LaplacianWeightScheme};
use super::linearize::VertexLinearization;
use super::solver::{
    ConstrainedMeshDeformationSolver, Constraint, SolverType, DEFAULT_CG_TOLERANCE,
    DEFAULT_MAX_CG_ITERATIONS,
};
use super::sparse::mul_columns;

/// Options for [`ConstrainedMeshDeformer`].
#[derive(Debug, Clone)]
pub struct DeformOptions {
    /// Edge weighting of the Laplacian.
    pub scheme: LaplacianWeightScheme,

    /// Linear solver family.
    pub solver: SolverType,

    /// Iteration cap for [`SolverType::ConjugateGradient`].
    pub max_cg_iterations: usize,

    /// Relative residual tolerance for [`SolverType::ConjugateGradient`].
    pub cg_tolerance: f64,
}

impl Default for DeformOptions {
    fn default() -> Self {
        Self {
            scheme: LaplacianWeightScheme::default(),
            solver: SolverType::default(),
            max_cg_iterations: DEFAULT_MAX_CG_ITERATIONS,
            cg_tolerance: DEFAULT_CG_TOLERANCE,
        }
    }
}

impl DeformOptions {
    /// Create options with the specified weighting scheme.
    pub fn with_scheme(mut self, scheme: LaplacianWeightScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Create options with the specified solver family.
    pub fn with_solver(mut self, solver: SolverType) -> Self {
        self.solver = solver;
        self
    }

    /// Create options with the specified conjugate gradient iteration cap.
    pub fn with_cg_iterations(mut self, max_iterations: usize) -> Self {
        self.max_cg_iterations = max_iterations;
        self
    }

    /// Create options with the specified conjugate gradient tolerance.
    pub fn with_cg_tolerance(mut self, tolerance: f64) -> Self {
        self.cg_tolerance = tolerance;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.cg_tolerance > 0.0 && self.cg_tolerance.is_finite()) {
            return Err(MeshError::invalid_param(
                "cg_tolerance",
                self.cg_tolerance,
                "must be positive and finite",
            ));
        }
        Ok(())
    }
}

/// Biharmonic deformer for one mesh.
///
/// Construction does all mesh-sized work: it linearizes the vertices, builds
/// the Laplacian, and precomputes `B·x₀` for the rest pose. Each
/// [`deform`](Self::deform) call then only updates constraints and solves.
/// Boundary vertices never move. Constraints may only be placed on interior
/// vertices.
///
/// The deformer copies what it needs from the mesh, so the mesh may be
/// dropped or edited afterwards; topology edits require a new deformer.
///
/// # Example
///
/// ```
/// use flexmesh::algo::deform::{ConstrainedMeshDeformer, DeformOptions, LaplacianWeightScheme};
/// use flexmesh::prelude::*;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.5, 0.5, 0.0),
/// ];
/// let faces = vec![[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]];
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
///
/// let options = DeformOptions::default().with_scheme(LaplacianWeightScheme::Uniform);
/// let mut deformer = ConstrainedMeshDeformer::new(&mesh, &options).unwrap();
/// deformer
///     .add_constraint(4, 1.0, Point3::new(0.5, 0.5, 0.25), true)
///     .unwrap();
///
/// let mut positions = Vec::new();
/// assert!(deformer.deform(&mut positions));
/// assert_eq!(positions[4], Point3::new(0.5, 0.5, 0.25));
/// assert_eq!(positions[0], vertices[0]);
/// ```
#[derive(Debug)]
pub struct ConstrainedMeshDeformer {
    linearization: VertexLinearization,
    solver: ConstrainedMeshDeformationSolver,
    original_interior: DMatrix<f64>,
    laplacian_vectors: DMatrix<f64>,
    boundary_positions: Vec<Point3<f64>>,
    vertex_key_bound: usize,
    average_area: Option<f64>,
}

impl ConstrainedMeshDeformer {
    /// Build a deformer for `mesh`.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::DegenerateVertexArea`] when a cotangent scheme
    /// meets an interior vertex with no area, and
    /// [`MeshError::InvalidParameter`] for invalid options.
    pub fn new<M: MeshTopology>(mesh: &M, options: &DeformOptions) -> Result<Self> {
        options.validate()?;

        let linearization = VertexLinearization::new(mesh);
        let laplacian = construct_laplacian(options.scheme, mesh, &linearization)?;

        let solver = ConstrainedMeshDeformationSolver::new(laplacian.interior, options.solver)
            .with_cg_limits(options.max_cg_iterations, options.cg_tolerance);

        let interior = linearization.interior_ids();
        let original_interior = DMatrix::from_fn(interior.len(), 3, |row, axis| {
            mesh.vertex_position(interior[row])[axis]
        });
        let laplacian_vectors = mul_columns(solver.biharmonic(), &original_interior);

        let boundary_positions = linearization
            .boundary_ids()
            .iter()
            .map(|&v| mesh.vertex_position(v))
            .collect();

        log::debug!(
            "deformer ready: {} interior, {} boundary vertices, {:?}/{:?}",
            linearization.num_interior_verts(),
            linearization.num_boundary_verts(),
            options.scheme,
            options.solver
        );

        Ok(Self {
            linearization,
            solver,
            original_interior,
            laplacian_vectors,
            boundary_positions,
            vertex_key_bound: mesh.vertex_key_bound(),
            average_area: laplacian.average_area,
        })
    }

    /// Solve for the current constraints and write every vertex position
    /// into `positions`, indexed by vertex id.
    ///
    /// The buffer is resized to one past the largest vertex id; slots of ids
    /// that are not mesh vertices keep their previous contents. Interior
    /// vertices receive the solution (with post-fix targets applied) and
    /// boundary vertices their original positions. The buffer is written
    /// even when the solve fails, in which case this returns `false` and
    /// [`ConstrainedMeshDeformationSolver::last_failure`] holds the reason.
    pub fn deform(&mut self, positions: &mut Vec<Point3<f64>>) -> bool {
        self.solver.update_solver_constraints();

        let mut solution = DMatrix::zeros(0, 3);
        let solved = self.solver.solve_with_guess(
            &self.original_interior,
            &self.laplacian_vectors,
            &mut solution,
        );
        self.solver.update_with_post_fix_constraints(&mut solution);

        positions.resize(self.vertex_key_bound, Point3::origin());

        for (row, &v) in self.linearization.interior_ids().iter().enumerate() {
            positions[v] = Point3::new(
                solution[(row, 0)],
                solution[(row, 1)],
                solution[(row, 2)],
            );
        }
        for (&v, &p) in self
            .linearization
            .boundary_ids()
            .iter()
            .zip(&self.boundary_positions)
        {
            positions[v] = p;
        }

        solved
    }

    /// Constrain interior vertex `vertex`, replacing any existing constraint.
    ///
    /// With `post_fix` the vertex lands exactly on `target` after the solve
    /// and its weight is ignored. Otherwise a positive weight pulls the vertex
    /// and its neighborhood toward `target`.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::UnknownVertex`] or [`MeshError::BoundaryVertex`]
    /// for ids that cannot be constrained, and
    /// [`MeshError::InvalidParameter`] for a negative or non-finite weight.
    pub fn add_constraint(
        &mut self,
        vertex: usize,
        weight: f64,
        target: Point3<f64>,
        post_fix: bool,
    ) -> Result<()> {
        let index = self.interior_index(vertex)?;
        self.solver.add_constraint(index, weight, target, post_fix)
    }

    /// Move the constraint on `vertex`.
    ///
    /// Returns `false` for unknown or boundary ids and for vertices without a
    /// constraint; nothing is created in that case.
    pub fn update_constraint_position(
        &mut self,
        vertex: usize,
        target: Point3<f64>,
        post_fix: bool,
    ) -> bool {
        match self.interior_index(vertex) {
            Ok(index) => self.solver.update_constraint_position(index, target, post_fix),
            Err(_) => false,
        }
    }

    /// Change the weight of the constraint on `vertex`.
    ///
    /// Returns `Ok(false)` for vertices without a constraint.
    ///
    /// # Errors
    ///
    /// Same as [`add_constraint`](Self::add_constraint).
    pub fn update_constraint_weight(&mut self, vertex: usize, weight: f64) -> Result<bool> {
        let index = self.interior_index(vertex)?;
        self.solver.update_constraint_weight(index, weight)
    }

    /// Remove the constraint on `vertex`, returning it.
    pub fn remove_constraint(&mut self, vertex: usize) -> Option<Constraint> {
        let index = self.interior_index(vertex).ok()?;
        self.solver.remove_constraint(index)
    }

    /// Remove every constraint.
    pub fn clear_constraints(&mut self) {
        self.solver.clear_constraints();
    }

    /// Whether `vertex` has a constraint.
    pub fn is_constrained(&self, vertex: usize) -> bool {
        self.interior_index(vertex)
            .map(|index| self.solver.is_constrained(index))
            .unwrap_or(false)
    }

    /// The underlying solver.
    pub fn solver(&self) -> &ConstrainedMeshDeformationSolver {
        &self.solver
    }

    /// The vertex linearization.
    pub fn linearization(&self) -> &VertexLinearization {
        &self.linearization
    }

    /// Rest positions of the interior vertices, one row per interior index.
    pub fn original_interior_positions(&self) -> &DMatrix<f64> {
        &self.original_interior
    }

    /// `B·x₀`, one row per interior index.
    pub fn laplacian_vectors(&self) -> &DMatrix<f64> {
        &self.laplacian_vectors
    }

    /// Mean interior vertex area, for the area-scaled cotangent schemes.
    pub fn average_area(&self) -> Option<f64> {
        self.average_area
    }

    fn interior_index(&self, vertex: usize) -> Result<usize> {
        match self.linearization.to_index(vertex) {
            None => Err(MeshError::UnknownVertex { vertex }),
            Some(index) if !self.linearization.is_interior_index(index) => {
                Err(MeshError::BoundaryVertex { vertex })
            }
            Some(index) => Ok(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_from_triangles, HalfEdgeMesh, VertexId};
    use std::collections::{BTreeMap, BTreeSet};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn square_fan_vertices() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.5, 0.5, 0.0),
        ]
    }

    const SQUARE_FAN_FACES: [[usize; 3]; 4] = [[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]];

    fn create_square_fan() -> HalfEdgeMesh {
        build_from_triangles(&square_fan_vertices(), &SQUARE_FAN_FACES).unwrap()
    }

    /// `n × n` grid with a deterministic height field.
    fn create_bumpy_grid(n: usize) -> HalfEdgeMesh {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();

        for j in 0..=n {
            for i in 0..=n {
                let z = 0.3 * ((i as f64 * 1.3).sin() * (j as f64 * 0.7).cos());
                vertices.push(Point3::new(i as f64, j as f64, z));
            }
        }

        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v10 = v00 + 1;
                let v01 = v00 + (n + 1);
                let v11 = v01 + 1;

                faces.push([v00, v10, v11]);
                faces.push([v00, v11, v01]);
            }
        }

        build_from_triangles(&vertices, &faces).unwrap()
    }

    fn uniform() -> DeformOptions {
        DeformOptions::default().with_scheme(LaplacianWeightScheme::Uniform)
    }

    fn all_options() -> Vec<DeformOptions> {
        let mut options = Vec::new();
        for scheme in LaplacianWeightScheme::ALL {
            for solver in [SolverType::Cholesky, SolverType::ConjugateGradient] {
                options.push(DeformOptions::default().with_scheme(scheme).with_solver(solver));
            }
        }
        options
    }

    #[test]
    fn test_no_constraints_is_identity() {
        init();
        let mesh = create_bumpy_grid(5);

        for options in all_options() {
            let mut deformer = ConstrainedMeshDeformer::new(&mesh, &options).unwrap();
            let mut positions = Vec::new();
            assert!(deformer.deform(&mut positions), "{:?}", options);

            assert_eq!(positions.len(), mesh.num_vertices());
            for v in mesh.vertex_ids() {
                let d = (positions[v.index()] - *mesh.position(v)).norm();
                assert!(d < 1e-6, "{:?}: vertex {} moved by {}", options, v.index(), d);
            }
        }
    }

    #[test]
    fn test_boundary_and_post_fix_are_exact() {
        init();
        let mesh = create_bumpy_grid(5);
        let target = Point3::new(2.5, 2.5, 3.0);

        for options in all_options() {
            let mut deformer = ConstrainedMeshDeformer::new(&mesh, &options).unwrap();
            // Vertex (2, 2) is interior.
            deformer.add_constraint(14, 0.0, target, true).unwrap();
            deformer
                .add_constraint(15, 5.0, Point3::new(3.0, 2.0, 1.0), false)
                .unwrap();

            let mut positions = Vec::new();
            assert!(deformer.deform(&mut positions), "{:?}", options);

            assert_eq!(positions[14], target);
            for &v in deformer.linearization().boundary_ids() {
                assert_eq!(positions[v], *mesh.position(VertexId::new(v)));
            }
            // The soft constraint pulls its vertex upward.
            assert!(positions[15].z > mesh.position(VertexId::new(15)).z);
        }
    }

    #[test]
    fn test_deform_is_idempotent() {
        let mesh = create_bumpy_grid(4);
        let mut deformer = ConstrainedMeshDeformer::new(&mesh, &DeformOptions::default()).unwrap();
        deformer
            .add_constraint(6, 2.0, Point3::new(1.0, 1.0, 2.0), false)
            .unwrap();

        let mut first = Vec::new();
        let mut second = Vec::new();
        assert!(deformer.deform(&mut first));
        assert!(deformer.deform(&mut second));

        assert_eq!(first, second);
        assert_eq!(deformer.solver().factorization_count(), 1);
    }

    #[test]
    fn test_square_stays_at_centroid() {
        let mesh = create_square_fan();
        let mut deformer = ConstrainedMeshDeformer::new(&mesh, &uniform()).unwrap();

        let mut positions = Vec::new();
        assert!(deformer.deform(&mut positions));

        // Mean of the one-ring.
        assert!((positions[4] - Point3::new(0.5, 0.5, 0.0)).norm() < 1e-12);
        assert_eq!(&positions[..4], &square_fan_vertices()[..4]);
    }

    #[test]
    fn test_square_post_fix_pin() {
        let mesh = create_square_fan();
        let mut deformer = ConstrainedMeshDeformer::new(&mesh, &uniform()).unwrap();
        let target = Point3::new(0.2, 0.9, -1.7);
        deformer.add_constraint(4, 0.0, target, true).unwrap();

        let mut positions = Vec::new();
        assert!(deformer.deform(&mut positions));

        assert_eq!(positions[4], target);
        assert_eq!(&positions[..4], &square_fan_vertices()[..4]);
    }

    #[test]
    fn test_square_soft_constraint_closed_form() {
        // L_int = [4], B = [16]: x = (16 x0 + w² t) / (16 + w²)
        let mesh = create_square_fan();
        let mut deformer = ConstrainedMeshDeformer::new(&mesh, &uniform()).unwrap();
        deformer
            .add_constraint(4, 2.0, Point3::new(1.0, 1.0, 1.0), false)
            .unwrap();

        let mut positions = Vec::new();
        assert!(deformer.deform(&mut positions));
        assert!((positions[4] - Point3::new(0.6, 0.6, 0.2)).norm() < 1e-12);

        // Moving the target reuses the factorization.
        assert!(deformer.update_constraint_position(4, Point3::new(1.0, 1.0, 2.0), false));
        assert!(deformer.deform(&mut positions));
        assert!((positions[4] - Point3::new(0.6, 0.6, 0.4)).norm() < 1e-12);
        assert_eq!(deformer.solver().factorization_count(), 1);
    }

    #[test]
    fn test_reweight_refactors_but_keeps_operator() {
        let mesh = create_square_fan();
        let mut deformer = ConstrainedMeshDeformer::new(&mesh, &uniform()).unwrap();
        let biharmonic: *const _ = deformer.solver().biharmonic();

        deformer
            .add_constraint(4, 0.0, Point3::new(0.5, 0.5, 1.0), false)
            .unwrap();
        let mut positions = Vec::new();
        assert!(deformer.deform(&mut positions));
        assert_eq!(deformer.solver().factorization_count(), 1);
        assert_eq!(positions[4].z, 0.0);

        assert!(deformer.update_constraint_weight(4, 4.0).unwrap());
        assert!(deformer.solver().needs_factorization());
        assert!(deformer.deform(&mut positions));
        assert_eq!(deformer.solver().factorization_count(), 2);
        assert!(positions[4].z > 0.0);

        assert!(std::ptr::eq(biharmonic, deformer.solver().biharmonic()));
    }

    #[test]
    fn test_constraint_pass_throughs() {
        let mesh = create_square_fan();
        let mut deformer = ConstrainedMeshDeformer::new(&mesh, &uniform()).unwrap();
        let p = Point3::new(1.0, 2.0, 3.0);

        assert!(matches!(
            deformer.add_constraint(0, 1.0, p, false),
            Err(MeshError::BoundaryVertex { vertex: 0 })
        ));
        assert!(matches!(
            deformer.add_constraint(99, 1.0, p, false),
            Err(MeshError::UnknownVertex { vertex: 99 })
        ));
        assert!(matches!(
            deformer.add_constraint(4, -2.0, p, false),
            Err(MeshError::InvalidParameter { .. })
        ));

        // Updating before adding does nothing.
        assert!(!deformer.update_constraint_position(4, p, false));
        assert!(!deformer.update_constraint_position(0, p, false));
        assert!(!deformer.update_constraint_position(99, p, false));
        assert!(!deformer.is_constrained(4));

        deformer.add_constraint(4, 1.0, p, false).unwrap();
        assert!(deformer.is_constrained(4));
        assert!(!deformer.is_constrained(0));
        assert_eq!(deformer.remove_constraint(4).map(|c| c.target), Some(p));
        assert!(deformer.remove_constraint(0).is_none());

        deformer.add_constraint(4, 1.0, p, false).unwrap();
        deformer.clear_constraints();
        assert_eq!(deformer.solver().num_constraints(), 0);
    }

    #[test]
    fn test_cholesky_and_cg_agree() {
        let mesh = create_bumpy_grid(6);
        let mut results = Vec::new();

        for solver in [SolverType::Cholesky, SolverType::ConjugateGradient] {
            let options = DeformOptions::default().with_solver(solver);
            let mut deformer = ConstrainedMeshDeformer::new(&mesh, &options).unwrap();
            deformer
                .add_constraint(24, 3.0, Point3::new(3.0, 3.0, 2.0), false)
                .unwrap();
            deformer
                .add_constraint(10, 1.0, Point3::new(3.0, 1.0, -1.0), false)
                .unwrap();

            let mut positions = Vec::new();
            assert!(deformer.deform(&mut positions));
            results.push(positions);
        }

        for (a, b) in results[0].iter().zip(&results[1]) {
            assert!((a - b).norm() < 1e-6);
        }
    }

    #[test]
    fn test_cg_failure_still_writes_buffer() {
        let mesh = create_bumpy_grid(4);
        let options = DeformOptions::default()
            .with_solver(SolverType::ConjugateGradient)
            .with_cg_iterations(0);
        let mut deformer = ConstrainedMeshDeformer::new(&mesh, &options).unwrap();
        let target = Point3::new(2.0, 2.0, 5.0);
        deformer.add_constraint(12, 1.0, target, false).unwrap();
        deformer.add_constraint(6, 1.0, target, true).unwrap();

        let mut positions = Vec::new();
        assert!(!deformer.deform(&mut positions));
        assert!(matches!(
            deformer.solver().last_failure(),
            Some(MeshError::ConvergenceFailed { .. })
        ));

        assert_eq!(positions.len(), mesh.num_vertices());
        assert_eq!(positions[6], target);
        assert_eq!(positions[0], *mesh.position(VertexId::new(0)));
    }

    #[test]
    fn test_closed_mesh_solves_once_anchored() {
        // Tetrahedron: every vertex is interior, B has the constants in its
        // null space until a soft constraint anchors it.
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();

        let mut deformer = ConstrainedMeshDeformer::new(&mesh, &uniform()).unwrap();
        assert_eq!(deformer.linearization().num_boundary_verts(), 0);
        deformer.add_constraint(0, 1.0, vertices[0], false).unwrap();

        let mut positions = Vec::new();
        assert!(deformer.deform(&mut positions));
        for (p, q) in positions.iter().zip(&vertices) {
            assert!((p - q).norm() < 1e-9);
        }
    }

    #[test]
    fn test_post_fix_weight_does_not_reach_neighbors() {
        init();
        let mesh = create_bumpy_grid(4);
        let target = Point3::new(2.0, 2.0, 3.0);

        let mut results = Vec::new();
        for weight in [0.0, 10.0] {
            let mut deformer = ConstrainedMeshDeformer::new(&mesh, &uniform()).unwrap();
            deformer.add_constraint(12, weight, target, true).unwrap();

            let mut positions = Vec::new();
            assert!(deformer.deform(&mut positions));
            assert_eq!(positions[12], target);
            assert_eq!(deformer.solver().factorization_count(), 1);
            results.push(positions);
        }

        for v in mesh.vertex_ids().filter(|v| v.index() != 12) {
            assert_eq!(results[0][v.index()], results[1][v.index()], "vertex {}", v.index());
            assert!((results[1][v.index()] - *mesh.position(v)).norm() < 1e-9);
        }
    }

    #[test]
    fn test_unanchored_closed_mesh() {
        init();
        let vertices = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ];
        let faces = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();

        for options in all_options() {
            let mut deformer = ConstrainedMeshDeformer::new(&mesh, &options).unwrap();
            assert_eq!(deformer.linearization().num_boundary_verts(), 0);

            let mut positions = Vec::new();
            let ok = deformer.deform(&mut positions);

            if options.solver == SolverType::Cholesky {
                // Constant shifts are free: the direct solve must refuse.
                assert!(!ok, "{:?}", options);
                assert!(matches!(
                    deformer.solver().last_failure(),
                    Some(MeshError::FactorizationFailed(_))
                ));
                assert_eq!(positions, vertices);
            } else {
                // The warm start already satisfies the consistent system.
                assert!(ok, "{:?}", options);
                for (p, q) in positions.iter().zip(&vertices) {
                    assert!((p - q).norm() < 1e-9, "{:?}", options);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_area_fails_construction() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
        ];
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &SQUARE_FAN_FACES).unwrap();

        let result = ConstrainedMeshDeformer::new(
            &mesh,
            &DeformOptions::default().with_scheme(LaplacianWeightScheme::Cotangent),
        );
        assert!(matches!(
            result,
            Err(MeshError::DegenerateVertexArea { vertex: 4, .. })
        ));
    }

    #[test]
    fn test_invalid_options() {
        let mesh = create_square_fan();
        let options = uniform().with_cg_tolerance(0.0);
        assert!(matches!(
            ConstrainedMeshDeformer::new(&mesh, &options),
            Err(MeshError::InvalidParameter { name: "cg_tolerance", .. })
        ));
    }

    #[test]
    fn test_no_interior_vertices() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ];
        let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();
        let mut deformer = ConstrainedMeshDeformer::new(&mesh, &DeformOptions::default()).unwrap();

        let mut positions = Vec::new();
        assert!(deformer.deform(&mut positions));
        assert_eq!(positions, vertices);
        assert_eq!(deformer.average_area(), Some(0.0));
    }

    /// Triangle soup keyed by sparse vertex ids.
    struct SparseIdMesh {
        positions: BTreeMap<usize, Point3<f64>>,
        triangles: Vec<[usize; 3]>,
    }

    impl SparseIdMesh {
        fn edge_count(&self, a: usize, b: usize) -> usize {
            self.triangles
                .iter()
                .filter(|t| t.contains(&a) && t.contains(&b))
                .count()
        }
    }

    impl MeshTopology for SparseIdMesh {
        fn vertex_keys(&self) -> impl Iterator<Item = usize> + '_ {
            self.positions.keys().copied()
        }

        fn vertex_key_bound(&self) -> usize {
            self.positions.keys().next_back().map_or(0, |&v| v + 1)
        }

        fn contains_vertex(&self, v: usize) -> bool {
            self.positions.contains_key(&v)
        }

        fn vertex_position(&self, v: usize) -> Point3<f64> {
            self.positions[&v]
        }

        fn is_boundary(&self, v: usize) -> bool {
            let ring: Vec<usize> = self.one_ring(v).collect();
            ring.is_empty() || ring.iter().any(|&n| self.edge_count(v, n) < 2)
        }

        fn one_ring(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
            let ring: BTreeSet<usize> = self
                .triangles
                .iter()
                .filter(|t| t.contains(&v))
                .flat_map(|t| t.iter().copied())
                .filter(|&u| u != v)
                .collect();
            ring.into_iter()
        }

        fn incident_triangles(&self, v: usize) -> impl Iterator<Item = [usize; 3]> + '_ {
            self.triangles
                .iter()
                .copied()
                .filter(move |t| t.contains(&v))
        }
    }

    #[test]
    fn test_non_contiguous_vertex_ids() {
        init();
        let ids = [10, 20, 30, 40, 70];
        let mesh = SparseIdMesh {
            positions: ids.iter().copied().zip(square_fan_vertices()).collect(),
            triangles: SQUARE_FAN_FACES
                .iter()
                .map(|t| t.map(|k| ids[k]))
                .collect(),
        };

        for scheme in LaplacianWeightScheme::ALL {
            let options = DeformOptions::default().with_scheme(scheme);
            let mut deformer = ConstrainedMeshDeformer::new(&mesh, &options).unwrap();
            assert_eq!(deformer.linearization().interior_ids(), &[70]);
            assert!(deformer.add_constraint(4, 1.0, Point3::origin(), false).is_err());

            let target = Point3::new(0.5, 0.5, 2.0);
            deformer.add_constraint(70, 1.0, target, true).unwrap();

            let sentinel = Point3::new(-9.0, -9.0, -9.0);
            let mut positions = vec![sentinel; 3];
            assert!(deformer.deform(&mut positions), "{:?}", scheme);

            assert_eq!(positions.len(), 71);
            assert_eq!(positions[70], target);
            assert_eq!(positions[10], Point3::new(0.0, 0.0, 0.0));
            assert_eq!(positions[40], Point3::new(0.0, 1.0, 0.0));
            // Slots of ids outside the mesh keep whatever was there.
            assert_eq!(positions[0], sentinel);
            assert_eq!(positions[50], Point3::origin());
        }
    }
}
