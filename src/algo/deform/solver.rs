//! Biharmonic system with per-vertex soft and hard position constraints.
//!
//! The solver owns `B = Lᵀ·L` for the interior Laplacian `L` and minimizes
//!
//! ```text
//! E(x) = ½ xᵀ B x - xᵀ s + ½ Σ_i w_i² |x_i - t_i|²
//! ```
//!
//! over the interior positions `x`, where `s` is the caller's source term
//! (usually `B·x₀`) and the sum runs over soft constraints: positive weight
//! and no post-fix. Setting the gradient to zero gives
//!
//! ```text
//! (B + Σ_i w_i² e_i e_iᵀ) x = s + Σ_i w_i² t_i
//! ```
//!
//! The system matrix depends only on the soft weights, so it is refactored
//! only when the set of soft `(index, weight)` pairs changes. Dragging a
//! target around re-solves against the cached factorization. Post-fix
//! constraints never enter the system; they overwrite their own row after
//! the solve.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, Point3};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

use crate::error::{MeshError, Result};

use super::sparse::{add_diagonal, conjugate_gradient, normal_matrix};

/// Default iteration cap for [`SolverType::ConjugateGradient`].
pub const DEFAULT_MAX_CG_ITERATIONS: usize = 1000;

/// Default relative residual tolerance for [`SolverType::ConjugateGradient`].
pub const DEFAULT_CG_TOLERANCE: f64 = 1e-10;

/// Linear solver family used for the constrained system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SolverType {
    /// Sparse LLᵀ factorization, reused until the weights change.
    #[default]
    Cholesky,
    /// Conjugate gradient, warm-started from the original positions.
    ConjugateGradient,
}

/// A position constraint on one interior vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    /// Strength of the soft term. Zero disables it.
    pub weight: f64,
    /// Target position.
    pub target: Point3<f64>,
    /// Overwrite the solved position with `target` after the solve. A post-fix
    /// constraint adds no soft term, whatever its weight.
    pub post_fix: bool,
}

impl Constraint {
    /// Whether the constraint contributes to the system matrix.
    #[inline]
    pub fn is_soft(&self) -> bool {
        self.weight > 0.0 && !self.post_fix
    }
}

/// Sorted `(index, weight)` pairs of the soft constraints.
type WeightPattern = Vec<(usize, f64)>;

/// Smallest accepted Cholesky pivot relative to the diagonal entry of its row.
const PIVOT_TOLERANCE: f64 = 1e-10;

enum LinearSystem {
    Direct(CscCholesky<f64>),
    Iterative(CsrMatrix<f64>),
}

/// Owns the biharmonic operator, the constraint table and the current
/// factorization.
///
/// Constraints are keyed by interior linear index (see
/// [`VertexLinearization`](super::VertexLinearization)).
pub struct ConstrainedMeshDeformationSolver {
    biharmonic: CsrMatrix<f64>,
    solver_type: SolverType,
    max_cg_iterations: usize,
    cg_tolerance: f64,

    constraints: BTreeMap<usize, Constraint>,
    constraint_rhs: DMatrix<f64>,

    system: Option<LinearSystem>,
    factored_pattern: Option<WeightPattern>,
    factorization_count: usize,
    factor_error: Option<MeshError>,
    last_failure: Option<MeshError>,
}

impl ConstrainedMeshDeformationSolver {
    /// Build the solver from the interior Laplacian, which is consumed.
    pub fn new(interior_laplacian: CsrMatrix<f64>, solver_type: SolverType) -> Self {
        let biharmonic = normal_matrix(&interior_laplacian);
        let n = biharmonic.nrows();

        log::debug!(
            "biharmonic operator: {} unknowns, {} nonzeros",
            n,
            biharmonic.nnz()
        );

        Self {
            biharmonic,
            solver_type,
            max_cg_iterations: DEFAULT_MAX_CG_ITERATIONS,
            cg_tolerance: DEFAULT_CG_TOLERANCE,
            constraints: BTreeMap::new(),
            constraint_rhs: DMatrix::zeros(n, 3),
            system: None,
            factored_pattern: None,
            factorization_count: 0,
            factor_error: None,
            last_failure: None,
        }
    }

    /// Set the conjugate gradient limits.
    pub fn with_cg_limits(mut self, max_iterations: usize, tolerance: f64) -> Self {
        self.max_cg_iterations = max_iterations;
        self.cg_tolerance = tolerance;
        self
    }

    /// The biharmonic operator `B = Lᵀ·L`. Never rebuilt after construction.
    pub fn biharmonic(&self) -> &CsrMatrix<f64> {
        &self.biharmonic
    }

    /// Number of interior unknowns.
    #[inline]
    pub fn num_unknowns(&self) -> usize {
        self.biharmonic.nrows()
    }

    /// The solver family.
    pub fn solver_type(&self) -> SolverType {
        self.solver_type
    }

    /// Insert or overwrite the constraint at `index`.
    ///
    /// A zero weight is kept in the table but contributes nothing until it is
    /// raised.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidParameter`] if `index` is not an interior
    /// index or `weight` is negative or not finite.
    pub fn add_constraint(
        &mut self,
        index: usize,
        weight: f64,
        target: Point3<f64>,
        post_fix: bool,
    ) -> Result<()> {
        self.check_index(index)?;
        check_weight(weight)?;

        self.constraints.insert(
            index,
            Constraint {
                weight,
                target,
                post_fix,
            },
        );
        Ok(())
    }

    /// Move an existing constraint and set its post-fix flag.
    ///
    /// Flipping `post_fix` on a weighted constraint adds or removes its soft
    /// term, so the next update refactors. Returns `false` and changes nothing
    /// when `index` has no constraint.
    pub fn update_constraint_position(
        &mut self,
        index: usize,
        target: Point3<f64>,
        post_fix: bool,
    ) -> bool {
        match self.constraints.get_mut(&index) {
            Some(constraint) => {
                constraint.target = target;
                constraint.post_fix = post_fix;
                true
            }
            None => false,
        }
    }

    /// Change the weight of an existing constraint.
    ///
    /// Returns `Ok(false)` when `index` has no constraint.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidParameter`] for a negative or non-finite
    /// weight.
    pub fn update_constraint_weight(&mut self, index: usize, weight: f64) -> Result<bool> {
        check_weight(weight)?;
        Ok(match self.constraints.get_mut(&index) {
            Some(constraint) => {
                constraint.weight = weight;
                true
            }
            None => false,
        })
    }

    /// Remove the constraint at `index`, returning it.
    pub fn remove_constraint(&mut self, index: usize) -> Option<Constraint> {
        self.constraints.remove(&index)
    }

    /// Remove every constraint.
    pub fn clear_constraints(&mut self) {
        self.constraints.clear();
    }

    /// The constraint at `index`, if any.
    pub fn constraint(&self, index: usize) -> Option<&Constraint> {
        self.constraints.get(&index)
    }

    /// Whether `index` has a constraint (of any weight).
    pub fn is_constrained(&self, index: usize) -> bool {
        self.constraints.contains_key(&index)
    }

    /// Number of constraints in the table.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Iterate over `(index, constraint)` in ascending index order.
    pub fn constraints(&self) -> impl Iterator<Item = (usize, &Constraint)> + '_ {
        self.constraints.iter().map(|(&i, c)| (i, c))
    }

    /// How many times the system matrix has been rebuilt.
    pub fn factorization_count(&self) -> usize {
        self.factorization_count
    }

    /// Whether the next [`update_solver_constraints`] will refactor.
    ///
    /// [`update_solver_constraints`]: Self::update_solver_constraints
    pub fn needs_factorization(&self) -> bool {
        self.factored_pattern.as_ref() != Some(&self.weight_pattern())
    }

    /// The error behind the most recent failed solve, cleared by the next
    /// successful one.
    pub fn last_failure(&self) -> Option<&MeshError> {
        self.last_failure.as_ref()
    }

    /// Rebuild the constraint right-hand side from the soft constraints,
    /// refactoring the system matrix if their weight pattern changed since
    /// the last factorization.
    pub fn update_solver_constraints(&mut self) {
        let n = self.num_unknowns();
        let mut rhs = DMatrix::zeros(n, 3);
        for (&i, c) in self.constraints.iter().filter(|(_, c)| c.is_soft()) {
            let w2 = c.weight * c.weight;
            for axis in 0..3 {
                rhs[(i, axis)] += w2 * c.target[axis];
            }
        }
        self.constraint_rhs = rhs;

        let pattern = self.weight_pattern();
        if self.factored_pattern.as_ref() != Some(&pattern) {
            self.factorize(pattern);
        }
    }

    /// Solve `A·x = source + constraint_rhs` for all three axes.
    ///
    /// `original` (`N_int × 3`) seeds the iterative family and is ignored by
    /// the direct one. `solution` is always overwritten: with the solution,
    /// the best iterate the conjugate gradient reached, or `original` when no
    /// factorization is available. Returns `false` on failure, leaving the
    /// constraint table and operator untouched.
    pub fn solve_with_guess(
        &mut self,
        original: &DMatrix<f64>,
        source: &DMatrix<f64>,
        solution: &mut DMatrix<f64>,
    ) -> bool {
        let n = self.num_unknowns();
        if n == 0 {
            *solution = DMatrix::zeros(0, 3);
            self.last_failure = None;
            return true;
        }

        if original.shape() != (n, 3) || source.shape() != (n, 3) {
            let err = MeshError::invalid_param(
                "source",
                format!("{}x{}", source.nrows(), source.ncols()),
                "must have one row per interior vertex and three columns",
            );
            log::warn!("{}", err);
            *solution = original.clone();
            self.last_failure = Some(err);
            return false;
        }

        if self.factored_pattern.is_none() {
            self.update_solver_constraints();
        }

        let rhs = source + &self.constraint_rhs;

        let failure = match &self.system {
            Some(LinearSystem::Direct(cholesky)) => {
                *solution = cholesky.solve(&rhs);
                if solution.iter().all(|v| v.is_finite()) {
                    None
                } else {
                    Some(MeshError::FactorizationFailed(
                        "solution contains non-finite values".to_string(),
                    ))
                }
            }
            Some(LinearSystem::Iterative(system)) => {
                *solution = original.clone();
                let mut failure = None;
                for axis in 0..3 {
                    let b = rhs.column(axis).into_owned();
                    let mut x = solution.column(axis).into_owned();
                    match conjugate_gradient(
                        system,
                        &b,
                        &mut x,
                        self.max_cg_iterations,
                        self.cg_tolerance,
                    ) {
                        Ok(iterations) => {
                            log::debug!("axis {} converged in {} iterations", axis, iterations)
                        }
                        Err(err) => failure = Some(err),
                    }
                    solution.set_column(axis, &x);
                }
                failure
            }
            None => {
                *solution = original.clone();
                Some(self.factor_error.clone().unwrap_or_else(|| {
                    MeshError::FactorizationFailed("system was not factored".to_string())
                }))
            }
        };

        match failure {
            Some(err) => {
                log::warn!("constrained solve failed: {}", err);
                self.last_failure = Some(err);
                false
            }
            None => {
                self.last_failure = None;
                true
            }
        }
    }

    /// Overwrite the rows of post-fix constraints with their exact targets.
    pub fn update_with_post_fix_constraints(&self, solution: &mut DMatrix<f64>) {
        for (&i, c) in self.constraints.iter().filter(|(_, c)| c.post_fix) {
            if i < solution.nrows() {
                for axis in 0..3 {
                    solution[(i, axis)] = c.target[axis];
                }
            }
        }
    }

    fn weight_pattern(&self) -> WeightPattern {
        self.constraints
            .iter()
            .filter(|(_, c)| c.is_soft())
            .map(|(&i, c)| (i, c.weight))
            .collect()
    }

    fn factorize(&mut self, pattern: WeightPattern) {
        if self.num_unknowns() == 0 {
            self.system = None;
            self.factored_pattern = Some(pattern);
            return;
        }

        let diagonal: Vec<(usize, f64)> = pattern.iter().map(|&(i, w)| (i, w * w)).collect();
        let system = add_diagonal(&self.biharmonic, &diagonal);
        self.factorization_count += 1;

        log::debug!(
            "rebuilding {:?} system with {} soft constraints (factorization #{})",
            self.solver_type,
            pattern.len(),
            self.factorization_count
        );

        self.factor_error = None;
        self.system = match self.solver_type {
            SolverType::Cholesky => match CscCholesky::factor(&CscMatrix::from(&system)) {
                Ok(cholesky) => match weak_pivot(&cholesky, &system) {
                    None => Some(LinearSystem::Direct(cholesky)),
                    Some((row, ratio)) => {
                        let reason = format!(
                            "system is singular: pivot of row {} is {:e} of its diagonal",
                            row, ratio
                        );
                        log::warn!("Cholesky factorization rejected: {}", reason);
                        self.factor_error = Some(MeshError::FactorizationFailed(reason));
                        None
                    }
                },
                Err(err) => {
                    log::warn!("Cholesky factorization failed: {:?}", err);
                    self.factor_error = Some(MeshError::FactorizationFailed(format!("{:?}", err)));
                    None
                }
            },
            SolverType::ConjugateGradient => Some(LinearSystem::Iterative(system)),
        };
        self.factored_pattern = Some(pattern);
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.num_unknowns() {
            return Err(MeshError::invalid_param(
                "index",
                index,
                "must be an interior vertex index",
            ));
        }
        Ok(())
    }
}

/// First row whose pivot `L_jj²` is negligible next to `A_jj`.
///
/// A positive semi-definite matrix can factor through rounding-level pivots,
/// which then amplify into arbitrary null space components of the solution.
fn weak_pivot(cholesky: &CscCholesky<f64>, system: &CsrMatrix<f64>) -> Option<(usize, f64)> {
    let mut diagonal = vec![0.0; system.nrows()];
    for (i, j, &v) in system.triplet_iter() {
        if i == j {
            diagonal[i] += v;
        }
    }

    let mut pivots = vec![0.0; system.nrows()];
    for (i, j, &v) in cholesky.l().triplet_iter() {
        if i == j {
            pivots[i] = v * v;
        }
    }

    pivots
        .iter()
        .zip(&diagonal)
        .enumerate()
        .map(|(row, (&pivot, &diag))| (row, if diag > 0.0 { pivot / diag } else { 0.0 }))
        .find(|&(_, ratio)| ratio.is_nan() || ratio <= PIVOT_TOLERANCE)
}

fn check_weight(weight: f64) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(MeshError::invalid_param(
            "weight",
            weight,
            "must be finite and non-negative",
        ));
    }
    Ok(())
}

impl std::fmt::Debug for ConstrainedMeshDeformationSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstrainedMeshDeformationSolver")
            .field("num_unknowns", &self.num_unknowns())
            .field("solver_type", &self.solver_type)
            .field("num_constraints", &self.constraints.len())
            .field("factorization_count", &self.factorization_count)
            .finish()
    }
}
