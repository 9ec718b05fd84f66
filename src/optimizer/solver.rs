//! Single-step charging optimizer.
//!
//! Builds the conic program for one timestep, solves it with Clarabel and keeps
//! the full horizon in a [`HorizonPlan`]. Callers apply only the first column
//! and solve again on the next timestep with fresh state.

use std::time::Instant;

use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};
use ndarray::{Array1, Array2};
use tracing::{debug, warn};

use super::laxity;
use super::problem::ChargingProblem;
use super::program::{compile, LinearRow, Program, Term};
use super::SolvePhase;
use crate::domain::{PhysicalParameters, SOC_TOLERANCE};
use crate::error::{ChargeError, Result};

/// Solved horizon for the occupied stalls, one row per vehicle in stall order.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonPlan {
    pub stalls: Vec<usize>,
    /// `AC[k, j]`
    pub charge: Array2<f64>,
    /// `AD[k, j]`, all zero when discharge is not modeled.
    pub discharge: Array2<f64>,
    /// `SOC[k, j]` with `horizon + 1` columns.
    pub soc: Array2<f64>,
    pub laxity: Array1<f64>,
    pub objective_value: f64,
    pub iterations: u32,
}

impl HorizonPlan {
    pub fn horizon(&self) -> usize {
        self.charge.ncols()
    }

    /// Combined action `AC + AD` of row `k` at horizon step `j`.
    pub fn action(&self, k: usize, j: usize) -> f64 {
        self.charge[[k, j]] + self.discharge[[k, j]]
    }

    /// First-step decision for the whole lot: one entry per stall, zero where
    /// no vehicle is parked.
    pub fn first_actions(&self, max_cars: usize) -> Vec<f64> {
        let mut actions = vec![0.0; max_cars];
        if self.horizon() == 0 {
            return actions;
        }
        for (k, &stall) in self.stalls.iter().enumerate() {
            actions[stall] = self.action(k, 0);
        }
        actions
    }
}

#[derive(Debug, Clone)]
pub struct ChargingOptimizer {
    params: PhysicalParameters,
    max_iter: u32,
}

impl ChargingOptimizer {
    /// Validates the physical constants once, up front.
    pub fn new(params: PhysicalParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            max_iter: 200,
        })
    }

    pub fn params(&self) -> &PhysicalParameters {
        &self.params
    }

    /// Solves `problem` over its full horizon.
    ///
    /// Anything but an optimal solver status is [`ChargeError::InfeasibleProgram`];
    /// no fallback action is produced.
    pub fn solve(&self, problem: &ChargingProblem) -> Result<HorizonPlan> {
        if problem.params != self.params {
            return Err(ChargeError::Configuration(
                "problem was built with different physical parameters than the optimizer".into(),
            ));
        }
        let mut phase = SolvePhase::Idle;
        let started = Instant::now();

        transition(&mut phase, SolvePhase::Building);
        let program = match compile(problem) {
            Ok(program) => program,
            Err(err) => {
                transition(&mut phase, SolvePhase::Infeasible);
                return Err(err);
            }
        };

        transition(&mut phase, SolvePhase::Solving);
        let (x, objective, iterations) = match self.run_solver(&program) {
            Ok(result) => result,
            Err(err) => {
                transition(&mut phase, SolvePhase::Infeasible);
                return Err(err);
            }
        };
        transition(&mut phase, SolvePhase::Solved);

        let plan = self.extract(problem, &program, &x, objective + program.objective_offset, iterations);
        debug!(
            vehicles = plan.stalls.len(),
            horizon = plan.horizon(),
            objective = plan.objective_value,
            iterations,
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "charging program solved"
        );
        Ok(plan)
    }

    fn run_solver(&self, program: &Program) -> Result<(Vec<f64>, f64, u32)> {
        let n = program.num_vars;
        let p_mat = diagonal_csc(&program.quadratic_diag);
        let rows: Vec<&LinearRow> = program
            .equalities
            .iter()
            .chain(program.inequalities.iter())
            .collect();
        let a_mat = rows_to_csc(&rows, n);
        let b: Vec<f64> = rows.iter().map(|row| row.rhs).collect();

        let mut cones = Vec::with_capacity(2);
        if !program.equalities.is_empty() {
            cones.push(SupportedConeT::ZeroConeT(program.equalities.len()));
        }
        if !program.inequalities.is_empty() {
            cones.push(SupportedConeT::NonnegativeConeT(program.inequalities.len()));
        }

        let settings = DefaultSettingsBuilder::default()
            .verbose(false)
            .max_iter(self.max_iter)
            .build()
            .map_err(|e| ChargeError::Solver(format!("settings: {e:?}")))?;

        let mut solver = DefaultSolver::new(
            &p_mat,
            &program.linear_cost,
            &a_mat,
            &b,
            &cones,
            settings,
        )
        .map_err(|e| ChargeError::Solver(format!("setup: {e:?}")))?;
        solver.solve();

        let solution = &solver.solution;
        if !matches!(solution.status, SolverStatus::Solved) {
            warn!(status = ?solution.status, vars = n, rows = b.len(), "no optimal charging schedule");
            return Err(ChargeError::InfeasibleProgram(format!(
                "solver finished with status {:?}",
                solution.status
            )));
        }
        Ok((solution.x.clone(), solution.obj_val, solution.iterations))
    }

    fn extract(
        &self,
        problem: &ChargingProblem,
        program: &Program,
        x: &[f64],
        objective_value: f64,
        iterations: u32,
    ) -> HorizonPlan {
        let params = &self.params;
        let n = problem.horizon;
        let k = program.layout.len();
        let value = |term: Term| match term {
            Term::Var(idx) => x[idx],
            Term::Fixed(v) => v,
        };

        let mut charge = Array2::zeros((k, n));
        let mut discharge = Array2::zeros((k, n));
        let mut soc = Array2::zeros((k, n + 1));
        let mut laxity_values = Array1::zeros(k);
        for (row, (layout, vehicle)) in program.layout.iter().zip(&problem.vehicles).enumerate() {
            for j in 0..n {
                charge[[row, j]] = snap(value(layout.charge[j]), 0.0, params.max_charge_action());
                discharge[[row, j]] =
                    snap(value(layout.discharge[j]), params.max_discharge_action(), 0.0);
            }
            for j in 0..=n {
                soc[[row, j]] = value(layout.soc[j]);
            }
            laxity_values[row] = if vehicle.is_pinned() || n == 0 {
                0.0
            } else {
                laxity::laxity(vehicle, soc[[row, 1]], params)
            };
        }

        HorizonPlan {
            stalls: program.layout.iter().map(|l| l.stall).collect(),
            charge,
            discharge,
            soc,
            laxity: laxity_values,
            objective_value,
            iterations,
        }
    }
}

/// Removes interior-point round-off: clamps into `[lower, upper]` and moves
/// values within [`SOC_TOLERANCE`] of a bound onto it. Full-power steps then
/// add exactly the planned SOC in the environment.
fn snap(value: f64, lower: f64, upper: f64) -> f64 {
    let value = value.clamp(lower, upper);
    if upper - value < SOC_TOLERANCE {
        upper
    } else if value - lower < SOC_TOLERANCE {
        lower
    } else {
        value
    }
}

fn transition(phase: &mut SolvePhase, next: SolvePhase) {
    debug!(from = %phase, to = %next, "solve phase");
    *phase = next;
}

/// Upper-triangular CSC of a diagonal matrix, skipping zero entries.
fn diagonal_csc(diag: &[f64]) -> CscMatrix<f64> {
    let n = diag.len();
    let mut col_ptr = Vec::with_capacity(n + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for (col, &d) in diag.iter().enumerate() {
        col_ptr.push(values.len());
        if d != 0.0 {
            row_idx.push(col);
            values.push(d);
        }
    }
    col_ptr.push(values.len());
    CscMatrix::new(n, n, col_ptr, row_idx, values)
}

/// Stacks constraint rows into a CSC matrix with `num_vars` columns.
fn rows_to_csc(rows: &[&LinearRow], num_vars: usize) -> CscMatrix<f64> {
    let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); num_vars];
    for (r, row) in rows.iter().enumerate() {
        for &(var, coef) in &row.terms {
            if coef != 0.0 {
                columns[var].push((r, coef));
            }
        }
    }

    let mut col_ptr = Vec::with_capacity(num_vars + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for column in &mut columns {
        col_ptr.push(values.len());
        column.sort_by_key(|(r, _)| *r);
        for &(r, v) in column.iter() {
            row_idx.push(r);
            values.push(v);
        }
    }
    col_ptr.push(values.len());
    CscMatrix::new(rows.len(), num_vars, col_ptr, row_idx, values)
}
