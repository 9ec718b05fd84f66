//! Translation of a [`ChargingProblem`] into conic standard form.
//!
//! The solver works on
//!
//! ```text
//! minimize    1/2 x'Px + q'x
//! subject to  A_eq x  = b_eq
//!             A_in x <= b_in
//! ```
//!
//! Known quantities (initial SOC, SOC pinned to the target after the deadline,
//! actions of pinned vehicles) are substituted as constants instead of becoming
//! variables, so the reported trajectory reproduces them exactly.

use super::laxity;
use super::problem::ChargingProblem;
use super::Objective;
use crate::domain::SOC_TOLERANCE;
use crate::error::{ChargeError, Result};

/// Weight on `AC - AD` in projection mode. Charging and discharging in the same
/// step never pays off, so the split of `AC + AD` stays unique.
const SPLIT_PENALTY: f64 = 1e-6;

/// A trajectory entry: either a decision variable or a substituted constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Term {
    Var(usize),
    Fixed(f64),
}

/// `sum(coef * x[var]) (= | <=) rhs`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearRow {
    pub terms: Vec<(usize, f64)>,
    pub rhs: f64,
}

impl LinearRow {
    fn add(&mut self, term: Term, coef: f64) {
        match term {
            Term::Var(idx) => match self.terms.iter_mut().find(|(v, _)| *v == idx) {
                Some((_, existing)) => *existing += coef,
                None => self.terms.push((idx, coef)),
            },
            Term::Fixed(value) => self.rhs -= coef * value,
        }
    }

    fn with(mut self, term: Term, coef: f64) -> Self {
        self.add(term, coef);
        self
    }

    fn rhs(mut self, rhs: f64) -> Self {
        self.rhs += rhs;
        self
    }
}

/// Where each vehicle's quantities live in the solution vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleLayout {
    pub stall: usize,
    pub charge: Vec<Term>,
    pub discharge: Vec<Term>,
    /// `horizon + 1` entries.
    pub soc: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub num_vars: usize,
    /// `q`
    pub linear_cost: Vec<f64>,
    /// Diagonal of `P`.
    pub quadratic_diag: Vec<f64>,
    /// Constant added to the solver's objective to report the true objective value.
    pub objective_offset: f64,
    pub equalities: Vec<LinearRow>,
    pub inequalities: Vec<LinearRow>,
    pub layout: Vec<VehicleLayout>,
}

impl Program {
    fn new_var(&mut self) -> usize {
        let idx = self.num_vars;
        self.num_vars += 1;
        self.linear_cost.push(0.0);
        self.quadratic_diag.push(0.0);
        idx
    }

    fn new_term(&mut self) -> Term {
        Term::Var(self.new_var())
    }

    fn push_eq(&mut self, row: LinearRow, what: &str) -> Result<()> {
        if row.terms.is_empty() {
            if row.rhs.abs() > SOC_TOLERANCE {
                return Err(ChargeError::InfeasibleProgram(format!(
                    "{what}: constant equality violated by {:.6}",
                    row.rhs
                )));
            }
            return Ok(());
        }
        self.equalities.push(row);
        Ok(())
    }

    fn push_le(&mut self, row: LinearRow, what: &str) -> Result<()> {
        if row.terms.is_empty() {
            if row.rhs < -SOC_TOLERANCE {
                return Err(ChargeError::InfeasibleProgram(format!(
                    "{what}: constant bound violated by {:.6}",
                    -row.rhs
                )));
            }
            return Ok(());
        }
        self.inequalities.push(row);
        Ok(())
    }

    /// Box constraint `lower <= term <= upper` on a variable.
    fn push_box(&mut self, term: Term, lower: f64, upper: f64, what: &str) -> Result<()> {
        self.push_le(LinearRow::default().with(term, 1.0).rhs(upper), what)?;
        self.push_le(LinearRow::default().with(term, -1.0).rhs(-lower), what)
    }
}

/// Compiles the problem into solver standard form.
///
/// Constraints whose terms are all constants are checked here; a violated one
/// is reported as [`ChargeError::InfeasibleProgram`] without calling the solver.
pub fn compile(problem: &ChargingProblem) -> Result<Program> {
    let params = &problem.params;
    let n = problem.horizon;
    let max_charge = params.max_charge_action();
    let max_discharge = params.max_discharge_action();
    let mut program = Program::default();

    for vehicle in &problem.vehicles {
        let stall = vehicle.stall;
        if vehicle.is_pinned() {
            program.layout.push(VehicleLayout {
                stall,
                charge: vec![Term::Fixed(0.0); n],
                discharge: vec![Term::Fixed(0.0); n],
                soc: vec![Term::Fixed(vehicle.soc); n + 1],
            });
            continue;
        }

        let charge: Vec<Term> = (0..n).map(|_| program.new_term()).collect();
        let discharge: Vec<Term> = (0..n)
            .map(|j| match vehicle.discharge {
                Some(allowance) if j < allowance.steps => program.new_term(),
                _ => Term::Fixed(0.0),
            })
            .collect();
        let terminal = vehicle.terminal_column(n);
        let soc: Vec<Term> = (0..=n)
            .map(|j| {
                if j == 0 {
                    Term::Fixed(vehicle.soc)
                } else if j >= terminal {
                    Term::Fixed(params.final_soc)
                } else {
                    program.new_term()
                }
            })
            .collect();

        for j in 0..n {
            program.push_box(charge[j], 0.0, max_charge, "charge power limit")?;
            if matches!(discharge[j], Term::Var(_)) {
                program.push_box(discharge[j], max_discharge, 0.0, "discharge power limit")?;
            }
        }
        for &term in &soc[1..] {
            if matches!(term, Term::Var(_)) {
                program.push_box(term, 0.0, params.final_soc, "SOC bounds")?;
            }
        }

        // SOC[j+1] - SOC[j] - eta_c * AC[j] - AD[j] / eta_d = 0
        for j in 0..n {
            let row = LinearRow::default()
                .with(soc[j + 1], 1.0)
                .with(soc[j], -1.0)
                .with(charge[j], -params.eta_c)
                .with(discharge[j], -1.0 / params.eta_d);
            program.push_eq(row, &format!("stall {stall} dynamics at step {j}"))?;
        }

        if let Some(allowance) = vehicle.discharge {
            let row = discharge
                .iter()
                .fold(LinearRow::default(), |row, &term| {
                    row.with(term, -1.0 / params.eta_d)
                })
                .rhs(allowance.budget);
            program.push_le(row, &format!("stall {stall} discharge budget"))?;
        }

        if laxity::is_constrained(vehicle, n) {
            let (coef, rhs) = laxity::nonnegative_row(vehicle, params);
            let row = LinearRow::default().with(soc[1], coef).rhs(rhs);
            program.push_le(row, &format!("stall {stall} laxity"))?;
        }

        program.layout.push(VehicleLayout {
            stall,
            charge,
            discharge,
            soc,
        });
    }

    match &problem.objective {
        Objective::MinimizeCost { prices } => {
            for layout in &program.layout {
                for (j, term) in layout.charge.iter().enumerate() {
                    if let Term::Var(idx) = *term {
                        program.linear_cost[idx] += prices[j];
                    }
                }
            }
        }
        Objective::Project(proposal) => {
            let steps = proposal.steps().min(n);
            let layout = program.layout.clone();
            for vehicle in &layout {
                for (&charge, &discharge) in vehicle.charge.iter().zip(&vehicle.discharge) {
                    if let (Term::Var(ac), Term::Var(ad)) = (charge, discharge) {
                        program.linear_cost[ac] += SPLIT_PENALTY;
                        program.linear_cost[ad] -= SPLIT_PENALTY;
                    }
                }
                for j in 0..steps {
                    let target = proposal.value(vehicle.stall, j);
                    // Pinned vehicles cannot move, their distance is a constant.
                    if vehicle.charge[j] == Term::Fixed(0.0) && vehicle.discharge[j] == Term::Fixed(0.0) {
                        program.objective_offset += target * target;
                        continue;
                    }
                    // Y = AC + AD, objective (Y - target)^2 = Y^2 - 2 target Y + target^2
                    let y = program.new_var();
                    let row = LinearRow::default()
                        .with(Term::Var(y), 1.0)
                        .with(vehicle.charge[j], -1.0)
                        .with(vehicle.discharge[j], -1.0);
                    program.push_eq(row, "projection target")?;
                    program.quadratic_diag[y] += 2.0;
                    program.linear_cost[y] -= 2.0 * target;
                    program.objective_offset += target * target;
                }
            }
        }
    }

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PhysicalParameters;
    use crate::optimizer::problem::{DischargeAllowance, VehiclePlan};
    use crate::optimizer::ProposedAction;

    fn params() -> PhysicalParameters {
        PhysicalParameters {
            max_cars: 2,
            final_soc: 1.0,
            battery_capacity_kwh: 40.0,
            eta_c: 1.0,
            eta_d: 1.0,
            alpha_c_kw: 10.0,
            alpha_d_kw: 10.0,
        }
    }

    fn vehicle(stall: usize, soc: f64, terminal_index: i64) -> VehiclePlan {
        VehiclePlan {
            stall,
            soc,
            terminal_index,
            discharge: None,
        }
    }

    fn cost_problem(vehicles: Vec<VehiclePlan>, horizon: usize) -> ChargingProblem {
        ChargingProblem {
            params: params(),
            horizon,
            vehicles,
            objective: Objective::MinimizeCost {
                prices: vec![1.0; horizon],
            },
        }
    }

    #[test]
    fn initial_and_terminal_soc_are_constants() {
        let program = compile(&cost_problem(vec![vehicle(0, 0.2, 4)], 5)).unwrap();
        let soc = &program.layout[0].soc;
        assert_eq!(soc[0], Term::Fixed(0.2));
        assert!(matches!(soc[1], Term::Var(_)));
        assert!(matches!(soc[3], Term::Var(_)));
        assert_eq!(soc[4], Term::Fixed(1.0));
        assert_eq!(soc[5], Term::Fixed(1.0));
    }

    #[test]
    fn variable_count_matches_layout() {
        // 3 charge + 2 free SOC columns
        let program = compile(&cost_problem(vec![vehicle(1, 0.5, 3)], 3)).unwrap();
        assert_eq!(program.num_vars, 5);
        assert_eq!(program.equalities.len(), 3);
        assert_eq!(program.linear_cost.iter().filter(|c| **c == 1.0).count(), 3);
    }

    #[test]
    fn pinned_vehicle_has_no_variables() {
        let program = compile(&cost_problem(vec![vehicle(0, 0.3, 0), vehicle(1, 0.5, 2)], 2)).unwrap();
        assert!(program.layout[0].charge.iter().all(|t| *t == Term::Fixed(0.0)));
        assert!(program.layout[0].soc.iter().all(|t| *t == Term::Fixed(0.3)));
    }

    #[test]
    fn immediate_deadline_leaves_single_charge_equality() {
        // SOC[0] and SOC[1] are both constants: -AC[0] = -(1.0 - 0.2)
        let program = compile(&cost_problem(vec![vehicle(0, 0.2, 1)], 1)).unwrap();
        assert_eq!(program.equalities.len(), 1);
        assert_eq!(program.equalities[0].terms, vec![(0, -1.0)]);
        assert!((program.equalities[0].rhs + 0.8).abs() < 1e-12);
    }

    #[test]
    fn violated_constant_row_is_infeasible() {
        let mut program = Program::default();
        // 1.0 <= 0.5 with no variables left
        let row = LinearRow::default().with(Term::Fixed(1.0), 1.0).rhs(0.5);
        assert!(matches!(
            program.push_le(row, "test"),
            Err(ChargeError::InfeasibleProgram(_))
        ));
        let row = LinearRow::default().with(Term::Fixed(0.5), 1.0).rhs(0.5);
        assert!(program.push_eq(row, "test").is_ok());
        assert!(program.equalities.is_empty());
    }

    #[test]
    fn laxity_row_is_added_for_longer_horizons() {
        let program = compile(&cost_problem(vec![vehicle(0, 0.2, 4)], 4)).unwrap();
        let laxity_rows = program
            .inequalities
            .iter()
            .filter(|row| row.terms.len() == 1 && row.terms[0].1 == -4.0)
            .count();
        assert_eq!(laxity_rows, 1);
    }

    #[test]
    fn discharge_outside_window_is_fixed_to_zero() {
        let mut v = vehicle(0, 0.5, 4);
        v.discharge = Some(DischargeAllowance {
            budget: 0.1,
            steps: 2,
        });
        let mut problem = cost_problem(vec![v], 4);
        problem.objective = Objective::Project(ProposedAction::Step(vec![0.0, 0.0]));
        let program = compile(&problem).unwrap();
        let discharge = &program.layout[0].discharge;
        assert!(matches!(discharge[0], Term::Var(_)));
        assert!(matches!(discharge[1], Term::Var(_)));
        assert_eq!(discharge[2], Term::Fixed(0.0));
        assert_eq!(discharge[3], Term::Fixed(0.0));

        // Charging and discharging in the same step is penalized.
        let (Term::Var(ac), Term::Var(ad)) = (program.layout[0].charge[0], discharge[0]) else {
            panic!("expected variables at step 0");
        };
        assert_eq!(program.linear_cost[ac], SPLIT_PENALTY);
        assert_eq!(program.linear_cost[ad], -SPLIT_PENALTY);
    }

    #[test]
    fn projection_adds_one_target_variable_per_projected_step() {
        let mut problem = cost_problem(vec![vehicle(1, 0.5, 3)], 3);
        problem.objective = Objective::Project(ProposedAction::Step(vec![0.0, 0.1]));
        let program = compile(&problem).unwrap();
        assert_eq!(program.quadratic_diag.iter().filter(|d| **d == 2.0).count(), 1);
        assert!((program.objective_offset - 0.01).abs() < 1e-12);
    }
}
