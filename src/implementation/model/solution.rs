// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides `SolutionInfo`: the mutable derived state of one
//! candidate assignment. It carries, alongside the assignment vector itself,
//! all the aggregates the delta verifiers need to evaluate a move or an
//! exchange in O(|R| + |B|): per-machine usage and transient usage,
//! per-service presence counts at machine, location and neighborhood
//! granularity, moved-process counts and the five cost components.

use std::sync::Arc;

use crate::common::*;
use crate::implementation::model::problem::Problem;

/// The derived state of a candidate assignment. Every aggregate below is kept
/// consistent with the assignment vector by the committing verifiers; the
/// invariants are restated on each accessor and can be checked wholesale with
/// [`SolutionInfo::check`].
///
/// A `SolutionInfo` is cheap to discard and deliberately expensive to clone
/// (cloning is how heuristics snapshot their incumbent). The instance and the
/// initial assignment are shared immutably by every clone.
#[derive(Debug, Clone)]
pub struct SolutionInfo {
    problem: Arc<Problem>,
    initial: Arc<Assignment>,
    solution: Assignment,
    usage: Vec<Vec<u32>>,
    transient: Vec<Vec<u32>>,
    spread: Vec<u32>,
    bool_machine_presence: Vec<Vec<bool>>,
    machine_presence: Vec<Vec<u32>>,
    location_presence: Vec<Vec<u32>>,
    neighborhood_presence: Vec<Vec<u32>>,
    moved_processes: Vec<u32>,
    load_costs: Vec<u64>,
    balance_costs: Vec<u64>,
    process_move_cost: u64,
    service_move_cost: u64,
    machine_move_cost: u64,
}

impl SolutionInfo {
    /// Creates the state of the initial assignment itself. All move costs are
    /// zero in that case.
    pub fn new(problem: Arc<Problem>, initial: Arc<Assignment>) -> Self {
        assert_eq!(problem.process_count(), initial.len());
        let solution = initial.as_ref().clone();
        let mut info = Self::with_containers(problem, initial, solution);
        info.populate();
        info
    }

    /// Creates the state of an arbitrary assignment relative to the given
    /// initial one.
    pub fn from_assignment(
        problem: Arc<Problem>,
        initial: Arc<Assignment>,
        solution: Assignment,
    ) -> Self {
        assert_eq!(problem.process_count(), initial.len());
        assert_eq!(problem.process_count(), solution.len());
        let mut info = Self::with_containers(problem, initial, solution);
        info.populate();
        info.populate_move_costs();
        info
    }

    fn with_containers(
        problem: Arc<Problem>,
        initial: Arc<Assignment>,
        solution: Assignment,
    ) -> Self {
        let r_count = problem.resource_count();
        let m_count = problem.machine_count();
        let s_count = problem.service_count();
        let b_count = problem.balance_cost_count();
        let l_count = problem.location_count();
        let n_count = problem.neighborhood_count();
        SolutionInfo {
            problem,
            initial,
            solution,
            usage: vec![vec![0; r_count]; m_count],
            transient: vec![vec![0; r_count]; m_count],
            spread: vec![0; s_count],
            bool_machine_presence: vec![vec![false; m_count]; s_count],
            machine_presence: vec![vec![0; m_count]; s_count],
            location_presence: vec![vec![0; l_count]; s_count],
            neighborhood_presence: vec![vec![0; n_count]; s_count],
            moved_processes: vec![0; s_count],
            load_costs: vec![0; r_count],
            balance_costs: vec![0; b_count],
            process_move_cost: 0,
            service_move_cost: 0,
            machine_move_cost: 0,
        }
    }

    fn populate(&mut self) {
        let problem = Arc::clone(&self.problem);
        for p in 0..problem.process_count() {
            let m = self.solution[p];
            let process = &problem.processes()[p];
            let machine = &problem.machines()[m];
            for r in 0..problem.resource_count() {
                self.usage[m][r] += process.requirement(r);
            }
            let s = process.service;
            self.bool_machine_presence[s][m] = true;
            self.machine_presence[s][m] += 1;
            self.neighborhood_presence[s][machine.neighborhood] += 1;
            let lp = self.location_presence[s][machine.location];
            self.set_location_presence(s, machine.location, lp + 1);
        }
        for (m, machine) in problem.machines().iter().enumerate() {
            for r in 0..problem.resource_count() {
                self.load_costs[r] +=
                    load_cost(self.usage[m][r] as i64, machine.safety_capacity(r) as i64);
            }
            for (b, balance) in problem.balance_costs().iter().enumerate() {
                self.balance_costs[b] += balance_cost(
                    balance.target as i64,
                    machine.capacity(balance.resource1) as i64,
                    self.usage[m][balance.resource1] as i64,
                    machine.capacity(balance.resource2) as i64,
                    self.usage[m][balance.resource2] as i64,
                );
            }
        }
    }

    fn populate_move_costs(&mut self) {
        let problem = Arc::clone(&self.problem);
        self.process_move_cost = 0;
        self.machine_move_cost = 0;
        self.service_move_cost = 0;
        for p in 0..problem.process_count() {
            let m_initial = self.initial[p];
            let m = self.solution[p];
            if m_initial == m {
                continue;
            }
            let process = &problem.processes()[p];
            for &r in problem.transient_resources() {
                self.transient[m_initial][r] += process.requirement(r);
            }
            self.process_move_cost += process.movement_cost;
            self.machine_move_cost += problem.machine_move_cost(m_initial, m);
            self.moved_processes[process.service] += 1;
        }
        self.recompute_service_move_cost();
    }

    // ------------------------------------------------------------------------
    // --- SHARED CONTEXT -----------------------------------------------------
    // ------------------------------------------------------------------------

    pub fn problem(&self) -> &Problem {
        &self.problem
    }
    pub fn problem_handle(&self) -> Arc<Problem> {
        Arc::clone(&self.problem)
    }
    pub fn initial(&self) -> &[MachineId] {
        &self.initial
    }
    pub fn initial_handle(&self) -> Arc<Assignment> {
        Arc::clone(&self.initial)
    }
    pub fn solution(&self) -> &[MachineId] {
        &self.solution
    }

    // ------------------------------------------------------------------------
    // --- ACCESSORS ----------------------------------------------------------
    // ------------------------------------------------------------------------

    /// `usage[m][r] = sum of the requirements of r over the processes on m`.
    pub fn usage(&self, m: MachineId, r: ResourceId) -> u32 {
        self.usage[m][r]
    }
    /// The usage of `r` on `m` due to processes initially on `m` which have
    /// been moved somewhere else. Only nonzero for transient resources.
    pub fn transient(&self, m: MachineId, r: ResourceId) -> u32 {
        self.transient[m][r]
    }
    /// The number of distinct locations hosting at least one process of `s`.
    pub fn spread(&self, s: ServiceId) -> u32 {
        self.spread[s]
    }
    /// The number of processes of service `s` on machine `m`.
    pub fn machine_presence(&self, s: ServiceId, m: MachineId) -> u32 {
        self.machine_presence[s][m]
    }
    /// Whether any process of service `s` sits on machine `m`.
    pub fn bool_machine_presence(&self, s: ServiceId, m: MachineId) -> bool {
        self.bool_machine_presence[s][m]
    }
    /// The number of processes of service `s` in location `l`.
    pub fn location_presence(&self, s: ServiceId, l: LocationId) -> u32 {
        self.location_presence[s][l]
    }
    /// The number of processes of service `s` in neighborhood `n`.
    pub fn neighborhood_presence(&self, s: ServiceId, n: NeighborhoodId) -> u32 {
        self.neighborhood_presence[s][n]
    }
    /// The number of processes of `s` placed away from their initial machine.
    pub fn moved_processes(&self, s: ServiceId) -> u32 {
        self.moved_processes[s]
    }
    /// The unweighted load cost of resource `r`, summed over the machines.
    pub fn load_cost(&self, r: ResourceId) -> u64 {
        self.load_costs[r]
    }
    /// The unweighted value of balance term `b`, summed over the machines.
    pub fn balance_cost(&self, b: BalanceId) -> u64 {
        self.balance_costs[b]
    }
    /// The sum of the movement costs of the moved processes (unweighted).
    pub fn process_move_cost(&self) -> u64 {
        self.process_move_cost
    }
    /// The largest moved-process count over the services (unweighted).
    pub fn service_move_cost(&self) -> u64 {
        self.service_move_cost
    }
    /// The sum over all processes of the machine-move-cost table entries
    /// `(initial machine, current machine)` (unweighted).
    pub fn machine_move_cost(&self) -> u64 {
        self.machine_move_cost
    }

    // ------------------------------------------------------------------------
    // --- MUTATORS (used by the committing verifiers) ------------------------
    // ------------------------------------------------------------------------

    pub(crate) fn assign(&mut self, p: ProcessId, m: MachineId) {
        self.solution[p] = m;
    }
    pub(crate) fn set_usage(&mut self, m: MachineId, r: ResourceId, value: u32) {
        self.usage[m][r] = value;
    }
    pub(crate) fn set_transient(&mut self, m: MachineId, r: ResourceId, value: u32) {
        self.transient[m][r] = value;
    }
    pub(crate) fn set_machine_presence(&mut self, s: ServiceId, m: MachineId, value: u32) {
        self.machine_presence[s][m] = value;
    }
    pub(crate) fn set_bool_machine_presence(&mut self, s: ServiceId, m: MachineId, value: bool) {
        self.bool_machine_presence[s][m] = value;
    }
    /// Also maintains `spread[s]` when the presence toggles between zero and
    /// nonzero.
    pub(crate) fn set_location_presence(&mut self, s: ServiceId, l: LocationId, value: u32) {
        let old = self.location_presence[s][l];
        self.location_presence[s][l] = value;
        if old == 0 && value != 0 {
            self.spread[s] += 1;
        } else if old != 0 && value == 0 {
            self.spread[s] -= 1;
        }
    }
    pub(crate) fn set_neighborhood_presence(&mut self, s: ServiceId, n: NeighborhoodId, value: u32) {
        self.neighborhood_presence[s][n] = value;
    }
    pub(crate) fn set_moved_processes(&mut self, s: ServiceId, value: u32) {
        self.moved_processes[s] = value;
    }
    pub(crate) fn set_load_cost(&mut self, r: ResourceId, value: u64) {
        self.load_costs[r] = value;
    }
    pub(crate) fn set_balance_cost(&mut self, b: BalanceId, value: u64) {
        self.balance_costs[b] = value;
    }
    pub(crate) fn set_process_move_cost(&mut self, value: u64) {
        self.process_move_cost = value;
    }
    pub(crate) fn set_service_move_cost(&mut self, value: u64) {
        self.service_move_cost = value;
    }
    pub(crate) fn set_machine_move_cost(&mut self, value: u64) {
        self.machine_move_cost = value;
    }
    /// Recomputes the service move cost from the moved-process counts. Used
    /// by the batch verifier, which does not track the maximum incrementally.
    pub(crate) fn recompute_service_move_cost(&mut self) {
        self.service_move_cost = self.moved_processes.iter().copied().max().unwrap_or(0) as u64;
    }

    // ------------------------------------------------------------------------
    // --- OBJECTIVE ----------------------------------------------------------
    // ------------------------------------------------------------------------

    /// The weighted load cost, summed over the resources.
    pub fn total_load_cost(&self) -> u64 {
        self.problem
            .resources()
            .iter()
            .enumerate()
            .map(|(r, resource)| resource.weight_load_cost * self.load_costs[r])
            .sum()
    }
    /// The weighted balance cost, summed over the balance terms.
    pub fn total_balance_cost(&self) -> u64 {
        self.problem
            .balance_costs()
            .iter()
            .enumerate()
            .map(|(b, balance)| balance.weight * self.balance_costs[b])
            .sum()
    }
    /// The weighted sum of the three move-cost components.
    pub fn total_move_cost(&self) -> u64 {
        self.problem.weight_process_move_cost() * self.process_move_cost
            + self.problem.weight_service_move_cost() * self.service_move_cost
            + self.problem.weight_machine_move_cost() * self.machine_move_cost
    }
    /// The objective value of this assignment.
    pub fn objective(&self) -> u64 {
        self.total_load_cost() + self.total_balance_cost() + self.total_move_cost()
    }

    /// Rebuilds the state from scratch and compares: true iff every aggregate
    /// is consistent with the assignment vector. Debug aid, never on the hot
    /// path.
    pub fn check(&self) -> bool {
        let fresh = SolutionInfo::from_assignment(
            Arc::clone(&self.problem),
            Arc::clone(&self.initial),
            self.solution.clone(),
        );
        *self == fresh
    }
}

impl PartialEq for SolutionInfo {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.problem, &other.problem)
            && Arc::ptr_eq(&self.initial, &other.initial)
            && self.solution == other.solution
            && self.usage == other.usage
            && self.transient == other.transient
            && self.spread == other.spread
            && self.bool_machine_presence == other.bool_machine_presence
            && self.machine_presence == other.machine_presence
            && self.location_presence == other.location_presence
            && self.neighborhood_presence == other.neighborhood_presence
            && self.moved_processes == other.moved_processes
            && self.load_costs == other.load_costs
            && self.balance_costs == other.balance_costs
            && self.process_move_cost == other.process_move_cost
            && self.service_move_cost == other.service_move_cost
            && self.machine_move_cost == other.machine_move_cost
    }
}
impl Eq for SolutionInfo {}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_solution_info {
    use std::sync::Arc;

    use crate::*;

    // Two machines in different locations, one transient resource. Machine
    // capacities are 10 with safety 5; both processes require 6.
    fn two_location_values() -> Vec<u64> {
        vec![
            1, 1, 1, // one transient resource, weight 1
            2, // machines
            0, 0, 10, 5, 0, 1, //
            0, 1, 10, 5, 1, 0, //
            1, 1, 0, // one service, spread 1, no deps
            2, // processes
            0, 6, 4, //
            0, 6, 4, //
            0, // balance costs
            1, 10, 100, // weights
        ]
    }

    fn setup(initial: Vec<MachineId>) -> SolutionInfo {
        let pb = Arc::new(Problem::parse(&two_location_values()).unwrap());
        SolutionInfo::new(pb, Arc::new(initial))
    }

    #[test]
    fn initial_state_has_no_move_cost() {
        let info = setup(vec![0, 1]);
        assert_eq!(0, info.process_move_cost());
        assert_eq!(0, info.service_move_cost());
        assert_eq!(0, info.machine_move_cost());
        assert_eq!(0, info.total_move_cost());
    }

    #[test]
    fn usage_and_load_cost_follow_the_assignment() {
        let info = setup(vec![0, 1]);
        assert_eq!(6, info.usage(0, 0));
        assert_eq!(6, info.usage(1, 0));
        // each machine exceeds its safety capacity by one
        assert_eq!(2, info.load_cost(0));
        assert_eq!(2, info.objective());
    }

    #[test]
    fn presence_counts_follow_the_assignment() {
        let info = setup(vec![0, 1]);
        assert_eq!(1, info.machine_presence(0, 0));
        assert_eq!(1, info.machine_presence(0, 1));
        assert!(info.bool_machine_presence(0, 0));
        assert_eq!(1, info.location_presence(0, 0));
        assert_eq!(1, info.location_presence(0, 1));
        assert_eq!(2, info.spread(0));
    }

    #[test]
    fn from_assignment_accounts_for_moved_processes() {
        let pb = Arc::new(Problem::parse(&two_location_values()).unwrap());
        let initial = Arc::new(vec![0, 1]);
        let info = SolutionInfo::from_assignment(Arc::clone(&pb), initial, vec![1, 1]);
        assert_eq!(12, info.usage(1, 0));
        assert_eq!(0, info.usage(0, 0));
        // process 0 left its initial machine: transient usage stays on 0
        assert_eq!(6, info.transient(0, 0));
        assert_eq!(4, info.process_move_cost());
        assert_eq!(1, info.service_move_cost());
        assert_eq!(1, info.machine_move_cost());
        assert_eq!(1, info.moved_processes(0));
        // spread collapsed to a single location
        assert_eq!(1, info.spread(0));
    }

    #[test]
    fn objective_weights_every_component() {
        let pb = Arc::new(Problem::parse(&two_location_values()).unwrap());
        let initial = Arc::new(vec![0, 1]);
        let info = SolutionInfo::from_assignment(Arc::clone(&pb), initial, vec![1, 1]);
        // load: max(0, 12 - 5) = 7, weighted by 1
        // moves: 4 * 1 (process) + 1 * 10 (service) + 1 * 100 (machine)
        assert_eq!(7 + 4 + 10 + 100, info.objective());
    }

    #[test]
    fn check_validates_a_fresh_state() {
        let info = setup(vec![0, 1]);
        assert!(info.check());
    }

    #[test]
    fn clones_compare_equal() {
        let info = setup(vec![0, 1]);
        assert_eq!(info, info.clone());
    }
}
