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

//! This module provides the from-scratch solution verifier. It rebuilds the
//! complete derived state of an assignment and checks every constraint family
//! against it. It backs the driver's input validation, the analysis mode and
//! the debug-mode cross-checks of the delta verifiers -- it must never appear
//! in a steady-state search loop.

use std::sync::Arc;

use crate::common::*;
use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;

/// The outcome of a full verification: whether the assignment satisfies every
/// constraint, and its objective value when it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyResult {
    pub feasible: bool,
    pub objective: u64,
}

/// Checks the given assignment against all five constraint families --
/// capacity, transient capacity, conflict, spread and dependency -- and
/// evaluates the objective from scratch when all of them hold.
pub fn verify(
    problem: &Arc<Problem>,
    initial: &Arc<Assignment>,
    solution: &[MachineId],
) -> VerifyResult {
    let info = SolutionInfo::from_assignment(
        Arc::clone(problem),
        Arc::clone(initial),
        solution.to_vec(),
    );
    let feasible = feasible(&info);
    VerifyResult {
        feasible,
        objective: if feasible { info.objective() } else { 0 },
    }
}

/// Checks the spread and dependency families only. A capacity or conflict
/// violation in an input placement can be repaired by single moves, so the
/// driver tolerates those; a placement breaking the structural constraints
/// is rejected before the search starts.
pub fn structure_feasible(info: &SolutionInfo) -> bool {
    let problem = info.problem();
    for s in 0..problem.service_count() {
        if info.spread(s) < problem.services()[s].spread_min {
            return false;
        }
        for &s2 in problem.dependency().outgoing(s) {
            for n in 0..problem.neighborhood_count() {
                if info.neighborhood_presence(s, n) > 0 && info.neighborhood_presence(s2, n) == 0 {
                    return false;
                }
            }
        }
    }
    true
}

/// Checks the five constraint families on an already-built state.
pub fn feasible(info: &SolutionInfo) -> bool {
    let problem = info.problem();
    // capacity and transient capacity
    for m in 0..problem.machine_count() {
        let machine = &problem.machines()[m];
        for r in 0..problem.resource_count() {
            if info.usage(m, r) > machine.capacity(r) {
                return false;
            }
        }
        for &r in problem.transient_resources() {
            if info.usage(m, r) + info.transient(m, r) > machine.capacity(r) {
                return false;
            }
        }
    }
    for s in 0..problem.service_count() {
        // conflict: at most one process of a service per machine
        for m in 0..problem.machine_count() {
            if info.machine_presence(s, m) > 1 {
                return false;
            }
        }
        // spread
        if info.spread(s) < problem.services()[s].spread_min {
            return false;
        }
        // dependency: every neighborhood hosting s must host each of its
        // dependencies too
        for &s2 in problem.dependency().outgoing(s) {
            for n in 0..problem.neighborhood_count() {
                if info.neighborhood_presence(s, n) > 0 && info.neighborhood_presence(s2, n) == 0 {
                    return false;
                }
            }
        }
    }
    true
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_verifier {
    use std::sync::Arc;

    use crate::*;

    // 1 plain resource; 2 machines (locations 0 and 1, neighborhoods 0 and
    // 1); 2 services where service 0 depends on service 1; 1 process each.
    fn dependent_services() -> Arc<Problem> {
        let values = vec![
            1, 0, 1, // resource
            2, // machines
            0, 0, 10, 10, 0, 1, //
            1, 1, 10, 10, 1, 0, //
            2, // services
            1, 1, 1, // service 0 depends on service 1
            1, 0, // service 1
            2, // processes
            0, 3, 1, //
            1, 3, 1, //
            0, // balance costs
            1, 1, 1,
        ];
        Arc::new(Problem::parse(&values).unwrap())
    }

    #[test]
    fn colocated_dependency_is_feasible() {
        let pb = dependent_services();
        let initial = Arc::new(vec![0, 0]);
        let result = verify(&pb, &initial, &[0, 0]);
        assert!(result.feasible);
        assert_eq!(0, result.objective);
    }

    #[test]
    fn split_dependency_is_infeasible() {
        let pb = dependent_services();
        let initial = Arc::new(vec![0, 0]);
        // process of service 0 in neighborhood 0, its dependency in 1
        let result = verify(&pb, &initial, &[0, 1]);
        assert!(!result.feasible);
    }

    #[test]
    fn conflicting_processes_are_infeasible() {
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 10, 10, 0, 1, //
            0, 0, 10, 10, 1, 0, //
            1, 1, 0, // one service with two processes
            2, //
            0, 3, 5, //
            0, 3, 5, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let initial = Arc::new(vec![0, 0]);
        assert!(!verify(&pb, &initial, &[0, 0]).feasible);
        let split = verify(&pb, &initial, &[0, 1]);
        assert!(split.feasible);
        // process move 5 + service move 1 + machine move 1
        assert_eq!(7, split.objective);
    }

    #[test]
    fn overloaded_machine_is_infeasible() {
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 5, 5, 0, 1, //
            0, 0, 5, 5, 1, 0, //
            2, 1, 0, 1, 0, // two singleton services
            2, //
            0, 3, 1, //
            1, 3, 1, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let initial = Arc::new(vec![0, 1]);
        assert!(verify(&pb, &initial, &[0, 1]).feasible);
        assert!(!verify(&pb, &initial, &[0, 0]).feasible);
    }

    #[test]
    fn structural_check_flags_spread_but_tolerates_conflict() {
        // two machines in two locations, one service with spread_min = 2
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 10, 10, 0, 1, //
            1, 1, 10, 10, 1, 0, //
            1, 2, 0, //
            2, //
            0, 3, 1, //
            0, 3, 1, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let initial = Arc::new(vec![0, 0]);
        // stacked on one machine: the conflict is repairable, the missing
        // spread is not
        let stacked = SolutionInfo::new(Arc::clone(&pb), Arc::clone(&initial));
        assert!(!structure_feasible(&stacked));
        let split = SolutionInfo::from_assignment(pb, initial, vec![0, 1]);
        assert!(structure_feasible(&split));
    }

    #[test]
    fn transient_usage_counts_on_the_initial_machine() {
        // one transient resource, both processes require 6, capacity 10:
        // moving a process away keeps its 6 units allocated on machine 0, so
        // moving the second process onto machine 0 must be rejected by the
        // transient check even though plain usage would fit.
        let values = vec![
            1, 1, 1, //
            2, //
            0, 0, 10, 10, 0, 1, //
            0, 0, 10, 10, 1, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 6, 1, //
            1, 6, 1, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let initial = Arc::new(vec![0, 1]);
        assert!(verify(&pb, &initial, &[0, 1]).feasible);
        assert!(!verify(&pb, &initial, &[1, 0]).feasible);
    }
}
