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

//! This module provides the single-move delta engine: given a feasible
//! solution state, it decides in O(|R| + |B|) whether reassigning one process
//! keeps the solution feasible, what the new objective would be, and applies
//! the change in place when asked to.

use crate::common::*;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::verifiers::cost_diff::CostDiff;

/// The delta verifier for single-process moves. It owns only scratch buffers;
/// the solution state is handed to each call, so one verifier can serve both
/// a move and an exchange loop over the same state.
#[derive(Debug)]
pub struct MoveVerifier {
    diff: CostDiff,
}

impl MoveVerifier {
    pub fn new(x: &SolutionInfo) -> Self {
        MoveVerifier { diff: CostDiff::new(x.problem()) }
    }

    /// Checks whether applying `mv` to `x` leads to a feasible solution,
    /// assuming `x` itself is feasible. A self-move is trivially feasible.
    pub fn feasible(&self, x: &SolutionInfo, mv: Move) -> bool {
        if mv.src == mv.dst {
            return true;
        }
        let problem = x.problem();
        let Move { p, src, dst } = mv;
        let process = &problem.processes()[p];
        let s = process.service;
        let src_machine = &problem.machines()[src];
        let dst_machine = &problem.machines()[dst];
        // capacity constraints
        for &r in problem.non_transient_resources() {
            if x.usage(dst, r) + process.requirement(r) > dst_machine.capacity(r) {
                return false;
            }
        }
        // transient capacity constraints: a process returning to its initial
        // machine is already accounted for in the transient usage there
        let back_to_initial = dst == x.initial()[p];
        for &r in problem.transient_resources() {
            let delta = if back_to_initial { 0 } else { process.requirement(r) };
            if x.usage(dst, r) + x.transient(dst, r) + delta > dst_machine.capacity(r) {
                return false;
            }
        }
        if !problem.service_has_single_process(s) {
            // conflict constraints
            if x.bool_machine_presence(s, dst) {
                return false;
            }
            // spread constraints
            let lsrc = src_machine.location;
            let ldst = dst_machine.location;
            if lsrc != ldst
                && problem.services()[s].spread_min == x.spread(s)
                && x.location_presence(s, lsrc) == 1
                && x.location_presence(s, ldst) != 0
            {
                return false;
            }
        }
        // dependency and reverse dependency constraints
        let nsrc = src_machine.neighborhood;
        let ndst = dst_machine.neighborhood;
        if nsrc != ndst {
            if !problem.service_has_no_out_dependency(s) {
                for &s2 in problem.dependency().outgoing(s) {
                    if x.neighborhood_presence(s2, ndst) == 0 {
                        return false;
                    }
                }
            }
            if !problem.service_has_no_in_dependency(s) && x.neighborhood_presence(s, nsrc) == 1 {
                for &s1 in problem.dependency().incoming(s) {
                    if x.neighborhood_presence(s1, nsrc) > 0 {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// The objective value `x` would have after `mv`, without mutating `x`.
    pub fn objective(&mut self, x: &SolutionInfo, mv: Move) -> u64 {
        if mv.src == mv.dst {
            return x.objective();
        }
        self.compute(x, mv);
        self.diff.objective(x)
    }

    /// Applies `mv` to `x`, updating the assignment, every aggregate and
    /// every cost component. A self-move commits nothing.
    pub fn commit(&mut self, x: &mut SolutionInfo, mv: Move) {
        if mv.src == mv.dst {
            return;
        }
        self.compute(x, mv);
        let problem = x.problem_handle();
        let Move { p, src, dst } = mv;
        let process = &problem.processes()[p];
        let s = process.service;
        let src_machine = &problem.machines()[src];
        let dst_machine = &problem.machines()[dst];
        let initial = x.initial()[p];
        x.assign(p, dst);
        for r in 0..problem.resource_count() {
            x.set_usage(src, r, x.usage(src, r) - process.requirement(r));
            x.set_usage(dst, r, x.usage(dst, r) + process.requirement(r));
        }
        for &r in problem.transient_resources() {
            if initial == src {
                x.set_transient(initial, r, x.transient(initial, r) + process.requirement(r));
            }
            if initial == dst {
                x.set_transient(initial, r, x.transient(initial, r) - process.requirement(r));
            }
        }
        x.set_bool_machine_presence(s, src, false);
        x.set_bool_machine_presence(s, dst, true);
        x.set_machine_presence(s, src, x.machine_presence(s, src) - 1);
        x.set_machine_presence(s, dst, x.machine_presence(s, dst) + 1);
        x.set_location_presence(s, src_machine.location, x.location_presence(s, src_machine.location) - 1);
        x.set_location_presence(s, dst_machine.location, x.location_presence(s, dst_machine.location) + 1);
        x.set_neighborhood_presence(s, src_machine.neighborhood, x.neighborhood_presence(s, src_machine.neighborhood) - 1);
        x.set_neighborhood_presence(s, dst_machine.neighborhood, x.neighborhood_presence(s, dst_machine.neighborhood) + 1);
        if initial == src {
            x.set_moved_processes(s, x.moved_processes(s) + 1);
        }
        if initial == dst {
            x.set_moved_processes(s, x.moved_processes(s) - 1);
        }
        self.diff.apply(x);
    }

    fn compute(&mut self, x: &SolutionInfo, mv: Move) {
        self.diff.reset();
        self.compute_load(x, mv);
        self.compute_balance(x, mv);
        self.compute_process_move(x, mv);
        self.compute_service_move(x, mv);
        self.compute_machine_move(x, mv);
    }

    fn compute_load(&mut self, x: &SolutionInfo, mv: Move) {
        let problem = x.problem();
        let process = &problem.processes()[mv.p];
        let src_machine = &problem.machines()[mv.src];
        let dst_machine = &problem.machines()[mv.dst];
        for r in 0..problem.resource_count() {
            let req = process.requirement(r) as i64;
            let u_src = x.usage(mv.src, r) as i64;
            let u_dst = x.usage(mv.dst, r) as i64;
            let sc_src = src_machine.safety_capacity(r) as i64;
            let sc_dst = dst_machine.safety_capacity(r) as i64;
            let old = load_cost(u_src, sc_src) + load_cost(u_dst, sc_dst);
            let new = load_cost(u_src - req, sc_src) + load_cost(u_dst + req, sc_dst);
            self.diff.load[r] = new as i64 - old as i64;
        }
    }

    fn compute_balance(&mut self, x: &SolutionInfo, mv: Move) {
        let problem = x.problem();
        let process = &problem.processes()[mv.p];
        let src_machine = &problem.machines()[mv.src];
        let dst_machine = &problem.machines()[mv.dst];
        for (b, balance) in problem.balance_costs().iter().enumerate() {
            let (r1, r2) = (balance.resource1, balance.resource2);
            let (req1, req2) = (process.requirement(r1) as i64, process.requirement(r2) as i64);
            let target = balance.target as i64;
            let (cap_s1, cap_s2) =
                (src_machine.capacity(r1) as i64, src_machine.capacity(r2) as i64);
            let (cap_d1, cap_d2) =
                (dst_machine.capacity(r1) as i64, dst_machine.capacity(r2) as i64);
            let (u_s1, u_s2) = (x.usage(mv.src, r1) as i64, x.usage(mv.src, r2) as i64);
            let (u_d1, u_d2) = (x.usage(mv.dst, r1) as i64, x.usage(mv.dst, r2) as i64);
            let src_old = balance_cost(target, cap_s1, u_s1, cap_s2, u_s2);
            let src_new = balance_cost(target, cap_s1, u_s1 - req1, cap_s2, u_s2 - req2);
            let dst_old = balance_cost(target, cap_d1, u_d1, cap_d2, u_d2);
            let dst_new = balance_cost(target, cap_d1, u_d1 + req1, cap_d2, u_d2 + req2);
            self.diff.balance[b] =
                src_new as i64 - src_old as i64 + dst_new as i64 - dst_old as i64;
        }
    }

    fn compute_process_move(&mut self, x: &SolutionInfo, mv: Move) {
        let cost = x.problem().processes()[mv.p].movement_cost as i64;
        let initial = x.initial()[mv.p];
        if initial == mv.src {
            self.diff.process_move = cost;
        }
        if initial == mv.dst {
            self.diff.process_move -= cost;
        }
    }

    fn compute_service_move(&mut self, x: &SolutionInfo, mv: Move) {
        let problem = x.problem();
        let s = problem.processes()[mv.p].service;
        let initial = x.initial()[mv.p];
        let smc = x.service_move_cost();
        if initial == mv.src {
            // the service reached the maximum moved count: one more move
            // raises the maximum by one
            if x.moved_processes(s) as u64 == smc {
                self.diff.service_move = 1;
            }
        }
        if initial == mv.dst && x.moved_processes(s) as u64 == smc {
            // the maximum only drops when no other service matches it
            let tied = (0..problem.service_count())
                .any(|other| other != s && x.moved_processes(other) as u64 == smc);
            if !tied {
                self.diff.service_move = -1;
            }
        }
    }

    fn compute_machine_move(&mut self, x: &SolutionInfo, mv: Move) {
        let problem = x.problem();
        let initial = x.initial()[mv.p];
        self.diff.machine_move = problem.machine_move_cost(initial, mv.dst) as i64
            - problem.machine_move_cost(initial, mv.src) as i64;
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_move_verifier {
    use std::sync::Arc;

    use crate::*;

    // 1 resource (weight 1); 2 machines capacity 10 / safety 10 with unit
    // move costs; 1 service with 2 processes (req 3, movement cost 5);
    // weights (1, 1, 1).
    fn conflict_instance() -> (Arc<Problem>, Arc<Assignment>) {
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 10, 10, 0, 1, //
            0, 0, 10, 10, 1, 0, //
            1, 1, 0, //
            2, //
            0, 3, 5, //
            0, 3, 5, //
            0, //
            1, 1, 1,
        ];
        (Arc::new(Problem::parse(&values).unwrap()), Arc::new(vec![0, 1]))
    }

    #[test]
    fn self_move_is_a_feasible_no_op() {
        let (pb, initial) = conflict_instance();
        let mut x = SolutionInfo::new(pb, initial);
        let mut mv = MoveVerifier::new(&x);
        let noop = Move::new(0, 0, 0);
        assert!(mv.feasible(&x, noop));
        assert_eq!(x.objective(), mv.objective(&x, noop));
        let before = x.clone();
        mv.commit(&mut x, noop);
        assert_eq!(before, x);
    }

    #[test]
    fn conflict_is_rejected() {
        let (pb, initial) = conflict_instance();
        let x = SolutionInfo::new(pb, initial);
        let mv = MoveVerifier::new(&x);
        // both processes belong to the same service: stacking them on one
        // machine violates the conflict constraint
        assert!(!mv.feasible(&x, Move::new(0, 0, 1)));
    }

    #[test]
    fn capacity_is_rejected() {
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 5, 5, 0, 1, //
            0, 0, 5, 5, 1, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 3, 1, //
            1, 3, 1, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let x = SolutionInfo::new(pb, Arc::new(vec![0, 1]));
        let mv = MoveVerifier::new(&x);
        assert!(!mv.feasible(&x, Move::new(0, 0, 1)));
    }

    #[test]
    fn objective_matches_a_recomputation_after_commit() {
        let (pb, initial) = conflict_instance();
        let mut x = SolutionInfo::from_assignment(
            Arc::clone(&pb),
            Arc::clone(&initial),
            vec![0, 0],
        );
        let mut mv = MoveVerifier::new(&x);
        let fix = Move::new(1, 0, 1);
        assert!(mv.feasible(&x, fix));
        let predicted = mv.objective(&x, fix);
        mv.commit(&mut x, fix);
        assert_eq!(predicted, x.objective());
        assert!(x.check());
        // process 1 went back to its initial machine: the assignment is the
        // initial one again and every move cost vanished
        assert_eq!(0, x.objective());
    }

    #[test]
    fn commit_then_reverse_restores_the_state() {
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 10, 10, 0, 1, //
            0, 0, 10, 10, 1, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 3, 5, //
            1, 3, 7, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let mut x = SolutionInfo::new(pb, Arc::new(vec![0, 1]));
        let mut mv = MoveVerifier::new(&x);
        let before = x.clone();
        let step = Move::new(0, 0, 1);
        assert!(mv.feasible(&x, step));
        mv.commit(&mut x, step);
        assert_ne!(before, x);
        mv.commit(&mut x, step.reverse());
        assert_eq!(before, x);
    }

    #[test]
    fn leaving_the_initial_machine_costs_the_movement_price() {
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 10, 10, 0, 2, //
            0, 0, 10, 10, 2, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 3, 5, //
            1, 3, 7, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let mut x = SolutionInfo::new(pb, Arc::new(vec![0, 1]));
        let mut mv = MoveVerifier::new(&x);
        let away = Move::new(0, 0, 1);
        assert!(mv.feasible(&x, away));
        // process move 5 + service move 1 + machine move 2
        assert_eq!(8, mv.objective(&x, away));
        mv.commit(&mut x, away);
        assert_eq!(8, x.objective());
        // returning wipes all three components
        let back = Move::new(0, 1, 0);
        assert_eq!(0, mv.objective(&x, back));
        mv.commit(&mut x, back);
        assert_eq!(0, x.objective());
        assert!(x.check());
    }
}
