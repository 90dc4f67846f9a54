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

//! This module provides the two-process exchange delta engine. It is
//! logically an ordered pair of moves, but the feasibility checks and cost
//! deltas must account for both processes at once: each machine loses one
//! requirement profile and gains the other, and the dependency checks must be
//! aware that the counterpart service enters the neighborhood the other one
//! may be leaving.

use crate::common::*;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::verifiers::cost_diff::CostDiff;

/// The delta verifier for exchanges. Owns only scratch buffers; the solution
/// state is handed to each call.
#[derive(Debug)]
pub struct ExchangeVerifier {
    diff: CostDiff,
}

impl ExchangeVerifier {
    pub fn new(x: &SolutionInfo) -> Self {
        ExchangeVerifier { diff: CostDiff::new(x.problem()) }
    }

    /// Checks whether applying `ex` to `x` leads to a feasible solution,
    /// assuming `x` itself is feasible. Degenerate exchanges (same process or
    /// same machine) are trivially feasible.
    pub fn feasible(&self, x: &SolutionInfo, ex: Exchange) -> bool {
        if ex.p1 == ex.p2 || ex.m1 == ex.m2 {
            return true;
        }
        let problem = x.problem();
        let Exchange { m1, p1, m2, p2 } = ex;
        let process1 = &problem.processes()[p1];
        let process2 = &problem.processes()[p2];
        let s1 = process1.service;
        let s2 = process2.service;
        let machine1 = &problem.machines()[m1];
        let machine2 = &problem.machines()[m2];
        // capacity constraints: each machine swaps one requirement profile
        // for the other
        for &r in problem.non_transient_resources() {
            let req1 = process1.requirement(r) as i64;
            let req2 = process2.requirement(r) as i64;
            if x.usage(m1, r) as i64 - req1 + req2 > machine1.capacity(r) as i64 {
                return false;
            }
            if x.usage(m2, r) as i64 - req2 + req1 > machine2.capacity(r) as i64 {
                return false;
            }
        }
        // transient capacity constraints: a requirement only joins (or
        // leaves) the transient total when the machine is not the initial
        // machine of the process concerned
        let from_initial1 = m1 == x.initial()[p1];
        let from_initial2 = m2 == x.initial()[p2];
        let to_initial1 = m2 == x.initial()[p1];
        let to_initial2 = m1 == x.initial()[p2];
        for &r in problem.transient_resources() {
            let req1 = process1.requirement(r) as i64;
            let req2 = process2.requirement(r) as i64;
            let tu1 = x.usage(m1, r) as i64 + x.transient(m1, r) as i64
                - if from_initial1 { 0 } else { req1 }
                + if to_initial2 { 0 } else { req2 };
            if tu1 > machine1.capacity(r) as i64 {
                return false;
            }
            let tu2 = x.usage(m2, r) as i64 + x.transient(m2, r) as i64
                - if from_initial2 { 0 } else { req2 }
                + if to_initial1 { 0 } else { req1 };
            if tu2 > machine2.capacity(r) as i64 {
                return false;
            }
        }
        // processes of the same service trade places: no conflict, spread or
        // dependency violation is possible
        if s1 == s2 {
            return true;
        }
        let l1 = machine1.location;
        let l2 = machine2.location;
        if !problem.service_has_single_process(s1) {
            if x.bool_machine_presence(s1, m2) {
                return false;
            }
            if l1 != l2
                && x.spread(s1) == problem.services()[s1].spread_min
                && x.location_presence(s1, l1) == 1
                && x.location_presence(s1, l2) != 0
            {
                return false;
            }
        }
        if !problem.service_has_single_process(s2) {
            if x.bool_machine_presence(s2, m1) {
                return false;
            }
            if l1 != l2
                && x.spread(s2) == problem.services()[s2].spread_min
                && x.location_presence(s2, l2) == 1
                && x.location_presence(s2, l1) != 0
            {
                return false;
            }
        }
        let n1 = machine1.neighborhood;
        let n2 = machine2.neighborhood;
        if n1 != n2 {
            if !self.check_dependency(x, s1, s2, n1, n2) {
                return false;
            }
            if !self.check_dependency(x, s2, s1, n2, n1) {
                return false;
            }
        }
        true
    }

    /// Checks the dependency constraints of service `s` moving from `nsrc`
    /// to `ndst`, knowing that service `other` simultaneously moves in the
    /// opposite direction.
    fn check_dependency(
        &self,
        x: &SolutionInfo,
        s: ServiceId,
        other: ServiceId,
        nsrc: NeighborhoodId,
        ndst: NeighborhoodId,
    ) -> bool {
        let problem = x.problem();
        if !problem.service_has_no_out_dependency(s) {
            for &s2 in problem.dependency().outgoing(s) {
                // no process of the dependency is in the target neighborhood
                if x.neighborhood_presence(s2, ndst) == 0 {
                    return false;
                }
                // its only process there is the one being traded away
                if s2 == other && x.neighborhood_presence(s2, ndst) == 1 {
                    return false;
                }
            }
        }
        if !problem.service_has_no_in_dependency(s) && x.neighborhood_presence(s, nsrc) == 1 {
            // s is about to vanish from nsrc: no dependent process may remain
            for &s1 in problem.dependency().incoming(s) {
                if x.neighborhood_presence(s1, nsrc) > 1 {
                    return false;
                }
                if s1 != other && x.neighborhood_presence(s1, nsrc) == 1 {
                    return false;
                }
            }
        }
        true
    }

    /// The objective value `x` would have after `ex`, without mutating `x`.
    pub fn objective(&mut self, x: &SolutionInfo, ex: Exchange) -> u64 {
        if ex.p1 == ex.p2 || ex.m1 == ex.m2 {
            return x.objective();
        }
        self.compute(x, ex);
        self.diff.objective(x)
    }

    /// Applies `ex` to `x`. Degenerate exchanges commit nothing.
    pub fn commit(&mut self, x: &mut SolutionInfo, ex: Exchange) {
        debug_assert_ne!(ex.p1, ex.p2);
        if ex.p1 == ex.p2 || ex.m1 == ex.m2 {
            return;
        }
        self.compute(x, ex);
        let problem = x.problem_handle();
        let Exchange { m1, p1, m2, p2 } = ex;
        let process1 = &problem.processes()[p1];
        let process2 = &problem.processes()[p2];
        let machine1 = &problem.machines()[m1];
        let machine2 = &problem.machines()[m2];
        let im1 = x.initial()[p1];
        let im2 = x.initial()[p2];
        x.assign(p1, m2);
        x.assign(p2, m1);
        for r in 0..problem.resource_count() {
            let req1 = process1.requirement(r);
            let req2 = process2.requirement(r);
            x.set_usage(m1, r, x.usage(m1, r) - req1 + req2);
            x.set_usage(m2, r, x.usage(m2, r) - req2 + req1);
        }
        for &r in problem.transient_resources() {
            let req1 = process1.requirement(r) as i64;
            let req2 = process2.requirement(r) as i64;
            let mut delta1 = 0;
            let mut delta2 = 0;
            if m1 == im1 {
                // process 1 leaves its initial machine
                delta1 += req1;
            }
            if m2 == im2 {
                delta2 += req2;
            }
            if m2 == im1 {
                // process 1 comes back to its initial machine
                delta2 -= req1;
            }
            if m1 == im2 {
                delta1 -= req2;
            }
            if delta1 != 0 {
                x.set_transient(m1, r, (x.transient(m1, r) as i64 + delta1) as u32);
            }
            if delta2 != 0 {
                x.set_transient(m2, r, (x.transient(m2, r) as i64 + delta2) as u32);
            }
        }
        let s1 = process1.service;
        let s2 = process2.service;
        if s1 != s2 {
            x.set_bool_machine_presence(s1, m1, false);
            x.set_bool_machine_presence(s1, m2, true);
            x.set_bool_machine_presence(s2, m1, true);
            x.set_bool_machine_presence(s2, m2, false);
            x.set_machine_presence(s1, m1, x.machine_presence(s1, m1) - 1);
            x.set_machine_presence(s1, m2, x.machine_presence(s1, m2) + 1);
            x.set_machine_presence(s2, m1, x.machine_presence(s2, m1) + 1);
            x.set_machine_presence(s2, m2, x.machine_presence(s2, m2) - 1);
            let l1 = machine1.location;
            let l2 = machine2.location;
            if l1 != l2 {
                x.set_location_presence(s1, l1, x.location_presence(s1, l1) - 1);
                x.set_location_presence(s1, l2, x.location_presence(s1, l2) + 1);
                x.set_location_presence(s2, l1, x.location_presence(s2, l1) + 1);
                x.set_location_presence(s2, l2, x.location_presence(s2, l2) - 1);
            }
            let n1 = machine1.neighborhood;
            let n2 = machine2.neighborhood;
            if n1 != n2 {
                x.set_neighborhood_presence(s1, n1, x.neighborhood_presence(s1, n1) - 1);
                x.set_neighborhood_presence(s1, n2, x.neighborhood_presence(s1, n2) + 1);
                x.set_neighborhood_presence(s2, n1, x.neighborhood_presence(s2, n1) + 1);
                x.set_neighborhood_presence(s2, n2, x.neighborhood_presence(s2, n2) - 1);
            }
        }
        let mut delta_moved1 = 0i64;
        if m1 == im1 {
            delta_moved1 = 1;
        } else if m2 == im1 {
            delta_moved1 = -1;
        }
        x.set_moved_processes(s1, (x.moved_processes(s1) as i64 + delta_moved1) as u32);
        let mut delta_moved2 = 0i64;
        if m2 == im2 {
            delta_moved2 = 1;
        } else if m1 == im2 {
            delta_moved2 = -1;
        }
        x.set_moved_processes(s2, (x.moved_processes(s2) as i64 + delta_moved2) as u32);
        self.diff.apply(x);
    }

    fn compute(&mut self, x: &SolutionInfo, ex: Exchange) {
        self.diff.reset();
        self.compute_load(x, ex);
        self.compute_balance(x, ex);
        self.compute_process_move(x, ex);
        self.compute_service_move(x, ex);
        self.compute_machine_move(x, ex);
    }

    fn compute_load(&mut self, x: &SolutionInfo, ex: Exchange) {
        let problem = x.problem();
        let process1 = &problem.processes()[ex.p1];
        let process2 = &problem.processes()[ex.p2];
        let machine1 = &problem.machines()[ex.m1];
        let machine2 = &problem.machines()[ex.m2];
        for r in 0..problem.resource_count() {
            let req1 = process1.requirement(r) as i64;
            let req2 = process2.requirement(r) as i64;
            let u1 = x.usage(ex.m1, r) as i64;
            let u2 = x.usage(ex.m2, r) as i64;
            let sc1 = machine1.safety_capacity(r) as i64;
            let sc2 = machine2.safety_capacity(r) as i64;
            let old = load_cost(u1, sc1) + load_cost(u2, sc2);
            let new = load_cost(u1 + req2 - req1, sc1) + load_cost(u2 + req1 - req2, sc2);
            self.diff.load[r] = new as i64 - old as i64;
        }
    }

    fn compute_balance(&mut self, x: &SolutionInfo, ex: Exchange) {
        let problem = x.problem();
        let process1 = &problem.processes()[ex.p1];
        let process2 = &problem.processes()[ex.p2];
        let machine1 = &problem.machines()[ex.m1];
        let machine2 = &problem.machines()[ex.m2];
        for (b, balance) in problem.balance_costs().iter().enumerate() {
            let (r1, r2) = (balance.resource1, balance.resource2);
            let target = balance.target as i64;
            let req1r1 = process1.requirement(r1) as i64;
            let req1r2 = process1.requirement(r2) as i64;
            let req2r1 = process2.requirement(r1) as i64;
            let req2r2 = process2.requirement(r2) as i64;
            let u1r1 = x.usage(ex.m1, r1) as i64;
            let u1r2 = x.usage(ex.m1, r2) as i64;
            let u2r1 = x.usage(ex.m2, r1) as i64;
            let u2r2 = x.usage(ex.m2, r2) as i64;
            let (cap11, cap12) = (machine1.capacity(r1) as i64, machine1.capacity(r2) as i64);
            let (cap21, cap22) = (machine2.capacity(r1) as i64, machine2.capacity(r2) as i64);
            let old_bc1 = balance_cost(target, cap11, u1r1, cap12, u1r2);
            let old_bc2 = balance_cost(target, cap21, u2r1, cap22, u2r2);
            let new_bc1 = balance_cost(
                target,
                cap11,
                u1r1 + req2r1 - req1r1,
                cap12,
                u1r2 + req2r2 - req1r2,
            );
            let new_bc2 = balance_cost(
                target,
                cap21,
                u2r1 + req1r1 - req2r1,
                cap22,
                u2r2 + req1r2 - req2r2,
            );
            self.diff.balance[b] =
                new_bc1 as i64 - old_bc1 as i64 + new_bc2 as i64 - old_bc2 as i64;
        }
    }

    fn compute_process_move(&mut self, x: &SolutionInfo, ex: Exchange) {
        let problem = x.problem();
        let mc1 = problem.processes()[ex.p1].movement_cost as i64;
        let mc2 = problem.processes()[ex.p2].movement_cost as i64;
        let mi1 = x.initial()[ex.p1];
        let mi2 = x.initial()[ex.p2];
        if ex.m1 == mi1 {
            self.diff.process_move += mc1;
        } else if ex.m2 == mi1 {
            self.diff.process_move -= mc1;
        }
        if ex.m2 == mi2 {
            self.diff.process_move += mc2;
        } else if ex.m1 == mi2 {
            self.diff.process_move -= mc2;
        }
    }

    // The service move cost is max_s moved_processes[s]; the delta follows
    // from the signed change of the moved counts of the one or two services
    // involved. A decrease at the maximum forces a rescan, capped at the
    // current maximum.
    fn compute_service_move(&mut self, x: &SolutionInfo, ex: Exchange) {
        let problem = x.problem();
        let s1 = problem.processes()[ex.p1].service;
        let s2 = problem.processes()[ex.p2].service;
        let mi1 = x.initial()[ex.p1];
        let mi2 = x.initial()[ex.p2];
        let smc = x.service_move_cost() as i64;
        if s1 == s2 {
            let mut delta = 0i64;
            if ex.m1 == mi1 {
                delta += 1;
            }
            if ex.m2 == mi2 {
                delta += 1;
            }
            if ex.m2 == mi1 {
                delta -= 1;
            }
            if ex.m1 == mi2 {
                delta -= 1;
            }
            let moved = x.moved_processes(s1) as i64;
            if delta > 0 && moved + delta > smc {
                self.diff.service_move = moved + delta - smc;
            } else if delta < 0 && moved == smc {
                let mut max = moved + delta;
                for s in 0..problem.service_count() {
                    if s != s1 {
                        max = max.max(x.moved_processes(s) as i64);
                    }
                    if max == smc {
                        break;
                    }
                }
                self.diff.service_move = max - smc;
            }
        } else {
            let mut delta1 = 0i64;
            let mut delta2 = 0i64;
            if ex.m1 == mi1 {
                delta1 += 1;
            }
            if ex.m2 == mi2 {
                delta2 += 1;
            }
            if ex.m2 == mi1 {
                delta1 -= 1;
            }
            if ex.m1 == mi2 {
                delta2 -= 1;
            }
            let moved1 = x.moved_processes(s1) as i64;
            let moved2 = x.moved_processes(s2) as i64;
            let mut increased = false;
            if (delta1 > 0 || delta2 > 0) && (moved1 + delta1).max(moved2 + delta2) > smc {
                // one service overtakes the maximum, by one at most
                self.diff.service_move = 1;
                increased = true;
            }
            if !increased && ((delta1 < 0 && moved1 == smc) || (delta2 < 0 && moved2 == smc)) {
                let mut max = 0i64;
                for s in 0..problem.service_count() {
                    let delta = if s == s1 {
                        delta1
                    } else if s == s2 {
                        delta2
                    } else {
                        0
                    };
                    max = max.max(x.moved_processes(s) as i64 + delta);
                    if max == smc {
                        break;
                    }
                }
                self.diff.service_move = max - smc;
            }
        }
    }

    fn compute_machine_move(&mut self, x: &SolutionInfo, ex: Exchange) {
        let problem = x.problem();
        let im1 = x.initial()[ex.p1];
        let im2 = x.initial()[ex.p2];
        self.diff.machine_move = problem.machine_move_cost(im1, ex.m2) as i64
            - problem.machine_move_cost(im1, ex.m1) as i64
            + problem.machine_move_cost(im2, ex.m1) as i64
            - problem.machine_move_cost(im2, ex.m2) as i64;
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_exchange_verifier {
    use std::sync::Arc;

    use crate::*;

    // 2 resources; 2 machines (capacity [10, 10], safety [4, 4]); 2 singleton
    // services; the processes have opposite requirement profiles so that an
    // exchange changes the load distribution.
    fn two_profiles() -> (Arc<Problem>, Arc<Assignment>) {
        let values = vec![
            2, 0, 1, 0, 1, //
            2, //
            0, 0, 10, 10, 4, 4, 0, 2, //
            0, 0, 10, 10, 4, 4, 2, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 6, 1, 3, //
            1, 1, 6, 3, //
            0, //
            1, 1, 1,
        ];
        (Arc::new(Problem::parse(&values).unwrap()), Arc::new(vec![0, 1]))
    }

    #[test]
    fn degenerate_exchanges_are_feasible_no_ops() {
        let (pb, initial) = two_profiles();
        let mut x = SolutionInfo::new(pb, initial);
        let mut ev = ExchangeVerifier::new(&x);
        let same_machine = Exchange::new(0, 0, 0, 1);
        assert!(ev.feasible(&x, same_machine));
        assert_eq!(x.objective(), ev.objective(&x, same_machine));
        let before = x.clone();
        ev.commit(&mut x, same_machine);
        assert_eq!(before, x);
    }

    #[test]
    fn objective_matches_a_recomputation_after_commit() {
        let (pb, initial) = two_profiles();
        let mut x = SolutionInfo::new(pb, initial);
        let mut ev = ExchangeVerifier::new(&x);
        let swap = Exchange::new(0, 0, 1, 1);
        assert!(ev.feasible(&x, swap));
        let predicted = ev.objective(&x, swap);
        ev.commit(&mut x, swap);
        assert_eq!(predicted, x.objective());
        assert!(x.check());
    }

    #[test]
    fn commit_then_reverse_restores_the_state() {
        let (pb, initial) = two_profiles();
        let mut x = SolutionInfo::new(pb, initial);
        let mut ev = ExchangeVerifier::new(&x);
        let before = x.clone();
        let swap = Exchange::new(0, 0, 1, 1);
        ev.commit(&mut x, swap);
        assert_ne!(before, x);
        // after the swap, process 1 sits on machine 0 and process 0 on 1
        let undo = Exchange::new(0, 1, 1, 0);
        assert!(ev.feasible(&x, undo));
        ev.commit(&mut x, undo);
        assert_eq!(before, x);
    }

    #[test]
    fn same_service_exchange_skips_conflict_and_spread() {
        // one service with two processes on two machines in two locations
        // with spread_min = 2: swapping them must stay feasible even though
        // both single-move legs would violate the conflict constraint
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 10, 10, 0, 1, //
            1, 1, 10, 10, 1, 0, //
            1, 2, 0, //
            2, //
            0, 3, 5, //
            0, 3, 5, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let mut x = SolutionInfo::new(pb, Arc::new(vec![0, 1]));
        let mut ev = ExchangeVerifier::new(&x);
        let swap = Exchange::new(0, 0, 1, 1);
        assert!(ev.feasible(&x, swap));
        let predicted = ev.objective(&x, swap);
        ev.commit(&mut x, swap);
        assert_eq!(predicted, x.objective());
        assert!(x.check());
        // both processes moved away from their initial machines
        assert_eq!(2, x.moved_processes(0));
        assert_eq!(2, x.service_move_cost());
    }

    #[test]
    fn exchange_with_transient_resource_respects_initial_machines() {
        // one transient resource, capacity 10, both processes require 6:
        // swapping them would need 6 (incoming) + 6 (transient of the one
        // that left) = 12 on each machine
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
        let x = SolutionInfo::new(pb, Arc::new(vec![0, 1]));
        let ev = ExchangeVerifier::new(&x);
        assert!(!ev.feasible(&x, Exchange::new(0, 0, 1, 1)));
    }

    #[test]
    fn service_move_delta_handles_ties_between_services() {
        // both services have one moved process (a tie at the maximum):
        // swapping both processes home must drop the maximum to zero, which
        // exercises the capped rescan of the decrease path.
        let (pb, initial) = two_profiles();
        let mut x = SolutionInfo::from_assignment(
            Arc::clone(&pb),
            Arc::clone(&initial),
            vec![1, 0],
        );
        assert_eq!(1, x.service_move_cost());
        let mut ev = ExchangeVerifier::new(&x);
        // p0 currently on m1, p1 on m0: swap them back to the initial layout
        let swap = Exchange::new(1, 0, 0, 1);
        let predicted = ev.objective(&x, swap);
        ev.commit(&mut x, swap);
        assert_eq!(predicted, x.objective());
        assert_eq!(0, x.service_move_cost());
        assert!(x.check());
        assert_eq!(x.initial(), x.solution());
    }
}
