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

//! This module provides the batch verifier: it applies a *sequence* of moves
//! that may traverse infeasible solutions, keeps all the aggregates of the
//! solution state up to date along the way, and tracks the outstanding
//! constraint violations in five bounded sets. The smart shaker leans on it
//! to wander through the infeasible region and find its way back out.

use fxhash::FxHashSet;

use crate::common::*;
use crate::implementation::model::solution::SolutionInfo;

/// A pending conflict violation: more than one process of the service sits on
/// the machine.
pub type ConflictViolation = (ServiceId, MachineId);
/// A pending dependency violation: service `.0` depends on service `.1`,
/// which is absent from neighborhood `.2` although `.0` is present there.
pub type DependencyViolation = (ServiceId, ServiceId, NeighborhoodId);

/// Verifies constraint violations and computes the objective over a batch of
/// moves. Unlike the single-proposal verifiers, it owns the solution state
/// for its whole lifetime: every mutation must flow through `update` or
/// `rollback` so the violation sets stay truthful.
pub struct BatchVerifier<'a> {
    info: &'a mut SolutionInfo,
    feasible: Option<bool>,
    objective: Option<u64>,
    moves_to_check: Vec<Move>,
    capacity_violations: FxHashSet<MachineId>,
    transient_violations: FxHashSet<MachineId>,
    conflict_violations: FxHashSet<ConflictViolation>,
    spread_violations: FxHashSet<ServiceId>,
    dependency_violations: FxHashSet<DependencyViolation>,
}

impl<'a> BatchVerifier<'a> {
    /// Wraps a feasible solution state. The violation sets start empty.
    pub fn new(info: &'a mut SolutionInfo) -> Self {
        BatchVerifier {
            info,
            feasible: None,
            objective: None,
            moves_to_check: vec![],
            capacity_violations: FxHashSet::default(),
            transient_violations: FxHashSet::default(),
            conflict_violations: FxHashSet::default(),
            spread_violations: FxHashSet::default(),
            dependency_violations: FxHashSet::default(),
        }
    }

    pub fn info(&self) -> &SolutionInfo {
        self.info
    }

    /// Applies every move of the batch in order.
    pub fn update_all(&mut self, moves: &[Move]) {
        for &mv in moves {
            self.update(mv);
        }
    }

    /// Applies one move, updating every aggregate of the state and queueing
    /// the move for the lazy violation-set refresh.
    pub fn update(&mut self, mv: Move) {
        debug_assert_eq!(self.info.solution()[mv.p], mv.src);
        if mv.src == mv.dst {
            return;
        }
        self.feasible = None;
        self.objective = None;
        self.moves_to_check.push(mv);
        let problem = self.info.problem_handle();
        let Move { p, src, dst } = mv;
        let process = &problem.processes()[p];
        let s = process.service;
        let src_machine = &problem.machines()[src];
        let dst_machine = &problem.machines()[dst];
        let initial = self.info.initial()[p];
        let info = &mut *self.info;
        info.assign(p, dst);
        // balance costs, evaluated against the usage before the move
        for (b, balance) in problem.balance_costs().iter().enumerate() {
            let (r1, r2) = (balance.resource1, balance.resource2);
            let target = balance.target as i64;
            let (req1, req2) = (process.requirement(r1) as i64, process.requirement(r2) as i64);
            let (u_s1, u_s2) = (info.usage(src, r1) as i64, info.usage(src, r2) as i64);
            let (u_d1, u_d2) = (info.usage(dst, r1) as i64, info.usage(dst, r2) as i64);
            let diff = balance_cost(
                target,
                src_machine.capacity(r1) as i64,
                u_s1 - req1,
                src_machine.capacity(r2) as i64,
                u_s2 - req2,
            ) as i64
                - balance_cost(
                    target,
                    src_machine.capacity(r1) as i64,
                    u_s1,
                    src_machine.capacity(r2) as i64,
                    u_s2,
                ) as i64
                + balance_cost(
                    target,
                    dst_machine.capacity(r1) as i64,
                    u_d1 + req1,
                    dst_machine.capacity(r2) as i64,
                    u_d2 + req2,
                ) as i64
                - balance_cost(
                    target,
                    dst_machine.capacity(r1) as i64,
                    u_d1,
                    dst_machine.capacity(r2) as i64,
                    u_d2,
                ) as i64;
            info.set_balance_cost(b, (info.balance_cost(b) as i64 + diff) as u64);
        }
        // usage, transient usage and load costs
        for r in 0..problem.resource_count() {
            let req = process.requirement(r);
            let old_src = info.usage(src, r);
            let old_dst = info.usage(dst, r);
            info.set_usage(src, r, old_src - req);
            info.set_usage(dst, r, old_dst + req);
            if problem.resources()[r].transient {
                if initial == src {
                    info.set_transient(initial, r, info.transient(initial, r) + req);
                }
                if initial == dst {
                    info.set_transient(initial, r, info.transient(initial, r) - req);
                }
            }
            let sc_src = src_machine.safety_capacity(r) as i64;
            let sc_dst = dst_machine.safety_capacity(r) as i64;
            let diff = load_cost(info.usage(src, r) as i64, sc_src) as i64
                - load_cost(old_src as i64, sc_src) as i64
                + load_cost(info.usage(dst, r) as i64, sc_dst) as i64
                - load_cost(old_dst as i64, sc_dst) as i64;
            info.set_load_cost(r, (info.load_cost(r) as i64 + diff) as u64);
        }
        // presence counts; the boolean mirror must follow the counts since
        // infeasible states can stack several processes of a service
        info.set_machine_presence(s, src, info.machine_presence(s, src) - 1);
        info.set_machine_presence(s, dst, info.machine_presence(s, dst) + 1);
        info.set_bool_machine_presence(s, src, info.machine_presence(s, src) > 0);
        info.set_bool_machine_presence(s, dst, true);
        info.set_location_presence(
            s,
            src_machine.location,
            info.location_presence(s, src_machine.location) - 1,
        );
        info.set_location_presence(
            s,
            dst_machine.location,
            info.location_presence(s, dst_machine.location) + 1,
        );
        info.set_neighborhood_presence(
            s,
            src_machine.neighborhood,
            info.neighborhood_presence(s, src_machine.neighborhood) - 1,
        );
        info.set_neighborhood_presence(
            s,
            dst_machine.neighborhood,
            info.neighborhood_presence(s, dst_machine.neighborhood) + 1,
        );
        // move costs
        if initial == src {
            info.set_process_move_cost(info.process_move_cost() + process.movement_cost);
            info.set_moved_processes(s, info.moved_processes(s) + 1);
        }
        if initial == dst {
            info.set_process_move_cost(info.process_move_cost() - process.movement_cost);
            info.set_moved_processes(s, info.moved_processes(s) - 1);
        }
        if initial == src || initial == dst {
            info.recompute_service_move_cost();
        }
        info.set_machine_move_cost(
            (info.machine_move_cost() as i64 - problem.machine_move_cost(initial, src) as i64
                + problem.machine_move_cost(initial, dst) as i64) as u64,
        );
    }

    /// Cancels one move by applying its reverse.
    pub fn rollback(&mut self, mv: Move) {
        self.update(mv.reverse());
    }

    /// Cancels a batch of moves, last one first.
    pub fn rollback_all(&mut self, moves: &[Move]) {
        for &mv in moves.iter().rev() {
            self.rollback(mv);
        }
    }

    /// True iff every violation set is empty.
    pub fn feasible(&mut self) -> bool {
        self.refresh()
    }

    /// The objective of the current (possibly infeasible) state.
    pub fn objective(&mut self) -> u64 {
        if let Some(obj) = self.objective {
            return obj;
        }
        let obj = self.info.objective();
        self.objective = Some(obj);
        obj
    }

    pub fn capacity_violations(&mut self) -> &FxHashSet<MachineId> {
        self.refresh();
        &self.capacity_violations
    }
    pub fn transient_violations(&mut self) -> &FxHashSet<MachineId> {
        self.refresh();
        &self.transient_violations
    }
    pub fn conflict_violations(&mut self) -> &FxHashSet<ConflictViolation> {
        self.refresh();
        &self.conflict_violations
    }
    pub fn spread_violations(&mut self) -> &FxHashSet<ServiceId> {
        self.refresh();
        &self.spread_violations
    }
    pub fn dependency_violations(&mut self) -> &FxHashSet<DependencyViolation> {
        self.refresh();
        &self.dependency_violations
    }

    fn machine_fits(&self, m: MachineId) -> bool {
        let problem = self.info.problem();
        let machine = &problem.machines()[m];
        (0..problem.resource_count()).all(|r| self.info.usage(m, r) <= machine.capacity(r))
    }

    fn machine_fits_transient(&self, m: MachineId) -> bool {
        let problem = self.info.problem();
        let machine = &problem.machines()[m];
        problem
            .transient_resources()
            .iter()
            .all(|&r| self.info.usage(m, r) + self.info.transient(m, r) <= machine.capacity(r))
    }

    /// Replays the queued moves against the violation sets; only the touched
    /// machines, services and neighborhoods are examined.
    fn refresh(&mut self) -> bool {
        if let Some(feasible) = self.feasible {
            return feasible;
        }
        let problem = self.info.problem_handle();
        let moves = std::mem::take(&mut self.moves_to_check);
        for mv in moves {
            let Move { p, src, dst } = mv;
            let s = problem.processes()[p].service;
            let service = &problem.services()[s];
            if !self.machine_fits(dst) {
                self.capacity_violations.insert(dst);
            }
            if self.machine_fits(src) {
                self.capacity_violations.remove(&src);
            }
            if !self.machine_fits_transient(dst) {
                self.transient_violations.insert(dst);
            }
            if self.machine_fits_transient(src) {
                self.transient_violations.remove(&src);
            }
            if self.info.machine_presence(s, dst) > 1 {
                self.conflict_violations.insert((s, dst));
            }
            if self.info.machine_presence(s, src) <= 1 {
                self.conflict_violations.remove(&(s, src));
            }
            if self.info.spread(s) < service.spread_min {
                self.spread_violations.insert(s);
            } else {
                self.spread_violations.remove(&s);
            }
            let nsrc = problem.machines()[src].neighborhood;
            let ndst = problem.machines()[dst].neighborhood;
            if nsrc != ndst {
                for &s2 in problem.dependency().outgoing(s) {
                    if self.info.neighborhood_presence(s2, ndst) == 0 {
                        self.dependency_violations.insert((s, s2, ndst));
                    }
                    if self.info.neighborhood_presence(s, nsrc) == 0 {
                        self.dependency_violations.remove(&(s, s2, nsrc));
                    }
                }
                for &s1 in problem.dependency().incoming(s) {
                    if self.info.neighborhood_presence(s1, nsrc) > 0
                        && self.info.neighborhood_presence(s, nsrc) == 0
                    {
                        self.dependency_violations.insert((s1, s, nsrc));
                    }
                    self.dependency_violations.remove(&(s1, s, ndst));
                }
            }
        }
        let feasible = self.capacity_violations.is_empty()
            && self.transient_violations.is_empty()
            && self.conflict_violations.is_empty()
            && self.spread_violations.is_empty()
            && self.dependency_violations.is_empty();
        self.feasible = Some(feasible);
        feasible
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_batch_verifier {
    use std::sync::Arc;

    use crate::*;

    // 1 resource; 2 machines capacity 10 / safety 10; one service with two
    // processes of requirement 3.
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
    fn a_fresh_batch_over_a_feasible_state_is_feasible() {
        let (pb, initial) = conflict_instance();
        let mut x = SolutionInfo::new(pb, initial);
        let mut bv = BatchVerifier::new(&mut x);
        assert!(bv.feasible());
        assert!(bv.capacity_violations().is_empty());
    }

    #[test]
    fn traversing_a_conflict_and_resolving_it_restores_feasibility() {
        let (pb, initial) = conflict_instance();
        let mut x = SolutionInfo::new(pb, initial);
        let mut bv = BatchVerifier::new(&mut x);
        // stack both processes of the service on machine 0
        bv.update(Move::new(1, 1, 0));
        assert!(!bv.feasible());
        assert!(bv.conflict_violations().contains(&(0, 0)));
        // move the other one out
        bv.update(Move::new(0, 0, 1));
        assert!(bv.feasible());
        assert!(bv.conflict_violations().is_empty());
        assert!(bv.info().check());
    }

    #[test]
    fn rollback_restores_the_exact_state() {
        let (pb, initial) = conflict_instance();
        let mut x = SolutionInfo::new(pb, Arc::clone(&initial));
        let before = x.clone();
        {
            let mut bv = BatchVerifier::new(&mut x);
            let batch = [Move::new(1, 1, 0), Move::new(0, 0, 1)];
            bv.update_all(&batch);
            assert!(bv.feasible());
            bv.rollback_all(&batch);
            assert!(bv.feasible());
        }
        assert_eq!(before, x);
    }

    #[test]
    fn objective_matches_a_recomputation_at_every_step() {
        let (pb, initial) = conflict_instance();
        let mut x = SolutionInfo::new(Arc::clone(&pb), Arc::clone(&initial));
        let mut bv = BatchVerifier::new(&mut x);
        for mv in [Move::new(1, 1, 0), Move::new(0, 0, 1)] {
            bv.update(mv);
            let fresh = SolutionInfo::from_assignment(
                Arc::clone(&pb),
                Arc::clone(&initial),
                bv.info().solution().to_vec(),
            );
            assert_eq!(fresh.objective(), bv.objective());
        }
    }

    #[test]
    fn capacity_overload_is_tracked_until_repaired() {
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
        let mut x = SolutionInfo::new(pb, Arc::new(vec![0, 1]));
        let mut bv = BatchVerifier::new(&mut x);
        bv.update(Move::new(1, 1, 0));
        assert!(!bv.feasible());
        assert!(bv.capacity_violations().contains(&0));
        bv.update(Move::new(1, 0, 1));
        assert!(bv.feasible());
    }

    #[test]
    fn batch_updates_keep_the_boolean_presence_mirror_in_sync() {
        let (pb, initial) = conflict_instance();
        let mut x = SolutionInfo::new(pb, initial);
        let mut bv = BatchVerifier::new(&mut x);
        bv.update(Move::new(1, 1, 0));
        assert!(bv.info().bool_machine_presence(0, 0));
        assert!(!bv.info().bool_machine_presence(0, 1));
        bv.update(Move::new(1, 0, 1));
        assert!(bv.info().bool_machine_presence(0, 0));
        assert!(bv.info().bool_machine_presence(0, 1));
        assert!(bv.info().check());
    }
}
