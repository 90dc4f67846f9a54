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

//! This module provides the smart shaker: a shake allowed to traverse the
//! infeasible region. It applies random moves through the batch verifier and,
//! when the solution turns infeasible, steers back with *repair moves* chosen
//! by inspecting the outstanding violation sets -- unload an overloaded
//! machine, widen an under-spread service, break up a conflict, or bring a
//! dependency into the offending neighborhood. A sequence that cannot be
//! repaired within the allowed number of infeasible steps is rolled back
//! wholesale and retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::abstraction::{HeuristicError, ShakeRoutine};
use crate::common::*;
use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::params::ParameterMap;
use crate::implementation::routines::degenerate;
use crate::implementation::verifiers::batch_verifier::BatchVerifier;

/// The repair-driven shake. `maxInfeasibleSteps` bounds how long a sequence
/// may stay infeasible; `repairTrials` bounds the last-chance repair attempts
/// before the whole sequence is rolled back.
pub struct SmartShaker {
    flag: Arc<AtomicBool>,
    repair_trials: u32,
    max_infeasible_steps: u32,
}

impl SmartShaker {
    pub fn new(
        _problem: &Problem,
        flag: Arc<AtomicBool>,
        params: &ParameterMap,
    ) -> Result<Self, HeuristicError> {
        let repair_trials = params.get_or("repairTrials", 100)?;
        let max_infeasible_steps = params.get_or("maxInfeasibleSteps", 10)?;
        Ok(SmartShaker { flag, repair_trials, max_infeasible_steps })
    }

    fn pick_random_move(x: &SolutionInfo, rng: &mut SmallRng) -> Move {
        let p_count = x.problem().process_count();
        let m_count = x.problem().machine_count();
        loop {
            let p = rng.gen_range(0..p_count);
            let src = x.solution()[p];
            let dst = rng.gen_range(0..m_count);
            if dst != src {
                return Move::new(p, src, dst);
            }
        }
    }

    /// Unloads a machine violating a (transient) capacity constraint.
    fn pick_repair_capacity_move(
        x: &SolutionInfo,
        by_machine: &[Vec<ProcessId>],
        src: MachineId,
        rng: &mut SmallRng,
    ) -> Move {
        if by_machine[src].is_empty() {
            // a transient overload may involve no hosted process at all
            return Self::pick_random_move(x, rng);
        }
        let p = by_machine[src][rng.gen_range(0..by_machine[src].len())];
        let m_count = x.problem().machine_count();
        loop {
            let dst = rng.gen_range(0..m_count);
            if dst != src {
                return Move::new(p, src, dst);
            }
        }
    }

    /// Sends a process of an under-spread service to a location it does not
    /// cover yet.
    fn pick_repair_spread_move(x: &SolutionInfo, s: ServiceId, rng: &mut SmallRng) -> Move {
        let problem = x.problem();
        let processes = problem.processes_by_service(s);
        let p = processes[rng.gen_range(0..processes.len())];
        let l_count = problem.location_count();
        for _ in 0..4 * l_count {
            let l = rng.gen_range(0..l_count);
            if x.location_presence(s, l) == 0 {
                let machines = problem.machines_by_location(l);
                let dst = machines[rng.gen_range(0..machines.len())];
                return Move::new(p, x.solution()[p], dst);
            }
        }
        Self::pick_random_move(x, rng)
    }

    /// Evicts one of the conflicting processes of `s` stacked on `m`.
    fn pick_repair_conflict_move(
        x: &SolutionInfo,
        s: ServiceId,
        m: MachineId,
        rng: &mut SmallRng,
    ) -> Move {
        let candidates: Vec<ProcessId> = x
            .problem()
            .processes_by_service(s)
            .iter()
            .copied()
            .filter(|&p| x.solution()[p] == m)
            .collect();
        if candidates.is_empty() {
            return Self::pick_random_move(x, rng);
        }
        let p = candidates[rng.gen_range(0..candidates.len())];
        let m_count = x.problem().machine_count();
        loop {
            let dst = rng.gen_range(0..m_count);
            if dst != m {
                return Move::new(p, m, dst);
            }
        }
    }

    /// Brings a process of the missing dependency `s2` into neighborhood `n`.
    fn pick_repair_dependency_move(
        x: &SolutionInfo,
        s2: ServiceId,
        n: NeighborhoodId,
        rng: &mut SmallRng,
    ) -> Move {
        let problem = x.problem();
        let processes = problem.processes_by_service(s2);
        let p = processes[rng.gen_range(0..processes.len())];
        let src = x.solution()[p];
        let machines = problem.machines_by_neighborhood(n);
        for _ in 0..4 {
            let dst = machines[rng.gen_range(0..machines.len())];
            if dst != src {
                return Move::new(p, src, dst);
            }
        }
        Self::pick_random_move(x, rng)
    }

    /// The first nonempty violation set decides which repair heuristic to
    /// apply; a feasible state yields a plain random move.
    fn pick_repair_move(
        bv: &mut BatchVerifier,
        by_machine: &[Vec<ProcessId>],
        rng: &mut SmallRng,
    ) -> Move {
        let overload = bv.capacity_violations().iter().next().copied();
        if let Some(m) = overload {
            return Self::pick_repair_capacity_move(bv.info(), by_machine, m, rng);
        }
        let transient = bv.transient_violations().iter().next().copied();
        if let Some(m) = transient {
            return Self::pick_repair_capacity_move(bv.info(), by_machine, m, rng);
        }
        let spread = bv.spread_violations().iter().next().copied();
        if let Some(s) = spread {
            return Self::pick_repair_spread_move(bv.info(), s, rng);
        }
        let conflict = bv.conflict_violations().iter().next().copied();
        if let Some((s, m)) = conflict {
            return Self::pick_repair_conflict_move(bv.info(), s, m, rng);
        }
        let dependency = bv.dependency_violations().iter().next().copied();
        if let Some((_, s2, n)) = dependency {
            return Self::pick_repair_dependency_move(bv.info(), s2, n, rng);
        }
        Self::pick_random_move(bv.info(), rng)
    }

    fn apply_to(by_machine: &mut [Vec<ProcessId>], mv: Move) {
        by_machine[mv.dst].push(mv.p);
        if let Some(at) = by_machine[mv.src].iter().position(|&q| q == mv.p) {
            by_machine[mv.src].swap_remove(at);
        }
    }

    fn try_shake(
        &self,
        bv: &mut BatchVerifier,
        by_machine: &mut [Vec<ProcessId>],
        k: u64,
        rng: &mut SmallRng,
    ) -> bool {
        let mut moves: Vec<Move> = vec![];
        let mut infeasible_steps = 0;
        for _ in 0..k {
            if bv.feasible() {
                let mv = Self::pick_random_move(bv.info(), rng);
                bv.update(mv);
                Self::apply_to(by_machine, mv);
                moves.push(mv);
            } else {
                infeasible_steps += 1;
                if infeasible_steps > self.max_infeasible_steps {
                    // too long in the infeasible region, give up
                    break;
                } else if infeasible_steps == self.max_infeasible_steps {
                    // last chance: only keep a repair that restores
                    // feasibility outright
                    for _ in 0..self.repair_trials {
                        let mv = Self::pick_repair_move(bv, by_machine, rng);
                        if mv.src == mv.dst {
                            continue;
                        }
                        bv.update(mv);
                        if bv.feasible() {
                            Self::apply_to(by_machine, mv);
                            moves.push(mv);
                            break;
                        }
                        bv.rollback(mv);
                    }
                } else {
                    let mv = Self::pick_repair_move(bv, by_machine, rng);
                    if mv.src != mv.dst {
                        bv.update(mv);
                        Self::apply_to(by_machine, mv);
                        moves.push(mv);
                    }
                }
                if bv.feasible() {
                    infeasible_steps = 0;
                }
            }
        }
        if bv.feasible() {
            true
        } else {
            bv.rollback_all(&moves);
            for mv in moves.iter().rev() {
                Self::apply_to(by_machine, mv.reverse());
            }
            false
        }
    }
}

impl ShakeRoutine for SmartShaker {
    fn shake(&mut self, x: &mut SolutionInfo, k: u64, rng: &mut SmallRng) {
        if degenerate(x) {
            return;
        }
        let m_count = x.problem().machine_count();
        let mut by_machine: Vec<Vec<ProcessId>> = vec![vec![]; m_count];
        for (p, &m) in x.solution().iter().enumerate() {
            by_machine[m].push(p);
        }
        let mut bv = BatchVerifier::new(x);
        let mut found = false;
        while !found && !self.flag.load(Ordering::Relaxed) {
            found = self.try_shake(&mut bv, &mut by_machine, k, rng);
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_smart_shaker {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use crate::*;

    // four machines, four singleton services with some slack: plenty of room
    // for a shake to wander and still come back feasible
    fn roomy() -> SolutionInfo {
        let values = vec![
            1, 0, 1, //
            4, //
            0, 0, 10, 8, 0, 1, 1, 1, //
            0, 0, 10, 8, 1, 0, 1, 1, //
            0, 1, 10, 8, 1, 1, 0, 1, //
            0, 1, 10, 8, 1, 1, 1, 0, //
            4, 1, 0, 1, 0, 1, 0, 1, 0, //
            4, //
            0, 4, 1, //
            1, 4, 1, //
            2, 4, 1, //
            3, 4, 1, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        SolutionInfo::new(pb, Arc::new(vec![0, 1, 2, 3]))
    }

    #[test]
    fn the_landing_state_is_always_feasible() {
        let mut x = roomy();
        let flag = Arc::new(AtomicBool::new(false));
        let mut shaker = SmartShaker::new(x.problem(), flag, &ParameterMap::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(21);
        shaker.shake(&mut x, 4, &mut rng);
        assert!(x.check());
        assert!(crate::implementation::model::verifier::feasible(&x));
    }

    #[test]
    fn a_raised_flag_aborts_without_corrupting_the_state() {
        let mut x = roomy();
        let before = x.clone();
        let flag = Arc::new(AtomicBool::new(true));
        let mut shaker = SmartShaker::new(x.problem(), flag, &ParameterMap::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(21);
        shaker.shake(&mut x, 4, &mut rng);
        assert_eq!(before, x);
    }
}
