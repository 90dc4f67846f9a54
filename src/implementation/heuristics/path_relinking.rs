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

//! This module provides the path-relinking consumer: it subscribes to the
//! pool and, for every notified solution, walks the path between it and a
//! random high-quality partner by greedily reassigning one differing process
//! at a time. The best point seen along the path (which may beat both
//! endpoints) is polished with a best-improvement descent and offered back to
//! the pool when good enough.

use std::sync::Arc;

use crate::abstraction::{Heuristic, HeuristicError, HeuristicSetup};
use crate::common::*;
use crate::implementation::heuristics::best_improvement::best_improvement_descent;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::pool::PoolEntry;
use crate::implementation::verifiers::move_verifier::MoveVerifier;

/// A relinked-and-polished solution is published when its objective lies
/// below this multiple of the pool best.
const PUBLISH_RATIO: f64 = 1.1;

/// The pool consumer. It never explores on its own: all its raw material
/// comes from subscription events.
pub struct PathRelinking {
    setup: HeuristicSetup,
    best_objective: u64,
    best_solution: Assignment,
}

impl PathRelinking {
    pub fn new(setup: HeuristicSetup) -> Self {
        let best_solution = setup.initial.as_ref().clone();
        PathRelinking { setup, best_objective: u64::MAX, best_solution }
    }

    /// One greedy step from `a` toward `b`: apply the feasible reassignment
    /// of a differing process with the best resulting objective. Returns
    /// false when no differing process can feasibly adopt its target machine.
    fn step(
        verifier: &mut MoveVerifier,
        a: &mut SolutionInfo,
        b: &SolutionInfo,
        differences: &mut Vec<ProcessId>,
    ) -> bool {
        let mut best_at = None;
        let mut best_obj = u64::MAX;
        for (at, &p) in differences.iter().enumerate() {
            let proposal = Move::new(p, a.solution()[p], b.solution()[p]);
            if verifier.feasible(a, proposal) {
                let obj = verifier.objective(a, proposal);
                if obj < best_obj {
                    best_at = Some(at);
                    best_obj = obj;
                }
            }
        }
        match best_at {
            Some(at) => {
                let p = differences[at];
                let proposal = Move::new(p, a.solution()[p], b.solution()[p]);
                verifier.commit(a, proposal);
                differences.remove(at);
                true
            }
            None => false,
        }
    }

    /// Relinks from the better endpoint `s1` toward `s2`, alternating the
    /// walking direction, and keeps the best objective met on the way.
    fn relink(&mut self, s1: &PoolEntry, s2: &PoolEntry) {
        let problem = Arc::clone(&self.setup.problem);
        let initial = Arc::clone(&self.setup.initial);
        let v1 = s1.solution().as_ref();
        let v2 = s2.solution().as_ref();
        let mut differences: Vec<ProcessId> =
            (0..problem.process_count()).filter(|&p| v1[p] != v2[p]).collect();
        let mut info1 = SolutionInfo::from_assignment(
            Arc::clone(&problem),
            Arc::clone(&initial),
            v1.clone(),
        );
        let mut info2 = SolutionInfo::from_assignment(
            Arc::clone(&problem),
            Arc::clone(&initial),
            v2.clone(),
        );
        let mut verifier = MoveVerifier::new(&info1);
        let path_start_objective = info1.objective();
        let mut best_obj = path_start_objective;
        let mut best = v1.clone();
        let mut it = 0u64;
        while differences.len() > 1 && !self.setup.interrupted() {
            let success = if it % 2 == 0 {
                let ok = Self::step(&mut verifier, &mut info1, &info2, &mut differences);
                if info1.objective() < best_obj {
                    best_obj = info1.objective();
                    best = info1.solution().to_vec();
                }
                ok
            } else {
                let ok = Self::step(&mut verifier, &mut info2, &info1, &mut differences);
                if info2.objective() < best_obj {
                    best_obj = info2.objective();
                    best = info2.solution().to_vec();
                }
                ok
            };
            it += 1;
            if !success {
                break;
            }
        }
        if best_obj < path_start_objective {
            let mut best_info = SolutionInfo::from_assignment(problem, initial, best);
            best_improvement_descent(&mut best_info, &self.setup.flag);
            if let Some(pool_best) = self.setup.pool.best() {
                if (best_info.objective() as f64) < pool_best.obj() as f64 * PUBLISH_RATIO {
                    self.setup.pool.push(best_info.objective(), best_info.solution());
                }
            }
            if best_info.objective() < self.best_objective {
                self.best_objective = best_info.objective();
                self.best_solution = best_info.solution().to_vec();
            }
        }
    }
}

impl Heuristic for PathRelinking {
    fn name(&self) -> &str {
        "path_relinking"
    }

    fn run(&mut self) -> Result<(), HeuristicError> {
        {
            let info = SolutionInfo::new(
                Arc::clone(&self.setup.problem),
                Arc::clone(&self.setup.initial),
            );
            self.best_objective = info.objective();
            self.best_solution = info.solution().to_vec();
        }
        let subscription = self.setup.pool.subscribe();
        while !self.setup.interrupted() {
            let Some(s2) = subscription.wait() else {
                // pool shutdown
                break;
            };
            let Some(s1) = self.setup.pool.random_high_quality() else {
                continue;
            };
            // relinking two near-identical solutions is pointless
            if assignment_delta(s1.solution(), s2.solution()) >= 2 {
                if s1.obj() < s2.obj() {
                    self.relink(&s1, &s2);
                } else {
                    self.relink(&s2, &s1);
                }
            }
        }
        self.setup.pool.unsubscribe(&subscription);
        Ok(())
    }

    fn best_solution(&self) -> &[MachineId] {
        &self.best_solution
    }

    fn best_objective(&self) -> u64 {
        self.best_objective
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_path_relinking {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::*;

    // four machines with room to spare, four singleton services; many
    // distinct feasible placements exist so relinking has paths to walk
    fn setup() -> HeuristicSetup {
        let values = vec![
            1, 0, 10, //
            4, //
            0, 0, 10, 2, 0, 1, 1, 1, //
            0, 0, 10, 2, 1, 0, 1, 1, //
            0, 0, 10, 2, 1, 1, 0, 1, //
            0, 0, 10, 2, 1, 1, 1, 0, //
            4, 1, 0, 1, 0, 1, 0, 1, 0, //
            4, //
            0, 4, 1, //
            1, 4, 1, //
            2, 4, 1, //
            3, 4, 1, //
            0, //
            1, 1, 1,
        ];
        let problem = Arc::new(Problem::parse(&values).unwrap());
        HeuristicSetup {
            problem,
            initial: Arc::new(vec![0, 0, 1, 1]),
            seed: 7,
            flag: Arc::new(AtomicBool::new(false)),
            pool: Arc::new(SolutionPool::new(PoolConfig::default())),
            params: ParameterMap::default(),
        }
    }

    #[test]
    fn shutdown_terminates_the_consumer() {
        let setup = setup();
        let pool = Arc::clone(&setup.pool);
        let flag = Arc::clone(&setup.flag);
        let mut relinking = PathRelinking::new(setup);
        let worker = std::thread::spawn(move || relinking.run());
        std::thread::sleep(std::time::Duration::from_millis(50));
        flag.store(true, Ordering::Relaxed);
        pool.shutdown();
        assert!(worker.join().unwrap().is_ok());
    }

    #[test]
    fn notified_solutions_are_relinked_without_breaking_the_pool() {
        let setup = setup();
        let pool = Arc::clone(&setup.pool);
        let flag = Arc::clone(&setup.flag);
        let initial = Arc::clone(&setup.initial);
        let problem = Arc::clone(&setup.problem);
        let mut relinking = PathRelinking::new(setup);
        let worker = std::thread::spawn(move || relinking.run());
        std::thread::sleep(std::time::Duration::from_millis(50));
        // feed the subscriber a couple of distant feasible solutions
        for solution in [vec![0, 1, 2, 3], vec![3, 2, 1, 0], vec![0, 1, 1, 0]] {
            let info = SolutionInfo::from_assignment(
                Arc::clone(&problem),
                Arc::clone(&initial),
                solution,
            );
            pool.push(info.objective(), info.solution());
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
        flag.store(true, Ordering::Relaxed);
        pool.shutdown();
        assert!(worker.join().unwrap().is_ok());
        // whatever happened, the pool still serves a feasible best
        let best = pool.best().unwrap();
        let check = verify(&problem, &initial, best.solution());
        assert!(check.feasible);
        assert_eq!(check.objective, best.obj());
    }
}
