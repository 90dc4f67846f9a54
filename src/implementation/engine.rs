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

//! This module provides the engine: it builds the configured heuristics
//! around a shared solution pool, runs each of them on a dedicated thread,
//! waits until the deadline (or until all of them complete), then raises the
//! shared termination flag, shuts the pool down, joins every worker and
//! returns the best pool entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::abstraction::{Heuristic, HeuristicError, HeuristicSetup};
use crate::common::*;
use crate::implementation::heuristics::heuristic_by_name;
use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::params::ParameterMap;
use crate::implementation::pool::{PoolConfig, PoolEntry, SolutionPool};

/// The seed offset between two consecutive heuristics of the list.
const SEED_STRIDE: u64 = 100;

/// The ways an engine run can fail.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid heuristic configuration: {0}")]
    SpecParse(String),
    #[error("error during initialization of heuristic {index} of type '{name}': {source}")]
    HeuristicInit { index: usize, name: String, source: HeuristicError },
    #[error("no solution in the pool at the end of the run")]
    EmptyPool,
}

/// What a finished run hands back: the best pool entry, plus the errors of
/// the heuristics that failed (the work of the others is still honored).
pub struct EngineOutcome {
    pub best: PoolEntry,
    pub errors: Vec<(String, HeuristicError)>,
}

/// The per-worker completion latch the driver waits on.
struct CompletionLatch {
    state: Mutex<Option<Result<(), HeuristicError>>>,
    done: Condvar,
}
impl CompletionLatch {
    fn new() -> Self {
        CompletionLatch { state: Mutex::new(None), done: Condvar::new() }
    }
    fn complete(&self, outcome: Result<(), HeuristicError>) {
        let mut state = self.state.lock();
        *state = Some(outcome);
        self.done.notify_all();
    }
    /// Waits for completion or the deadline, whichever comes first. Returns
    /// true iff the worker completed.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while state.is_none() {
            if self.done.wait_until(&mut state, deadline).timed_out() {
                return state.is_some();
            }
        }
        true
    }
    fn take(&self) -> Option<Result<(), HeuristicError>> {
        self.state.lock().take()
    }
}

/// The concurrent heuristic pool runner.
pub struct Engine {
    problem: Arc<Problem>,
    initial: Arc<Assignment>,
    pool: Arc<SolutionPool>,
    flag: Arc<AtomicBool>,
    heuristics: Vec<Box<dyn Heuristic>>,
}

impl Engine {
    /// Builds the engine from a heuristic specification string: a
    /// comma-separated list of `name` or `name#k1=v1:k2=v2` items. The k-th
    /// heuristic is seeded with `seed + 100 * k`; the pool's own generator is
    /// seeded independently.
    pub fn new(
        problem: Arc<Problem>,
        initial: Arc<Assignment>,
        spec: &str,
        seed: u64,
    ) -> Result<Self, EngineError> {
        let pool = Arc::new(SolutionPool::new(PoolConfig {
            seed: seed.wrapping_add(1),
            ..PoolConfig::default()
        }));
        let flag = Arc::new(AtomicBool::new(false));
        let mut heuristics = vec![];
        for (index, item) in spec.split(',').enumerate() {
            let mut parts = item.split('#');
            let name = parts.next().unwrap_or_default();
            let config = parts.next().unwrap_or("");
            if name.is_empty() || parts.next().is_some() {
                return Err(EngineError::SpecParse(item.to_string()));
            }
            let wrap = |source: HeuristicError| EngineError::HeuristicInit {
                index,
                name: name.to_string(),
                source,
            };
            let params = ParameterMap::parse(config)
                .map_err(|e| wrap(HeuristicError::from(e)))?;
            let setup = HeuristicSetup {
                problem: Arc::clone(&problem),
                initial: Arc::clone(&initial),
                seed: seed + SEED_STRIDE * index as u64,
                flag: Arc::clone(&flag),
                pool: Arc::clone(&pool),
                params,
            };
            heuristics.push(heuristic_by_name(name, setup).map_err(wrap)?);
        }
        Ok(Engine { problem, initial, pool, flag, heuristics })
    }

    pub fn pool(&self) -> &Arc<SolutionPool> {
        &self.pool
    }

    /// Runs every heuristic until `deadline` (an absolute instant) and
    /// returns the best pool entry. A feasible initial assignment is pushed
    /// first, so the pool is never empty on a sane input; an infeasible one
    /// stays out (its objective undercuts every feasible placement) and the
    /// heuristics must reach the feasible region on their own.
    pub fn solve(&mut self, deadline: Instant) -> Result<EngineOutcome, EngineError> {
        {
            let info = SolutionInfo::new(Arc::clone(&self.problem), Arc::clone(&self.initial));
            if crate::implementation::model::verifier::feasible(&info) {
                self.pool.push(info.objective(), info.solution());
            }
        }
        let latches: Vec<Arc<CompletionLatch>> =
            (0..self.heuristics.len()).map(|_| Arc::new(CompletionLatch::new())).collect();
        std::thread::scope(|scope| {
            for (heuristic, latch) in self.heuristics.iter_mut().zip(latches.iter()) {
                let latch = Arc::clone(latch);
                scope.spawn(move || {
                    let outcome = heuristic.run();
                    latch.complete(outcome);
                });
            }
            for latch in latches.iter() {
                latch.wait_until(deadline);
            }
            // deadline (or full completion): force everyone out, then let the
            // scope join the threads
            self.flag.store(true, Ordering::Relaxed);
            self.pool.shutdown();
        });
        let mut errors = vec![];
        for (heuristic, latch) in self.heuristics.iter().zip(latches.iter()) {
            if let Some(Err(error)) = latch.take() {
                errors.push((heuristic.name().to_string(), error));
            }
        }
        let best = self.pool.best().ok_or(EngineError::EmptyPool)?;
        Ok(EngineOutcome { best, errors })
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

/// The engine is mostly exercised end to end: small instances, short
/// deadlines, and the invariant that whatever comes out of the pool is
/// feasible and correctly priced.
#[cfg(test)]
mod test_engine {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use crate::*;

    fn conflicted_instance() -> (Arc<Problem>, Arc<Assignment>) {
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
    fn an_unknown_heuristic_name_fails_initialization() {
        let (problem, initial) = conflicted_instance();
        let result = Engine::new(problem, initial, "vns3,genetic", 0);
        assert!(matches!(result, Err(EngineError::HeuristicInit { index: 1, .. })));
    }

    #[test]
    fn a_malformed_spec_item_fails_parsing() {
        let (problem, initial) = conflicted_instance();
        let result = Engine::new(problem, initial, "vns3#a=1#b=2", 0);
        assert!(matches!(result, Err(EngineError::SpecParse(_))));
    }

    #[test]
    fn the_default_spec_is_accepted() {
        let (problem, initial) = conflicted_instance();
        let spec = "vns3#ls=optimized:ls@maxSamples=10000,simulated_annealing";
        assert!(Engine::new(problem, initial, spec, 0).is_ok());
    }

    #[test]
    fn the_deadline_is_honored_and_the_best_entry_is_feasible() {
        let (problem, initial) = conflicted_instance();
        let mut engine = Engine::new(
            Arc::clone(&problem),
            Arc::clone(&initial),
            "vns3,simulated_annealing",
            42,
        )
        .unwrap();
        let started = Instant::now();
        let outcome = engine.solve(started + Duration::from_millis(400)).unwrap();
        // joining leaves some slack beyond the deadline, but not much
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcome.errors.is_empty());
        let check = verify(&problem, &initial, outcome.best.solution());
        assert!(check.feasible);
        assert_eq!(check.objective, outcome.best.obj());
    }

    #[test]
    fn a_conflicting_initial_placement_is_repaired() {
        // both processes of the service start on machine 0: the zero-cost
        // infeasible input must not win; the only feasible placements move
        // one process for 5 (process) + 1 (service) + 1 (machine) = 7
        let (problem, _) = conflicted_instance();
        let infeasible_start = Arc::new(vec![0, 0]);
        let mut engine = Engine::new(
            Arc::clone(&problem),
            Arc::clone(&infeasible_start),
            "vns3",
            0,
        )
        .unwrap();
        let outcome = engine.solve(Instant::now() + Duration::from_millis(500)).unwrap();
        assert_eq!(7, outcome.best.obj());
        let check = verify(&problem, &infeasible_start, outcome.best.solution());
        assert!(check.feasible);
    }

    #[test]
    fn a_completed_heuristic_does_not_stall_the_engine() {
        let (problem, initial) = conflicted_instance();
        let mut engine = Engine::new(
            Arc::clone(&problem),
            Arc::clone(&initial),
            "best_improvement_local_search",
            0,
        )
        .unwrap();
        let started = Instant::now();
        let outcome = engine.solve(started + Duration::from_secs(30)).unwrap();
        // the descent finishes in microseconds; the engine must not sleep
        // through the whole 30 second budget
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn identical_seeds_give_identical_results() {
        let (problem, initial) = conflicted_instance();
        let run = |seed| {
            let mut engine = Engine::new(
                Arc::clone(&problem),
                Arc::clone(&initial),
                "best_improvement_local_search",
                seed,
            )
            .unwrap();
            let outcome = engine.solve(Instant::now() + Duration::from_secs(5)).unwrap();
            outcome.best.solution().as_ref().clone()
        };
        assert_eq!(run(0), run(0));
    }
}
