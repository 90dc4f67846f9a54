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

//! This module provides the variable-neighborhood search: shake the incumbent
//! with a jump of length `k`, descend with a local search, and adapt `k` --
//! back to `k_min` on improvement, one step wider otherwise, wrapping at
//! `k_max`. The incumbent is periodically synchronized with the pool best.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::abstraction::{Heuristic, HeuristicError, HeuristicSetup};
use crate::common::*;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::optimizers::{BalanceCostOptimizer, LoadCostOptimizer};
use crate::implementation::routines::{local_search_by_name, shake_by_name};

/// Every this many iterations, the incumbent is compared against the pool
/// best and replaced when strictly worse.
const SYNC_PERIOD: u64 = 10;

/// The shake / local-search orchestrator. The routines it composes are
/// selected by the `ls` and `shake` parameters (with nested `ls@...` and
/// `shake@...` groups); `kMin`, `kMax` and `kStep` drive the neighborhood
/// size adaptation, and the `lcopt` / `bcopt` flags enable the cost-optimizer
/// pre-passes.
pub struct Vns {
    setup: HeuristicSetup,
    rng: SmallRng,
    best: Option<SolutionInfo>,
}

impl Vns {
    pub fn new(setup: HeuristicSetup) -> Self {
        let rng = SmallRng::seed_from_u64(setup.seed);
        Vns { setup, rng, best: None }
    }
}

impl Heuristic for Vns {
    fn name(&self) -> &str {
        "vns3"
    }

    fn run(&mut self) -> Result<(), HeuristicError> {
        let params = &self.setup.params;
        let run_load_opt = params.get_flag_or("lcopt", false)?;
        let run_balance_opt = params.get_flag_or("bcopt", false)?;
        let k_min: u64 = params.get_or("kMin", 1)?;
        let k_max: u64 = params.get_or("kMax", 100)?;
        let k_step: u64 = params.get_or("kStep", 1)?;
        let ls_name = params.get_str_or("ls", "random");
        let shake_name = params.get_str_or("shake", "random");
        let ls_params = params.group("ls")?;
        let shake_params = params.group("shake")?;
        let mut ls =
            local_search_by_name(&ls_name, &self.setup.problem, &self.setup.flag, &ls_params)?;
        let mut shake =
            shake_by_name(&shake_name, &self.setup.problem, &self.setup.flag, &shake_params)?;
        let mut best = SolutionInfo::new(
            Arc::clone(&self.setup.problem),
            Arc::clone(&self.setup.initial),
        );
        if run_load_opt {
            LoadCostOptimizer.optimize(&mut best);
        }
        if run_balance_opt {
            BalanceCostOptimizer.optimize(&mut best);
        }
        // an infeasible starting placement is worth infinity: any feasible
        // state the search reaches replaces it
        let mut best_feasible = crate::implementation::model::verifier::feasible(&best);
        let mut k = k_min;
        let mut it: u64 = 0;
        while !self.setup.interrupted() {
            it += 1;
            if it % SYNC_PERIOD == 0 {
                if let Some(entry) = self.setup.pool.best() {
                    if !best_feasible || entry.obj() < best.objective() {
                        best = SolutionInfo::from_assignment(
                            Arc::clone(&self.setup.problem),
                            Arc::clone(&self.setup.initial),
                            entry.solution().as_ref().clone(),
                        );
                        best_feasible = true;
                        k = k_min;
                    }
                }
            }
            let mut current = best.clone();
            shake.shake(&mut current, k, &mut self.rng);
            ls.search(&mut current, &mut self.rng);
            let improves = if best_feasible {
                current.objective() < best.objective()
            } else {
                crate::implementation::model::verifier::feasible(&current)
            };
            if improves {
                best = current;
                best_feasible = true;
                self.setup.pool.push(best.objective(), best.solution());
                k = k_min;
            } else if k == k_max {
                k = k_min;
            } else {
                k = k_max.min(k + k_step);
            }
        }
        self.best = Some(best);
        Ok(())
    }

    fn best_solution(&self) -> &[MachineId] {
        match &self.best {
            Some(best) => best.solution(),
            None => &self.setup.initial,
        }
    }

    fn best_objective(&self) -> u64 {
        self.best.as_ref().map(SolutionInfo::objective).unwrap_or(u64::MAX)
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_vns {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::*;

    fn setup(params: &str) -> HeuristicSetup {
        let values = vec![
            1, 0, 10, //
            3, //
            0, 0, 10, 2, 0, 1, 1, //
            0, 0, 10, 2, 1, 0, 1, //
            0, 0, 10, 2, 1, 1, 0, //
            3, 1, 0, 1, 0, 1, 0, //
            3, //
            0, 6, 1, //
            1, 2, 1, //
            2, 2, 1, //
            0, //
            1, 1, 1,
        ];
        let problem = Arc::new(Problem::parse(&values).unwrap());
        let initial = Arc::new(vec![0, 0, 0]);
        HeuristicSetup {
            problem,
            initial,
            seed: 0,
            flag: Arc::new(AtomicBool::new(false)),
            pool: Arc::new(SolutionPool::new(PoolConfig::default())),
            params: ParameterMap::parse(params).unwrap(),
        }
    }

    #[test]
    fn an_unknown_local_search_name_fails_the_run() {
        let mut vns = Vns::new(setup("ls=thorough"));
        assert!(matches!(
            vns.run(),
            Err(HeuristicError::UnknownLocalSearch(_))
        ));
    }

    #[test]
    fn an_unknown_shake_name_fails_the_run() {
        let mut vns = Vns::new(setup("shake=gentle"));
        assert!(matches!(vns.run(), Err(HeuristicError::UnknownShake(_))));
    }

    #[test]
    fn an_interrupted_run_publishes_its_incumbent() {
        let setup = setup("ls=random:ls@maxTrials=200:kMax=3");
        let flag = Arc::clone(&setup.flag);
        let pool = Arc::clone(&setup.pool);
        let mut vns = Vns::new(setup);
        let worker = std::thread::spawn(move || {
            let outcome = vns.run();
            (vns.best_objective(), outcome)
        });
        std::thread::sleep(std::time::Duration::from_millis(200));
        flag.store(true, Ordering::Relaxed);
        let (best_obj, outcome) = worker.join().unwrap();
        assert!(outcome.is_ok());
        // the instance starts at objective 80 and improves from there
        assert!(best_obj < 80);
        assert_eq!(pool.best().unwrap().obj(), best_obj);
    }
}
