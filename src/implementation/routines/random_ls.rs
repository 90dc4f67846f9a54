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

//! This module provides the first-improvement random local search: alternate
//! uniformly between random moves and random exchanges and commit any
//! improving feasible proposal on the spot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::abstraction::{HeuristicError, LocalSearchRoutine};
use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::params::ParameterMap;
use crate::implementation::routines::{default_max_trials, degenerate, random_exchange, random_move};
use crate::implementation::verifiers::exchange_verifier::ExchangeVerifier;
use crate::implementation::verifiers::move_verifier::MoveVerifier;

/// First-improvement descent on uniformly sampled proposals. Stops after
/// `maxTrials` consecutive non-improving trials.
pub struct RandomLocalSearch {
    flag: Arc<AtomicBool>,
    max_trials: u64,
}

impl RandomLocalSearch {
    pub fn new(
        problem: &Problem,
        flag: Arc<AtomicBool>,
        params: &ParameterMap,
    ) -> Result<Self, HeuristicError> {
        let max_trials = params.get_or("maxTrials", default_max_trials(problem))?;
        Ok(RandomLocalSearch { flag, max_trials })
    }
}

impl LocalSearchRoutine for RandomLocalSearch {
    fn search(&mut self, x: &mut SolutionInfo, rng: &mut SmallRng) {
        if degenerate(x) {
            return;
        }
        let mut mv = MoveVerifier::new(x);
        let mut ev = ExchangeVerifier::new(x);
        let mut x_obj = x.objective();
        let mut trials = 0;
        while trials < self.max_trials && !self.flag.load(Ordering::Relaxed) {
            trials += 1;
            if rng.gen_bool(0.5) {
                let proposal = random_move(x, rng);
                if mv.feasible(x, proposal) {
                    let obj = mv.objective(x, proposal);
                    if obj < x_obj {
                        mv.commit(x, proposal);
                        x_obj = obj;
                        trials = 0;
                    }
                }
            } else {
                let proposal = random_exchange(x, rng);
                if ev.feasible(x, proposal) {
                    let obj = ev.objective(x, proposal);
                    if obj < x_obj {
                        ev.commit(x, proposal);
                        x_obj = obj;
                        trials = 0;
                    }
                }
            }
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_random_ls {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use crate::*;

    // two singleton services stacked on machine 0: the state is feasible but
    // pays a heavy load cost that moving one process away reduces
    fn overloaded() -> SolutionInfo {
        let values = vec![
            1, 0, 10, //
            2, //
            0, 0, 10, 2, 0, 1, //
            0, 0, 10, 2, 1, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 6, 1, //
            1, 2, 1, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let initial = Arc::new(vec![0, 0]);
        SolutionInfo::new(pb, initial)
    }

    fn budget() -> ParameterMap {
        ParameterMap::parse("maxTrials=500").unwrap()
    }

    #[test]
    fn descent_strictly_improves_the_objective() {
        let mut x = overloaded();
        let start = x.objective();
        let flag = Arc::new(AtomicBool::new(false));
        let mut ls = RandomLocalSearch::new(x.problem(), flag, &budget()).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        ls.search(&mut x, &mut rng);
        assert!(x.objective() < start);
        assert!(x.check());
    }

    #[test]
    fn a_local_optimum_is_left_untouched() {
        let mut x = overloaded();
        let flag = Arc::new(AtomicBool::new(false));
        let mut ls = RandomLocalSearch::new(x.problem(), flag, &budget()).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        ls.search(&mut x, &mut rng);
        let settled = x.clone();
        ls.search(&mut x, &mut rng);
        assert_eq!(settled, x);
    }

    #[test]
    fn a_raised_flag_stops_the_search_immediately() {
        let mut x = overloaded();
        let before = x.clone();
        let flag = Arc::new(AtomicBool::new(true));
        let mut ls = RandomLocalSearch::new(x.problem(), flag, &budget()).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        ls.search(&mut x, &mut rng);
        assert_eq!(before, x);
    }
}
