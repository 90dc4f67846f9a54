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

//! This module provides the deep local search: instead of committing the
//! first improving proposal, it collects a batch of improving samples and
//! commits the best one as a single iteration. The search stops when a whole
//! batch yields no improving sample.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::abstraction::{HeuristicError, LocalSearchRoutine};
use crate::common::*;
use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::params::ParameterMap;
use crate::implementation::routines::{
    default_max_trials, degenerate, random_exchange, random_move, Proposal,
};
use crate::implementation::verifiers::exchange_verifier::ExchangeVerifier;
use crate::implementation::verifiers::move_verifier::MoveVerifier;

/// Best-of-batch descent on uniformly sampled proposals. One iteration
/// gathers up to `maxSamples` improving candidates within `maxTrials` trials
/// and commits the best of them.
pub struct DeepLocalSearch {
    flag: Arc<AtomicBool>,
    max_trials: u64,
    max_samples: u64,
}

impl DeepLocalSearch {
    pub fn new(
        problem: &Problem,
        flag: Arc<AtomicBool>,
        params: &ParameterMap,
    ) -> Result<Self, HeuristicError> {
        let max_trials = params.get_or("maxTrials", default_max_trials(problem))?;
        let max_samples = params.get_or("maxSamples", 1000)?;
        Ok(DeepLocalSearch { flag, max_trials, max_samples })
    }
}

impl LocalSearchRoutine for DeepLocalSearch {
    fn search(&mut self, x: &mut SolutionInfo, rng: &mut SmallRng) {
        if degenerate(x) {
            return;
        }
        let mut mv = MoveVerifier::new(x);
        let mut ev = ExchangeVerifier::new(x);
        let mut x_obj = x.objective();
        let mut best_obj = x_obj;
        let mut best = Proposal::Move(Move::new(0, 0, 0));
        while !self.flag.load(Ordering::Relaxed) {
            let mut trials = 0;
            let mut samples = 0;
            while trials < self.max_trials && samples < self.max_samples {
                trials += 1;
                if rng.gen_bool(0.5) {
                    let proposal = random_move(x, rng);
                    if mv.feasible(x, proposal) {
                        let obj = mv.objective(x, proposal);
                        if obj < x_obj {
                            samples += 1;
                            if obj < best_obj {
                                best = Proposal::Move(proposal);
                                best_obj = obj;
                            }
                        }
                    }
                } else {
                    let proposal = random_exchange(x, rng);
                    if ev.feasible(x, proposal) {
                        let obj = ev.objective(x, proposal);
                        if obj < x_obj {
                            samples += 1;
                            if obj < best_obj {
                                best = Proposal::Exchange(proposal);
                                best_obj = obj;
                            }
                        }
                    }
                }
            }
            // a whole batch without an improving sample: local optimum
            if samples == 0 && trials == self.max_trials {
                break;
            }
            if samples == self.max_samples || trials == self.max_trials {
                match best {
                    Proposal::Move(m) => mv.commit(x, m),
                    Proposal::Exchange(e) => ev.commit(x, e),
                }
                x_obj = best_obj;
            }
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_deep_ls {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use crate::*;

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
        SolutionInfo::new(pb, Arc::new(vec![0, 0]))
    }

    #[test]
    fn descent_reaches_a_local_optimum_and_terminates() {
        let mut x = overloaded();
        let start = x.objective();
        let flag = Arc::new(AtomicBool::new(false));
        let params = ParameterMap::parse("maxTrials=200:maxSamples=10").unwrap();
        let mut ls = DeepLocalSearch::new(x.problem(), flag, &params).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        ls.search(&mut x, &mut rng);
        assert!(x.objective() < start);
        assert!(x.check());
        let settled = x.clone();
        ls.search(&mut x, &mut rng);
        assert_eq!(settled, x);
    }
}
