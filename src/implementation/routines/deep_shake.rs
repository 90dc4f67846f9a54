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

//! This module provides the deep shake: it runs several independent random
//! shakes of the requested length from a snapshot of the starting state and
//! keeps the one landing on the smallest objective.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::abstraction::{HeuristicError, ShakeRoutine};
use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::params::ParameterMap;
use crate::implementation::routines::{degenerate, random_exchange, random_move};
use crate::implementation::verifiers::exchange_verifier::ExchangeVerifier;
use crate::implementation::verifiers::move_verifier::MoveVerifier;

/// The sampled random jump: `samples` independent length-`k` shakes, best
/// landing point wins.
pub struct DeepShake {
    flag: Arc<AtomicBool>,
    max_trials: u64,
    samples: u64,
}

impl DeepShake {
    pub fn new(
        _problem: &Problem,
        flag: Arc<AtomicBool>,
        params: &ParameterMap,
    ) -> Result<Self, HeuristicError> {
        let max_trials = params.get_or("maxTrials", 1000)?;
        let samples = params.get_or("samples", 100)?;
        Ok(DeepShake { flag, max_trials, samples })
    }
}

impl ShakeRoutine for DeepShake {
    fn shake(&mut self, x: &mut SolutionInfo, k: u64, rng: &mut SmallRng) {
        if degenerate(x) {
            return;
        }
        let mut best_obj = u64::MAX;
        let mut best_solution = x.solution().to_vec();
        for _ in 0..self.samples {
            let mut trial_state = x.clone();
            let mut mv = MoveVerifier::new(&trial_state);
            let mut ev = ExchangeVerifier::new(&trial_state);
            for _ in 0..k {
                let mut found = false;
                let mut trials = 0;
                while trials < self.max_trials && !self.flag.load(Ordering::Relaxed) && !found {
                    trials += 1;
                    if rng.gen_bool(0.5) {
                        let proposal = random_move(&trial_state, rng);
                        if mv.feasible(&trial_state, proposal) {
                            mv.commit(&mut trial_state, proposal);
                            found = true;
                        }
                    } else {
                        let proposal = random_exchange(&trial_state, rng);
                        if ev.feasible(&trial_state, proposal) {
                            ev.commit(&mut trial_state, proposal);
                            found = true;
                        }
                    }
                }
                if !found {
                    break;
                }
            }
            let obj = trial_state.objective();
            if obj < best_obj {
                best_obj = obj;
                best_solution = trial_state.solution().to_vec();
            }
        }
        *x = SolutionInfo::from_assignment(x.problem_handle(), x.initial_handle(), best_solution);
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_deep_shake {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use crate::*;

    fn roomy() -> SolutionInfo {
        let values = vec![
            1, 0, 1, //
            3, //
            0, 0, 10, 10, 0, 1, 1, //
            0, 0, 10, 10, 1, 0, 1, //
            0, 0, 10, 10, 1, 1, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 2, 1, //
            1, 2, 1, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        SolutionInfo::new(pb, Arc::new(vec![0, 1]))
    }

    #[test]
    fn the_best_of_the_samples_is_kept_and_consistent() {
        let mut x = roomy();
        let flag = Arc::new(AtomicBool::new(false));
        let params = ParameterMap::parse("samples=4:maxTrials=50").unwrap();
        let mut shaker = DeepShake::new(x.problem(), flag, &params).unwrap();
        let mut rng = SmallRng::seed_from_u64(9);
        shaker.shake(&mut x, 2, &mut rng);
        assert!(x.check());
        assert!(crate::implementation::model::verifier::feasible(&x));
    }
}
