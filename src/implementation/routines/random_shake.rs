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

//! This module provides the random shake: `k` perturbation steps, each one
//! accepting the first feasible random move or exchange it stumbles upon,
//! whatever its effect on the objective.

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

/// The plain random jump. Each step retries up to `maxTrials` proposals; a
/// step that cannot find any feasible perturbation ends the shake early.
pub struct RandomShake {
    flag: Arc<AtomicBool>,
    max_trials: u64,
}

impl RandomShake {
    pub fn new(
        _problem: &Problem,
        flag: Arc<AtomicBool>,
        params: &ParameterMap,
    ) -> Result<Self, HeuristicError> {
        let max_trials = params.get_or("maxTrials", 1000)?;
        Ok(RandomShake { flag, max_trials })
    }
}

impl ShakeRoutine for RandomShake {
    fn shake(&mut self, x: &mut SolutionInfo, k: u64, rng: &mut SmallRng) {
        if degenerate(x) {
            return;
        }
        let mut mv = MoveVerifier::new(x);
        let mut ev = ExchangeVerifier::new(x);
        for _ in 0..k {
            let mut found = false;
            let mut trials = 0;
            while trials < self.max_trials && !self.flag.load(Ordering::Relaxed) && !found {
                trials += 1;
                if rng.gen_bool(0.5) {
                    let proposal = random_move(x, rng);
                    if mv.feasible(x, proposal) {
                        mv.commit(x, proposal);
                        found = true;
                    }
                } else {
                    let proposal = random_exchange(x, rng);
                    if ev.feasible(x, proposal) {
                        ev.commit(x, proposal);
                        found = true;
                    }
                }
            }
            if !found {
                break;
            }
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_random_shake {
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
    fn shaking_preserves_feasibility() {
        let mut x = roomy();
        let flag = Arc::new(AtomicBool::new(false));
        let mut shaker = RandomShake::new(x.problem(), flag, &ParameterMap::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        shaker.shake(&mut x, 5, &mut rng);
        assert!(x.check());
        assert!(crate::implementation::model::verifier::feasible(&x));
    }

    #[test]
    fn shaking_actually_moves_the_solution() {
        let mut x = roomy();
        let before = x.solution().to_vec();
        let flag = Arc::new(AtomicBool::new(false));
        let mut shaker = RandomShake::new(x.problem(), flag, &ParameterMap::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        // every non-self proposal is feasible on this instance, so a single
        // step must commit something
        shaker.shake(&mut x, 1, &mut rng);
        assert_ne!(before, x.solution());
    }
}
