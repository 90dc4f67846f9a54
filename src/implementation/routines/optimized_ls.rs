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

//! This module provides the optimized local search: the same best-of-batch
//! acceptance as the deep search, but candidate indices are generated in
//! blocks to amortize the cost of the random generator over many trials.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::abstraction::{HeuristicError, LocalSearchRoutine};
use crate::common::*;
use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::params::ParameterMap;
use crate::implementation::routines::{default_max_trials, degenerate, Proposal};
use crate::implementation::verifiers::exchange_verifier::ExchangeVerifier;
use crate::implementation::verifiers::move_verifier::MoveVerifier;

/// Best-of-batch descent on block-generated random candidates. The `block`
/// parameter sizes the index buffers; every `block * block` trials of one
/// kind consume one buffer refill.
pub struct OptimizedLocalSearch {
    flag: Arc<AtomicBool>,
    max_trials: u64,
    max_samples: u64,
    block: usize,
}

impl OptimizedLocalSearch {
    pub fn new(
        problem: &Problem,
        flag: Arc<AtomicBool>,
        params: &ParameterMap,
    ) -> Result<Self, HeuristicError> {
        let max_trials = params.get_or("maxTrials", default_max_trials(problem))?;
        let max_samples = params.get_or("maxSamples", 1000)?;
        let block = params.get_or("block", 20)?;
        Ok(OptimizedLocalSearch { flag, max_trials, max_samples, block: block.max(1) })
    }
}

impl LocalSearchRoutine for OptimizedLocalSearch {
    fn search(&mut self, x: &mut SolutionInfo, rng: &mut SmallRng) {
        if degenerate(x) {
            return;
        }
        let p_count = x.problem().process_count();
        let m_count = x.problem().machine_count();
        let block = self.block;
        let mut mv = MoveVerifier::new(x);
        let mut ev = ExchangeVerifier::new(x);
        let mut x_obj = x.objective();
        let mut best_obj = x_obj;
        let mut best = Proposal::Move(Move::new(0, 0, 0));
        let mut pvec = vec![0; block];
        let mut mvec = vec![0; block];
        let mut p1vec = vec![0; block];
        let mut p2vec = vec![0; block];
        while !self.flag.load(Ordering::Relaxed) {
            let mut trials = 0;
            let mut samples = 0;
            let mut renew_move = true;
            let mut renew_exchange = true;
            let (mut pi, mut mi) = (0, 0);
            let (mut p1i, mut p2i) = (0, 0);
            while trials < self.max_trials && samples < self.max_samples {
                if renew_move {
                    for i in 0..block {
                        pvec[i] = rng.gen_range(0..p_count);
                        mvec[i] = rng.gen_range(0..m_count);
                    }
                    renew_move = false;
                }
                if renew_exchange {
                    for i in 0..block {
                        p1vec[i] = rng.gen_range(0..p_count);
                        p2vec[i] = rng.gen_range(0..p_count);
                    }
                    renew_exchange = false;
                }
                trials += 1;
                if trials % 2 == 0 {
                    let p = pvec[pi];
                    let dst = mvec[mi];
                    let src = x.solution()[p];
                    // a self-move simply burns the trial
                    if src != dst {
                        let proposal = Move::new(p, src, dst);
                        if mv.feasible(x, proposal) {
                            let obj = mv.objective(x, proposal);
                            if obj < x_obj {
                                samples += 1;
                                if obj < best_obj {
                                    best_obj = obj;
                                    best = Proposal::Move(proposal);
                                }
                            }
                        }
                    }
                    mi += 1;
                    if mi == block {
                        mi = 0;
                        pi += 1;
                        if pi == block {
                            pi = 0;
                            renew_move = true;
                        }
                    }
                } else {
                    let p1 = p1vec[p1i];
                    let p2 = p2vec[p2i];
                    let m1 = x.solution()[p1];
                    let m2 = x.solution()[p2];
                    if p1 != p2 && m1 != m2 {
                        let proposal = Exchange::new(m1, p1, m2, p2);
                        if ev.feasible(x, proposal) {
                            let obj = ev.objective(x, proposal);
                            if obj < x_obj {
                                samples += 1;
                                if obj < best_obj {
                                    best_obj = obj;
                                    best = Proposal::Exchange(proposal);
                                }
                            }
                        }
                    }
                    p2i += 1;
                    if p2i == block {
                        p2i = 0;
                        p1i += 1;
                        if p1i == block {
                            p1i = 0;
                            renew_exchange = true;
                        }
                    }
                }
            }
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
mod test_optimized_ls {
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
    fn block_generation_descends_like_the_deep_search() {
        let mut x = overloaded();
        let start = x.objective();
        let flag = Arc::new(AtomicBool::new(false));
        let params = ParameterMap::parse("maxTrials=200:maxSamples=5:block=4").unwrap();
        let mut ls = OptimizedLocalSearch::new(x.problem(), flag, &params).unwrap();
        let mut rng = SmallRng::seed_from_u64(5);
        ls.search(&mut x, &mut rng);
        assert!(x.objective() < start);
        assert!(x.check());
        let settled = x.clone();
        ls.search(&mut x, &mut rng);
        assert_eq!(settled, x);
    }
}
