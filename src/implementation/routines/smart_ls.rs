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

//! This module provides the smart local search: proposals advance along
//! randomized arithmetic progressions (random starting point and stride),
//! renewed every few trials, instead of being drawn independently. This walks
//! the neighborhood faster than uniform sampling while keeping the same
//! best-of-batch acceptance as the deep search.

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

/// Best-of-batch descent on strided sweeps with periodic renewal.
pub struct SmartLocalSearch {
    flag: Arc<AtomicBool>,
    max_trials: u64,
    max_samples: u64,
    unit_step: bool,
}

impl SmartLocalSearch {
    pub fn new(
        problem: &Problem,
        flag: Arc<AtomicBool>,
        params: &ParameterMap,
    ) -> Result<Self, HeuristicError> {
        let max_trials = params.get_or("maxTrials", default_max_trials(problem))?;
        let max_samples = params.get_or("maxSamples", 1000)?;
        let unit_step = params.get_flag_or("unitStep", false)?;
        Ok(SmartLocalSearch { flag, max_trials, max_samples, unit_step })
    }
}

impl LocalSearchRoutine for SmartLocalSearch {
    fn search(&mut self, x: &mut SolutionInfo, rng: &mut SmallRng) {
        if degenerate(x) {
            return;
        }
        let p_count = x.problem().process_count();
        let m_count = x.problem().machine_count();
        let renewal = 50.min(p_count.min(m_count)) as u64;
        let p_step_max = 1.max(p_count / renewal as usize);
        let m_step_max = 1.max(m_count / renewal as usize);
        let mut mv = MoveVerifier::new(x);
        let mut ev = ExchangeVerifier::new(x);
        let mut x_obj = x.objective();
        let mut best_obj = x_obj;
        let mut best = Proposal::Move(Move::new(0, 0, 0));
        while !self.flag.load(Ordering::Relaxed) {
            let mut samples = 0;
            let mut trials = 0u64;
            let mut p = 0;
            let mut p_step = 1;
            let mut dst = 0;
            let mut dst_step = 1;
            let mut p1 = 0;
            let mut p1_step = 1;
            let mut p2 = 0;
            let mut p2_step = 1;
            while samples < self.max_samples && trials < self.max_trials {
                if trials % renewal == 0 {
                    p = rng.gen_range(0..p_count);
                    p_step = if self.unit_step { 1 } else { rng.gen_range(1..=p_step_max) };
                    dst = rng.gen_range(0..m_count);
                    dst_step = if self.unit_step { 1 } else { rng.gen_range(1..=m_step_max) };
                    p1 = rng.gen_range(0..p_count);
                    p1_step = if self.unit_step { 1 } else { rng.gen_range(1..=p_step_max) };
                    p2 = rng.gen_range(0..p_count);
                    p2_step = if self.unit_step { 1 } else { rng.gen_range(1..=p_step_max) };
                }
                trials += 1;
                if trials % 2 == 0 {
                    p = (p + p_step) % p_count;
                    dst = (dst + dst_step) % m_count;
                    let src = x.solution()[p];
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
                } else {
                    p1 = (p1 + p1_step) % p_count;
                    p2 = (p2 + p2_step) % p_count;
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
mod test_smart_ls {
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
    fn strided_sweeps_still_descend() {
        let mut x = overloaded();
        let start = x.objective();
        let flag = Arc::new(AtomicBool::new(false));
        let params = ParameterMap::parse("maxTrials=200:maxSamples=5").unwrap();
        let mut ls = SmartLocalSearch::new(x.problem(), flag, &params).unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        ls.search(&mut x, &mut rng);
        assert!(x.objective() < start);
        assert!(x.check());
    }

    #[test]
    fn unit_step_mode_is_accepted() {
        let mut x = overloaded();
        let flag = Arc::new(AtomicBool::new(false));
        let params = ParameterMap::parse("maxTrials=100:maxSamples=5:unitStep=1").unwrap();
        let mut ls = SmartLocalSearch::new(x.problem(), flag, &params).unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        ls.search(&mut x, &mut rng);
        assert!(x.check());
    }
}
