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

//! This module provides the sequential local search: rather than sampling the
//! neighborhood uniformly, it sweeps `(process, machine)` pairs in wrapping
//! arithmetic progressions and enumerates exchanges across the process sets
//! of two chosen machines, re-randomizing the starting points periodically.
//! Acceptance is the same best-of-batch rule as the deep search.

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

/// Best-of-batch descent over deterministic sweeps with random restarts.
pub struct SequentialLocalSearch {
    flag: Arc<AtomicBool>,
    max_trials: u64,
    max_samples: u64,
}

impl SequentialLocalSearch {
    pub fn new(
        problem: &Problem,
        flag: Arc<AtomicBool>,
        params: &ParameterMap,
    ) -> Result<Self, HeuristicError> {
        let max_trials = params.get_or("maxTrials", default_max_trials(problem))?;
        let max_samples = params.get_or("maxSamples", 1000)?;
        Ok(SequentialLocalSearch { flag, max_trials, max_samples })
    }
}

impl LocalSearchRoutine for SequentialLocalSearch {
    fn search(&mut self, x: &mut SolutionInfo, rng: &mut SmallRng) {
        if degenerate(x) {
            return;
        }
        let p_count = x.problem().process_count();
        let m_count = x.problem().machine_count();
        let p_sequence = p_count.min(30);
        let m_sequence = m_count.min(30);
        let mut mv = MoveVerifier::new(x);
        let mut ev = ExchangeVerifier::new(x);
        let mut x_obj = x.objective();
        let mut best_obj = x_obj;
        let mut best = Proposal::Move(Move::new(0, 0, 0));
        while !self.flag.load(Ordering::Relaxed) {
            let mut samples = 0;
            let mut trials = 0;
            // move sweep state
            let mut p_start = rng.gen_range(0..p_count);
            let mut i = 0;
            let mut m_start = rng.gen_range(0..m_count);
            let mut j = 0;
            // exchange sweep state
            let mut m1 = rng.gen_range(0..m_count);
            let mut m2 = rng.gen_range(0..m_count);
            let mut m1_procs: Vec<ProcessId> = vec![];
            let mut m2_procs: Vec<ProcessId> = vec![];
            let mut k1 = 0;
            let mut k2 = 0;
            let mut init_procs = true;
            while samples < self.max_samples && trials < self.max_trials {
                if trials % 2 == 0 {
                    let p = (p_start + i) % p_count;
                    let m = (m_start + j) % m_count;
                    let src = x.solution()[p];
                    if m != src {
                        trials += 1;
                        let proposal = Move::new(p, src, m);
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
                    j += 1;
                    if j == m_sequence {
                        j = 0;
                        i += 1;
                        if i == p_sequence {
                            i = 0;
                            p_start = rng.gen_range(0..p_count);
                            m_start = rng.gen_range(0..m_count);
                        }
                    }
                } else {
                    if init_procs {
                        m1_procs.clear();
                        m2_procs.clear();
                        for (h, &m) in x.solution().iter().enumerate() {
                            if m == m1 {
                                m1_procs.push(h);
                            } else if m == m2 {
                                m2_procs.push(h);
                            }
                        }
                        init_procs = false;
                    }
                    if m1_procs.is_empty() || m2_procs.is_empty() {
                        // a barren machine pair: burn the trial and redraw
                        trials += 1;
                        m1 = rng.gen_range(0..m_count);
                        m2 = rng.gen_range(0..m_count);
                        k1 = 0;
                        k2 = 0;
                        init_procs = true;
                        continue;
                    }
                    let p1 = m1_procs[k1];
                    let p2 = m2_procs[k2];
                    trials += 1;
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
                    k2 += 1;
                    if k2 == m2_procs.len() {
                        k2 = 0;
                        k1 += 1;
                        if k1 == m1_procs.len() {
                            m1 = rng.gen_range(0..m_count);
                            m2 = rng.gen_range(0..m_count);
                            k1 = 0;
                            k2 = 0;
                            init_procs = true;
                        }
                    }
                }
            }
            if samples == 0 && trials >= self.max_trials {
                break;
            }
            if samples >= self.max_samples || trials >= self.max_trials {
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
mod test_sequential_ls {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use crate::*;

    fn overloaded() -> SolutionInfo {
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
        let pb = Arc::new(Problem::parse(&values).unwrap());
        SolutionInfo::new(pb, Arc::new(vec![0, 0, 0]))
    }

    #[test]
    fn sweeping_finds_the_improving_moves() {
        let mut x = overloaded();
        let start = x.objective();
        let flag = Arc::new(AtomicBool::new(false));
        let params = ParameterMap::parse("maxTrials=300:maxSamples=5").unwrap();
        let mut ls = SequentialLocalSearch::new(x.problem(), flag, &params).unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        ls.search(&mut x, &mut rng);
        assert!(x.objective() < start);
        assert!(x.check());
    }
}
