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

//! This module provides the inner sweep of the simulated annealing: a fixed
//! number of Metropolis trials at one temperature. Candidates are produced by
//! *sequentially advancing* a process index and a machine index from random
//! starting points -- which covers the neighborhood much faster than
//! independent resampling -- and the move-versus-exchange choice follows a
//! log-interpolated probability of the current temperature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::abstraction::HeuristicError;
use crate::common::*;
use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::params::ParameterMap;
use crate::implementation::verifiers::exchange_verifier::ExchangeVerifier;
use crate::implementation::verifiers::move_verifier::MoveVerifier;

/// The largest probability of proposing a move rather than an exchange.
const INIT_PROB_MOVE: f64 = 0.8;
/// The smallest probability of proposing a move rather than an exchange.
const MIN_PROB_MOVE: f64 = 0.2;

/// One-temperature Metropolis sweep over `ceil(|P| * (log10 |P| + log10 |M|))`
/// trials.
pub(crate) struct AnnealingSweep {
    flag: Arc<AtomicBool>,
    max_iterations: u64,
    min_temperature: f64,
    init_prob_move: f64,
    min_prob_move: f64,
    best_move_temperature: Option<f64>,
}

impl AnnealingSweep {
    pub(crate) fn new(
        problem: &Problem,
        flag: Arc<AtomicBool>,
        default_min_t: f64,
        params: &ParameterMap,
    ) -> Result<Self, HeuristicError> {
        let p = problem.process_count() as f64;
        let m = problem.machine_count() as f64;
        let max_iterations = (p * (p.log10() + m.log10())).ceil().max(1.0) as u64;
        Ok(AnnealingSweep {
            flag,
            max_iterations,
            min_temperature: params.get_or("min_t", default_min_t)?,
            init_prob_move: params.get_or("i_prob", INIT_PROB_MOVE)?,
            min_prob_move: params.get_or("min_prob", MIN_PROB_MOVE)?,
            best_move_temperature: None,
        })
    }

    /// The temperature at which the last sweep found an improving proposal,
    /// if it found any.
    pub(crate) fn best_move_temperature(&self) -> Option<f64> {
        self.best_move_temperature
    }

    /// The probability of proposing a move: interpolated between the extremes
    /// on a log-temperature scale, so that exchanges dominate as the system
    /// cools down.
    fn probability(&self, max_t: f64, t: f64) -> f64 {
        let prob = self.init_prob_move * (t.ln() - self.min_temperature.ln())
            / (max_t.ln() - self.min_temperature.ln());
        prob.max(self.min_prob_move)
    }

    pub(crate) fn search(
        &mut self,
        x: &mut SolutionInfo,
        current_objective: u64,
        max_t: f64,
        t: f64,
        rng: &mut SmallRng,
    ) {
        self.best_move_temperature = None;
        let p_count = x.problem().process_count();
        let m_count = x.problem().machine_count();
        if p_count < 2 || m_count < 2 {
            return;
        }
        let mut mv = MoveVerifier::new(x);
        let mut ev = ExchangeVerifier::new(x);
        let mut current = current_objective as i64;
        let mut p = rng.gen_range(0..p_count);
        let mut dst = rng.gen_range(0..m_count);
        let mut p1 = rng.gen_range(0..p_count);
        let mut p2 = loop {
            let candidate = rng.gen_range(0..p_count);
            if candidate != p1 {
                break candidate;
            }
        };
        let prob_move = self.probability(max_t, t);
        let mut iteration = 0;
        while iteration < self.max_iterations && !self.flag.load(Ordering::Relaxed) {
            iteration += 1;
            if rng.gen::<f64>() < prob_move {
                p = (p + 1) % p_count;
                let src = x.solution()[p];
                loop {
                    dst = (dst + 1) % m_count;
                    if dst != src {
                        break;
                    }
                }
                let proposal = Move::new(p, src, dst);
                if mv.feasible(x, proposal) {
                    let new_objective = mv.objective(x, proposal) as i64;
                    let diff = new_objective - current;
                    if diff < 0 {
                        self.best_move_temperature = Some(t);
                        current = new_objective;
                        mv.commit(x, proposal);
                    } else if rng.gen::<f64>() < (-(diff as f64) / t).exp() {
                        current = new_objective;
                        mv.commit(x, proposal);
                    }
                }
            } else {
                p1 = (p1 + 1) % p_count;
                let m1 = x.solution()[p1];
                let mut m2 = m1;
                // all the processes may share one machine: give up on the
                // exchange after a full cycle of candidates
                for _ in 0..p_count {
                    p2 = (p2 + 1) % p_count;
                    m2 = x.solution()[p2];
                    if m1 != m2 {
                        break;
                    }
                }
                if m1 == m2 {
                    continue;
                }
                let proposal = Exchange::new(m1, p1, m2, p2);
                if ev.feasible(x, proposal) {
                    let new_objective = ev.objective(x, proposal) as i64;
                    let diff = new_objective - current;
                    if diff < 0 {
                        self.best_move_temperature = Some(t);
                        current = new_objective;
                        ev.commit(x, proposal);
                    } else if rng.gen::<f64>() < (-(diff as f64) / t).exp() {
                        current = new_objective;
                        ev.commit(x, proposal);
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
mod test_annealing_sweep {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::AnnealingSweep;
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
    fn a_cold_sweep_only_descends() {
        let mut x = overloaded();
        let start = x.objective();
        let flag = Arc::new(AtomicBool::new(false));
        let mut sweep =
            AnnealingSweep::new(x.problem(), flag, 1.0, &ParameterMap::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(13);
        // a temperature this low makes the uphill acceptance probability
        // vanish, so the state cannot get worse
        for _ in 0..50 {
            let current = x.objective();
            sweep.search(&mut x, current, 1000.0, 1e-9, &mut rng);
            assert!(x.objective() <= current);
        }
        assert!(x.objective() <= start);
        assert!(x.check());
    }

    #[test]
    fn an_improving_sweep_reports_its_temperature() {
        let mut x = overloaded();
        let flag = Arc::new(AtomicBool::new(false));
        let mut sweep =
            AnnealingSweep::new(x.problem(), flag, 1.0, &ParameterMap::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(13);
        let mut improved_at = None;
        for _ in 0..50 {
            let current = x.objective();
            sweep.search(&mut x, current, 1000.0, 1e-9, &mut rng);
            if let Some(t) = sweep.best_move_temperature() {
                improved_at = Some(t);
                break;
            }
        }
        assert_eq!(Some(1e-9), improved_at);
    }
}
