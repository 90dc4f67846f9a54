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

//! This module provides the simulated-annealing heuristic. The starting
//! temperature is calibrated by sweeping feasible neighbors of the initial
//! solution and taking the largest objective delta encountered; the cooling
//! schedule is geometric, with a ratio-based reheat that halves a reset
//! temperature every time too many consecutive sweeps fail to improve.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::abstraction::{Heuristic, HeuristicError, HeuristicSetup};
use crate::common::*;
use crate::implementation::heuristics::annealing_sweep::AnnealingSweep;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::verifiers::exchange_verifier::ExchangeVerifier;
use crate::implementation::verifiers::move_verifier::MoveVerifier;

/// Instances with more than this many process-machine pairs are not worth
/// annealing within any realistic budget: the heuristic then completes
/// immediately and leaves the field to the others.
const PROBLEM_SIZE_LIMIT: u64 = 50_000_000;
/// The default geometric cooling factor.
const REDUCE_FACTOR: f64 = 0.97;
/// How many consecutive non-improving sweeps trigger a reheat.
const VIOLATION_THRESHOLD: u32 = 15;
/// The running temperature never drops below `T_max / 2^MAX_DIVISIONS`.
const MAX_DIVISIONS: i32 = 100;
/// The reset temperature floor is `T_max / 2^MAX_DIVISIONS_RESET`.
const MAX_DIVISIONS_RESET: i32 = 50;

/// The Metropolis heuristic around `AnnealingSweep`. Parameters: `min_t`,
/// `r_factor`, `read_pool`, plus the `SAls@...` group forwarded to the sweep.
pub struct SimulatedAnnealing {
    setup: HeuristicSetup,
    rng: SmallRng,
    best: Option<SolutionInfo>,
}

impl SimulatedAnnealing {
    pub fn new(setup: HeuristicSetup) -> Self {
        let rng = SmallRng::seed_from_u64(setup.seed);
        SimulatedAnnealing { setup, rng, best: None }
    }

    /// Samples the neighborhood of `x` (sequentially advancing indices over
    /// `|P| * |M|` trials) and returns the largest feasible objective delta,
    /// or the current objective when no feasible neighbor was sampled.
    fn calibrate(&mut self, x: &SolutionInfo) -> f64 {
        let p_count = x.problem().process_count();
        let m_count = x.problem().machine_count();
        let mut mv = MoveVerifier::new(x);
        let mut ev = ExchangeVerifier::new(x);
        let base = x.objective() as i64;
        let mut max_diff: u64 = 0;
        let mut feasible_count: u64 = 0;
        let (mut p, mut dst, mut p1, mut p2) = (0, 0, 0, 0);
        let max_samples = (p_count as u64) * (m_count as u64);
        for sample in 0..max_samples {
            if sample % 1024 == 0 && self.setup.interrupted() {
                break;
            }
            if sample % 2 == 0 {
                p = (p + 1) % p_count;
                dst = (dst + 1) % m_count;
                let src = x.solution()[p];
                if src != dst {
                    let proposal = Move::new(p, src, dst);
                    if mv.feasible(x, proposal) {
                        feasible_count += 1;
                        let diff = (mv.objective(x, proposal) as i64 - base).unsigned_abs();
                        max_diff = max_diff.max(diff);
                    }
                }
            } else {
                p1 = (p1 + 1) % p_count;
                loop {
                    p2 = (p2 + 1) % p_count;
                    if p1 != p2 {
                        break;
                    }
                }
                let m1 = x.solution()[p1];
                let m2 = x.solution()[p2];
                if m1 != m2 {
                    let proposal = Exchange::new(m1, p1, m2, p2);
                    if ev.feasible(x, proposal) {
                        feasible_count += 1;
                        let diff = (ev.objective(x, proposal) as i64 - base).unsigned_abs();
                        max_diff = max_diff.max(diff);
                    }
                }
            }
        }
        if feasible_count > 0 {
            (max_diff as f64).max(1.0)
        } else {
            (x.objective() as f64).max(1.0)
        }
    }
}

impl Heuristic for SimulatedAnnealing {
    fn name(&self) -> &str {
        "simulated_annealing"
    }

    fn run(&mut self) -> Result<(), HeuristicError> {
        let params = &self.setup.params;
        let min_t: f64 = params.get_or("min_t", 1.0)?;
        let reduce_factor: f64 = params.get_or("r_factor", REDUCE_FACTOR)?;
        let read_pool = params.get_flag_or("read_pool", false)?;
        let sweep_params = params.group("SAls")?;
        let problem = Arc::clone(&self.setup.problem);
        if (problem.process_count() as u64) * (problem.machine_count() as u64)
            > PROBLEM_SIZE_LIMIT
        {
            return Ok(());
        }
        let mut sweep =
            AnnealingSweep::new(&problem, Arc::clone(&self.setup.flag), min_t, &sweep_params)?;
        self.best = Some(SolutionInfo::new(problem, Arc::clone(&self.setup.initial)));
        let max_t = {
            let best = self.best.take().unwrap();
            let max_t = self.calibrate(&best);
            self.best = Some(best);
            max_t
        };

        let SimulatedAnnealing { setup, rng, best } = self;
        let best = best.as_mut().unwrap();
        // a run launched from an infeasible placement publishes nothing until
        // it first reaches the feasible region; feasibility is preserved from
        // then on, since every committed proposal is verified
        let mut feasible_run = crate::implementation::model::verifier::feasible(best);
        if feasible_run {
            setup.pool.push(best.objective(), best.solution());
        }

        let mut temperature = max_t;
        let mut reset_temperature = temperature;
        let mut best_move_temperature = temperature;
        let lowest_temperature = max_t / 2f64.powi(MAX_DIVISIONS);
        let lowest_reset_temperature = max_t / 2f64.powi(MAX_DIVISIONS_RESET);
        let mut violation_counter = 0;
        while !setup.interrupted() {
            let sweep_start_objective = best.objective();
            sweep.search(best, sweep_start_objective, max_t, temperature, rng);
            let sweep_end_objective = best.objective();
            if let Some(t) = sweep.best_move_temperature() {
                best_move_temperature = t;
            }
            if !feasible_run {
                feasible_run = crate::implementation::model::verifier::feasible(best);
            }
            if feasible_run {
                setup.pool.push(sweep_end_objective, best.solution());
            }
            let ratio = sweep_end_objective as f64 / (sweep_start_objective.max(1)) as f64;
            if ratio >= 1.0 {
                if violation_counter < VIOLATION_THRESHOLD {
                    violation_counter += 1;
                }
            } else if violation_counter > 0 {
                violation_counter -= 1;
            }
            if violation_counter >= VIOLATION_THRESHOLD {
                violation_counter = 0;
                reset_temperature /= 2.0;
                temperature = if reset_temperature >= temperature {
                    reset_temperature
                } else {
                    best_move_temperature
                };
                if reset_temperature < lowest_reset_temperature {
                    reset_temperature = temperature / 2f64.powi(MAX_DIVISIONS_RESET);
                }
                if read_pool {
                    if let Some(entry) = setup.pool.best() {
                        if entry.obj() < best.objective() {
                            *best = SolutionInfo::from_assignment(
                                Arc::clone(&setup.problem),
                                Arc::clone(&setup.initial),
                                entry.solution().as_ref().clone(),
                            );
                        }
                    }
                }
            } else if temperature >= lowest_temperature {
                temperature *= reduce_factor;
            }
        }
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
mod test_simulated_annealing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::*;

    fn setup(values: Vec<u64>, initial: Vec<MachineId>) -> HeuristicSetup {
        let problem = Arc::new(Problem::parse(&values).unwrap());
        HeuristicSetup {
            problem,
            initial: Arc::new(initial),
            seed: 0,
            flag: Arc::new(AtomicBool::new(false)),
            pool: Arc::new(SolutionPool::new(PoolConfig::default())),
            params: ParameterMap::default(),
        }
    }

    fn overloaded_setup() -> HeuristicSetup {
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
        setup(values, vec![0, 0, 0])
    }

    #[test]
    fn annealing_improves_over_the_initial_solution() {
        let setup = overloaded_setup();
        let flag = Arc::clone(&setup.flag);
        let pool = Arc::clone(&setup.pool);
        let mut sa = SimulatedAnnealing::new(setup);
        let worker = std::thread::spawn(move || sa.run());
        std::thread::sleep(std::time::Duration::from_millis(200));
        flag.store(true, Ordering::Relaxed);
        assert!(worker.join().unwrap().is_ok());
        // the initial objective is 80; the pool received something better
        assert!(pool.best().unwrap().obj() < 80);
    }

    #[test]
    fn oversized_instances_are_refused_immediately() {
        // 1000 machines * 50001 processes > 50e6: the heuristic must return
        // without touching the pool. One process per service keeps the
        // instance construction linear.
        let m_count = 1000u64;
        let p_count = 50_001u64;
        let mut values = vec![1, 0, 1];
        values.push(m_count);
        for m in 0..m_count {
            values.extend_from_slice(&[0, 0, 1_000_000, 1_000_000]);
            for m2 in 0..m_count {
                values.push(u64::from(m != m2));
            }
        }
        values.push(p_count);
        for _ in 0..p_count {
            values.extend_from_slice(&[1, 0]);
        }
        values.push(p_count);
        for s in 0..p_count {
            values.extend_from_slice(&[s, 1, 1]);
        }
        values.push(0);
        values.extend_from_slice(&[1, 1, 1]);
        let initial: Vec<MachineId> = (0..p_count as usize).map(|p| p % m_count as usize).collect();
        let setup = setup(values, initial);
        let pool = Arc::clone(&setup.pool);
        let mut sa = SimulatedAnnealing::new(setup);
        assert!(sa.run().is_ok());
        assert!(pool.best().is_none());
    }
}
