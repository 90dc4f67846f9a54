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

//! This module provides the exhaustive best-improvement descent: every sweep
//! evaluates all `(process, machine)` moves and commits the single best
//! improving one, until no move improves. It doubles as a standalone
//! heuristic and as the polishing step of path relinking.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::abstraction::{Heuristic, HeuristicError, HeuristicSetup};
use crate::common::*;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::verifiers::move_verifier::MoveVerifier;

/// Runs the best-improvement descent on `x` until a local optimum (with
/// respect to single moves) or an interruption.
pub fn best_improvement_descent(x: &mut SolutionInfo, flag: &AtomicBool) {
    let problem = x.problem_handle();
    let mut verifier = MoveVerifier::new(x);
    let mut best_obj = x.objective();
    let mut improved = true;
    while improved && !flag.load(Ordering::Relaxed) {
        improved = false;
        let mut top: Option<Move> = None;
        let mut top_obj = best_obj;
        for p in 0..problem.process_count() {
            let src = x.solution()[p];
            for m in 0..problem.machine_count() {
                if src == m {
                    continue;
                }
                let proposal = Move::new(p, src, m);
                if verifier.feasible(x, proposal) {
                    let obj = verifier.objective(x, proposal);
                    if obj < top_obj {
                        top = Some(proposal);
                        top_obj = obj;
                        improved = true;
                    }
                }
            }
            if flag.load(Ordering::Relaxed) {
                break;
            }
        }
        if let Some(proposal) = top {
            verifier.commit(x, proposal);
            best_obj = top_obj;
        }
    }
}

/// The best-improvement descent as a registered heuristic: one descent from
/// the initial assignment, published to the pool.
pub struct BestImprovementLocalSearch {
    setup: HeuristicSetup,
    best_solution: Assignment,
    best_objective: u64,
}

impl BestImprovementLocalSearch {
    pub fn new(setup: HeuristicSetup) -> Self {
        let best_solution = setup.initial.as_ref().clone();
        BestImprovementLocalSearch { setup, best_solution, best_objective: 0 }
    }
}

impl Heuristic for BestImprovementLocalSearch {
    fn name(&self) -> &str {
        "best_improvement_local_search"
    }

    fn run(&mut self) -> Result<(), HeuristicError> {
        let mut info = SolutionInfo::new(
            self.setup.problem.clone(),
            self.setup.initial.clone(),
        );
        best_improvement_descent(&mut info, &self.setup.flag);
        self.best_objective = info.objective();
        self.best_solution = info.solution().to_vec();
        if crate::implementation::model::verifier::feasible(&info) {
            self.setup.pool.push(self.best_objective, &self.best_solution);
        }
        Ok(())
    }

    fn best_solution(&self) -> &[MachineId] {
        &self.best_solution
    }

    fn best_objective(&self) -> u64 {
        self.best_objective
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_best_improvement {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

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
    fn the_descent_finds_the_single_move_optimum() {
        let mut x = overloaded();
        let flag = AtomicBool::new(false);
        best_improvement_descent(&mut x, &flag);
        assert!(x.check());
        // moving the light process away is the best single improvement:
        // load drops from 6*10 to 4*10 and the move costs 1+1+1
        assert_eq!(43, x.objective());
    }

    #[test]
    fn the_descent_is_idempotent_at_the_optimum() {
        let mut x = overloaded();
        let flag = AtomicBool::new(false);
        best_improvement_descent(&mut x, &flag);
        let settled = x.clone();
        best_improvement_descent(&mut x, &flag);
        assert_eq!(settled, x);
    }
}
