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

//! This module comprises the concrete local-search and shake routines the
//! heuristics compose, along with the name-based constructors used when a
//! routine is selected from a configuration string.

mod deep_ls;
mod deep_shake;
mod optimized_ls;
mod random_ls;
mod random_shake;
mod sequential_ls;
mod smart_ls;
mod smart_shaker;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;

pub use deep_ls::DeepLocalSearch;
pub use deep_shake::DeepShake;
pub use optimized_ls::OptimizedLocalSearch;
pub use random_ls::RandomLocalSearch;
pub use random_shake::RandomShake;
pub use sequential_ls::SequentialLocalSearch;
pub use smart_ls::SmartLocalSearch;
pub use smart_shaker::SmartShaker;

use crate::abstraction::{HeuristicError, LocalSearchRoutine, ShakeRoutine};
use crate::common::*;
use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::params::ParameterMap;

/// Builds the local-search routine registered under `name`.
pub fn local_search_by_name(
    name: &str,
    problem: &Problem,
    flag: &Arc<AtomicBool>,
    params: &ParameterMap,
) -> Result<Box<dyn LocalSearchRoutine>, HeuristicError> {
    match name {
        "random" => Ok(Box::new(RandomLocalSearch::new(problem, Arc::clone(flag), params)?)),
        "deep" => Ok(Box::new(DeepLocalSearch::new(problem, Arc::clone(flag), params)?)),
        "sequential" => Ok(Box::new(SequentialLocalSearch::new(problem, Arc::clone(flag), params)?)),
        "smart" => Ok(Box::new(SmartLocalSearch::new(problem, Arc::clone(flag), params)?)),
        "optimized" => Ok(Box::new(OptimizedLocalSearch::new(problem, Arc::clone(flag), params)?)),
        _ => Err(HeuristicError::UnknownLocalSearch(name.to_string())),
    }
}

/// Builds the shake routine registered under `name`.
pub fn shake_by_name(
    name: &str,
    problem: &Problem,
    flag: &Arc<AtomicBool>,
    params: &ParameterMap,
) -> Result<Box<dyn ShakeRoutine>, HeuristicError> {
    match name {
        "random" => Ok(Box::new(RandomShake::new(problem, Arc::clone(flag), params)?)),
        "deep" => Ok(Box::new(DeepShake::new(problem, Arc::clone(flag), params)?)),
        "smart" => Ok(Box::new(SmartShaker::new(problem, Arc::clone(flag), params)?)),
        _ => Err(HeuristicError::UnknownShake(name.to_string())),
    }
}

/// The trial budget the local searches default to:
/// `|P| * (log10 |P| + log10 |M|)`, floored at one trial.
pub(crate) fn default_max_trials(problem: &Problem) -> u64 {
    let p = problem.process_count() as f64;
    let m = problem.machine_count() as f64;
    (p * (p.log10() + m.log10())).max(1.0) as u64
}

/// A sampled proposal: the best-of-batch routines remember one of these and
/// commit it at the end of an iteration.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Proposal {
    Move(Move),
    Exchange(Exchange),
}

/// A uniformly random non-self move.
pub(crate) fn random_move(x: &SolutionInfo, rng: &mut SmallRng) -> Move {
    let p_count = x.problem().process_count();
    let m_count = x.problem().machine_count();
    loop {
        let p = rng.gen_range(0..p_count);
        let src = x.solution()[p];
        let dst = rng.gen_range(0..m_count);
        if src != dst {
            return Move::new(p, src, dst);
        }
    }
}

/// A uniformly random exchange of two distinct processes.
pub(crate) fn random_exchange(x: &SolutionInfo, rng: &mut SmallRng) -> Exchange {
    let p_count = x.problem().process_count();
    loop {
        let p1 = rng.gen_range(0..p_count);
        let p2 = rng.gen_range(0..p_count);
        if p1 != p2 {
            return Exchange::new(x.solution()[p1], p1, x.solution()[p2], p2);
        }
    }
}

/// True when the instance is too small for any move or exchange to exist;
/// the routines bail out instead of spinning on degenerate proposals.
pub(crate) fn degenerate(x: &SolutionInfo) -> bool {
    x.problem().process_count() < 2 || x.problem().machine_count() < 2
}
