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

//! This module defines the `Heuristic` trait: the capability every top-level
//! search strategy exposes to the engine, together with the immutable context
//! each heuristic is constructed with.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::common::*;
use crate::implementation::model::problem::Problem;
use crate::implementation::params::{ParamError, ParameterMap};
use crate::implementation::pool::SolutionPool;

/// The ways a heuristic can fail to be built or to run.
#[derive(Debug, thiserror::Error)]
pub enum HeuristicError {
    #[error("unknown heuristic '{0}'")]
    UnknownName(String),
    #[error("unknown local search routine '{0}'")]
    UnknownLocalSearch(String),
    #[error("unknown shake routine '{0}'")]
    UnknownShake(String),
    #[error(transparent)]
    InvalidParameter(#[from] ParamError),
}

/// Everything a heuristic shares with the rest of the engine. The problem and
/// initial assignment are immutable for the whole run; the pool is the only
/// mutable state shared across heuristic threads; the flag is raised once by
/// the driver when the deadline falls.
#[derive(Clone)]
pub struct HeuristicSetup {
    pub problem: Arc<Problem>,
    pub initial: Arc<Assignment>,
    pub seed: u64,
    pub flag: Arc<AtomicBool>,
    pub pool: Arc<SolutionPool>,
    pub params: ParameterMap,
}
impl HeuristicSetup {
    /// Heuristics poll this at their loop boundaries and short-circuit.
    pub fn interrupted(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A top-level search strategy, run by the engine on its own dedicated
/// thread. A heuristic owns its working state and its random generator; it
/// communicates with the other heuristics exclusively through the pool.
pub trait Heuristic: Send {
    /// The registered name of this heuristic.
    fn name(&self) -> &str;
    /// Runs until interruption (or until the strategy decides it is done).
    /// Improvements are published to the pool along the way.
    fn run(&mut self) -> Result<(), HeuristicError>;
    /// After the run, the best assignment this heuristic found on its own.
    fn best_solution(&self) -> &[MachineId];
    /// After the run, the objective value of `best_solution`.
    fn best_objective(&self) -> u64;
}
