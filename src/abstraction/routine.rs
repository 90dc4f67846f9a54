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

//! This module defines the two routine families composed by the heuristics:
//! local-search routines (strict descent within the current basin) and shake
//! routines (random jumps used to escape it). Both families are closed and
//! small; they are dispatched through these traits and selected by name.

use rand::rngs::SmallRng;

use crate::implementation::model::solution::SolutionInfo;

/// A strict-descent refinement procedure. `search` runs until the shared
/// interruption flag is raised or the routine's own termination criterion
/// triggers; improvements live in `x`, nothing is returned. A local search
/// never accepts a non-improving proposal, so a state at a local optimum is
/// left untouched.
///
/// The generator belongs to the calling heuristic (one generator per
/// heuristic thread) and is lent to the routine for the duration of the call.
pub trait LocalSearchRoutine: Send {
    fn search(&mut self, x: &mut SolutionInfo, rng: &mut SmallRng);
}

/// A random-jump procedure: `shake` applies `k` random feasible perturbation
/// steps to `x`, regardless of their effect on the objective. When no
/// feasible perturbation can be found for a step, the routine stops early.
pub trait ShakeRoutine: Send {
    fn shake(&mut self, x: &mut SolutionInfo, k: u64, rng: &mut SmallRng);
}
