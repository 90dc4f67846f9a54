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

//! This module and its submodules provide the concrete implementation of the
//! solver: the data model, the delta verifiers, the solution pool, the
//! search routines and heuristics, the cost optimizers and the engine that
//! runs them all in parallel.

pub mod engine;
pub mod heuristics;
pub mod model;
pub mod optimizers;
pub mod params;
pub mod pool;
pub mod routines;
pub mod verifiers;

pub use engine::{Engine, EngineError, EngineOutcome};
pub use heuristics::*;
pub use model::analysis::analyze;
pub use model::problem::{
    BalanceCost, DependencyGraph, Machine, ParseError, Problem, Process, Resource, Service,
};
pub use model::solution::SolutionInfo;
pub use model::verifier::{structure_feasible, verify, VerifyResult};
pub use optimizers::*;
pub use params::{ParamError, ParameterMap};
pub use pool::{PoolConfig, PoolEntry, SolutionPool, Subscription};
pub use routines::{
    local_search_by_name, shake_by_name, DeepLocalSearch, DeepShake, OptimizedLocalSearch,
    RandomLocalSearch, RandomShake, SequentialLocalSearch, SmartLocalSearch, SmartShaker,
};
pub use verifiers::batch_verifier::BatchVerifier;
pub use verifiers::exchange_verifier::ExchangeVerifier;
pub use verifiers::move_verifier::MoveVerifier;
