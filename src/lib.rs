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

//! # REMACH
//! REMACH is a parallel neighborhood-search solver for the machine
//! reassignment problem: given an initial placement of processes onto
//! machines subject to capacity, transient-capacity, conflict, spread and
//! dependency constraints, it searches for a cheaper feasible placement
//! under a wall-clock budget.
//!
//! The crate revolves around three pieces:
//!
//! * the **incremental solution state** ([`SolutionInfo`]) with its delta
//!   verifiers ([`MoveVerifier`], [`ExchangeVerifier`], [`BatchVerifier`]),
//!   which evaluate a candidate move or exchange in `O(|R| + |B|)` and commit
//!   it in place;
//! * the **heuristics** -- variable-neighborhood search, simulated annealing,
//!   path relinking and a best-improvement descent -- each composed from
//!   small shake and local-search routines;
//! * the **engine** and its shared [`SolutionPool`]: every heuristic runs on
//!   its own thread, publishes its improvements to the pool, and can adopt
//!   the best of what the others found. Consumers (path relinking) subscribe
//!   to the pool and are woken on every accepted insertion.
//!
//! ## Quick example
//! The following loads an instance and searches for one second.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//! use remach::*;
//!
//! // whitespace-separated unsigned integers, in the instance-file layout
//! let instance_text = std::fs::read_to_string("model.txt").unwrap();
//! let values: Vec<u64> = instance_text
//!     .split_whitespace()
//!     .map(|tok| tok.parse().unwrap())
//!     .collect();
//! let problem = Arc::new(Problem::parse(&values).unwrap());
//!
//! // one machine index per process
//! let assignment_text = std::fs::read_to_string("assignment.txt").unwrap();
//! let initial: Arc<Assignment> = Arc::new(
//!     assignment_text
//!         .split_whitespace()
//!         .map(|tok| tok.parse().unwrap())
//!         .collect(),
//! );
//!
//! // a VNS and a simulated annealing exploring in parallel
//! let mut engine = Engine::new(
//!     Arc::clone(&problem),
//!     Arc::clone(&initial),
//!     "vns3#ls=optimized,simulated_annealing",
//!     0,
//! )
//! .unwrap();
//! let outcome = engine.solve(Instant::now() + Duration::from_secs(1)).unwrap();
//!
//! let check = verify(&problem, &initial, outcome.best.solution());
//! assert!(check.feasible);
//! println!("objective: {}", outcome.best.obj());
//! ```

mod abstraction;
mod common;
mod implementation;

pub use abstraction::*;
pub use common::*;
pub use implementation::*;
