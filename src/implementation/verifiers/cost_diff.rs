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

//! This module provides the accumulator for the five cost-term deltas of a
//! proposed move or exchange. The verifiers fill it, evaluate the hypothetical
//! objective through it, and replay it onto the solution state on commit.

use crate::implementation::model::problem::Problem;
use crate::implementation::model::solution::SolutionInfo;

/// The signed difference each cost term would undergo if the proposal under
/// evaluation were applied. One instance is allocated per verifier and reused
/// across proposals.
#[derive(Debug, Clone)]
pub(crate) struct CostDiff {
    pub(crate) load: Vec<i64>,
    pub(crate) balance: Vec<i64>,
    pub(crate) process_move: i64,
    pub(crate) service_move: i64,
    pub(crate) machine_move: i64,
}

impl CostDiff {
    pub(crate) fn new(problem: &Problem) -> Self {
        CostDiff {
            load: vec![0; problem.resource_count()],
            balance: vec![0; problem.balance_cost_count()],
            process_move: 0,
            service_move: 0,
            machine_move: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.load.iter_mut().for_each(|d| *d = 0);
        self.balance.iter_mut().for_each(|d| *d = 0);
        self.process_move = 0;
        self.service_move = 0;
        self.machine_move = 0;
    }

    /// The objective value the solution would have after applying the deltas.
    pub(crate) fn objective(&self, info: &SolutionInfo) -> u64 {
        let problem = info.problem();
        let mut obj = 0;
        for (r, resource) in problem.resources().iter().enumerate() {
            let cost = info.load_cost(r) as i64 + self.load[r];
            obj += resource.weight_load_cost * cost as u64;
        }
        for (b, balance) in problem.balance_costs().iter().enumerate() {
            let cost = info.balance_cost(b) as i64 + self.balance[b];
            obj += balance.weight * cost as u64;
        }
        obj += problem.weight_process_move_cost()
            * (info.process_move_cost() as i64 + self.process_move) as u64;
        obj += problem.weight_service_move_cost()
            * (info.service_move_cost() as i64 + self.service_move) as u64;
        obj += problem.weight_machine_move_cost()
            * (info.machine_move_cost() as i64 + self.machine_move) as u64;
        obj
    }

    /// Folds the deltas into the stored cost components.
    pub(crate) fn apply(&self, info: &mut SolutionInfo) {
        for (r, &diff) in self.load.iter().enumerate() {
            info.set_load_cost(r, (info.load_cost(r) as i64 + diff) as u64);
        }
        for (b, &diff) in self.balance.iter().enumerate() {
            info.set_balance_cost(b, (info.balance_cost(b) as i64 + diff) as u64);
        }
        info.set_process_move_cost((info.process_move_cost() as i64 + self.process_move) as u64);
        info.set_service_move_cost((info.service_move_cost() as i64 + self.service_move) as u64);
        info.set_machine_move_cost((info.machine_move_cost() as i64 + self.machine_move) as u64);
    }
}
