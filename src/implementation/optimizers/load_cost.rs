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

//! This module provides the load-cost optimizer: resource by resource (most
//! expensive first), it unloads every machine paying a load cost by moving
//! its processes onto low-load machines, committing strictly improving moves
//! until the machine stops improving.

use crate::common::*;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::verifiers::move_verifier::MoveVerifier;

/// The load-cost pre-pass.
pub struct LoadCostOptimizer;

impl LoadCostOptimizer {
    pub fn optimize(&self, x: &mut SolutionInfo) {
        let problem = x.problem_handle();
        let r_count = problem.resource_count();
        let weighted: Vec<u64> = (0..r_count)
            .map(|r| x.load_cost(r) * problem.resources()[r].weight_load_cost)
            .collect();
        let mut order: Vec<ResourceId> = (0..r_count).collect();
        order.sort_by(|&a, &b| weighted[b].cmp(&weighted[a]));
        for r in order {
            self.optimize_resource(x, r);
        }
    }

    fn machine_load_cost(x: &SolutionInfo, m: MachineId, r: ResourceId) -> u64 {
        load_cost(
            x.usage(m, r) as i64,
            x.problem().machines()[m].safety_capacity(r) as i64,
        )
    }

    fn optimize_resource(&self, x: &mut SolutionInfo, r: ResourceId) {
        let problem = x.problem_handle();
        let m_count = problem.machine_count();
        let mut overloaded: Vec<(MachineId, u64)> = vec![];
        let mut low_load: Vec<MachineId> = vec![];
        for m in 0..m_count {
            let cost = Self::machine_load_cost(x, m, r);
            if cost > 0 {
                overloaded.push((m, cost));
            } else {
                low_load.push(m);
            }
        }
        overloaded.sort_by(|a, b| b.1.cmp(&a.1));
        let mut verifier = MoveVerifier::new(x);
        for (m, _) in overloaded {
            let mut processes: Vec<ProcessId> = (0..problem.process_count())
                .filter(|&p| x.solution()[p] == m)
                .collect();
            while Self::machine_load_cost(x, m, r) > 0 {
                let current_obj = x.objective();
                let mut best_obj = current_obj;
                let mut best: Option<Move> = None;
                for &m2 in low_load.iter() {
                    for &p in processes.iter() {
                        let proposal = Move::new(p, m, m2);
                        if verifier.feasible(x, proposal) {
                            let obj = verifier.objective(x, proposal);
                            if obj < best_obj {
                                best_obj = obj;
                                best = Some(proposal);
                            }
                        }
                    }
                }
                match best {
                    Some(proposal) => {
                        verifier.commit(x, proposal);
                        processes.retain(|&q| q != proposal.p);
                    }
                    None => break,
                }
            }
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_load_cost_optimizer {
    use std::sync::Arc;

    use crate::*;

    #[test]
    fn the_pre_pass_drains_overloaded_machines() {
        let values = vec![
            1, 0, 10, //
            3, //
            0, 0, 10, 2, 0, 1, 1, //
            0, 0, 10, 2, 1, 0, 1, //
            0, 0, 10, 2, 1, 1, 0, //
            3, 1, 0, 1, 0, 1, 0, //
            3, //
            0, 2, 1, //
            1, 2, 1, //
            2, 2, 1, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let mut x = SolutionInfo::new(pb, Arc::new(vec![0, 0, 0]));
        // 6 units on a safety capacity of 2
        assert_eq!(4, x.load_cost(0));
        let start = x.objective();
        LoadCostOptimizer.optimize(&mut x);
        assert!(x.objective() < start);
        assert!(x.check());
        // spreading the processes over the three machines wipes the excess
        assert_eq!(0, x.load_cost(0));
    }
}
