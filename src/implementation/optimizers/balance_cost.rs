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

//! This module provides the balance-cost optimizer. For each balance term
//! (most expensive first) the machines split into a positive-cost set (too
//! much of the second resource relative to the first) and a negative-cost
//! set (slack to spare); exchanging processes with opposite requirement
//! profiles between the two sets reduces the term, and strictly improving
//! feasible exchanges are committed.

use crate::common::*;
use crate::implementation::model::solution::SolutionInfo;
use crate::implementation::verifiers::exchange_verifier::ExchangeVerifier;

/// The balance-cost pre-pass.
pub struct BalanceCostOptimizer;

impl BalanceCostOptimizer {
    pub fn optimize(&self, x: &mut SolutionInfo) {
        let problem = x.problem_handle();
        let b_count = problem.balance_cost_count();
        let weighted: Vec<u64> = (0..b_count)
            .map(|b| x.balance_cost(b) * problem.balance_costs()[b].weight)
            .collect();
        let mut order: Vec<BalanceId> = (0..b_count).collect();
        order.sort_by(|&a, &b| weighted[b].cmp(&weighted[a]));
        for b in order {
            self.optimize_balance(x, b);
        }
    }

    /// The machine's contribution to the balance term, without clamping: a
    /// positive value is paid, a negative one is headroom.
    fn signed_balance_cost(x: &SolutionInfo, b: BalanceId, m: MachineId) -> i64 {
        let problem = x.problem();
        let balance = &problem.balance_costs()[b];
        let machine = &problem.machines()[m];
        let a1 = machine.capacity(balance.resource1) as i64
            - x.usage(m, balance.resource1) as i64;
        let a2 = machine.capacity(balance.resource2) as i64
            - x.usage(m, balance.resource2) as i64;
        balance.target as i64 * a1 - a2
    }

    fn processes_on(x: &SolutionInfo, m: MachineId) -> Vec<ProcessId> {
        (0..x.problem().process_count())
            .filter(|&p| x.solution()[p] == m)
            .collect()
    }

    fn optimize_balance(&self, x: &mut SolutionInfo, b: BalanceId) {
        let problem = x.problem_handle();
        let balance = &problem.balance_costs()[b];
        let (r1, r2) = (balance.resource1, balance.resource2);
        let target = balance.target as i64;
        let mut positive: Vec<(MachineId, i64)> = vec![];
        let mut negative: Vec<(MachineId, i64)> = vec![];
        for m in 0..problem.machine_count() {
            let cost = Self::signed_balance_cost(x, b, m);
            if cost > 0 {
                positive.push((m, cost));
            } else if cost < 0 {
                negative.push((m, cost));
            }
        }
        positive.sort_by(|a, b| b.1.cmp(&a.1));
        negative.sort_by(|a, b| a.1.cmp(&b.1));
        let mut verifier = ExchangeVerifier::new(x);
        for &(m1, _) in positive.iter() {
            let mut p_of_m1 = Self::processes_on(x, m1);
            while Self::signed_balance_cost(x, b, m1) > 0 {
                let current_obj = x.objective();
                let mut best_obj = current_obj;
                let mut best: Option<Exchange> = None;
                for &(m2, _) in negative.iter() {
                    let p_of_m2 = Self::processes_on(x, m2);
                    for &p1 in p_of_m1.iter() {
                        let process1 = &problem.processes()[p1];
                        let req11 = process1.requirement(r1) as i64;
                        let req12 = process1.requirement(r2) as i64;
                        for &p2 in p_of_m2.iter() {
                            let process2 = &problem.processes()[p2];
                            let delta1 = req11 - process2.requirement(r1) as i64;
                            let delta2 = req12 - process2.requirement(r2) as i64;
                            // only profiles that actually reduce the term on
                            // the paying machine are worth evaluating
                            if target * delta1 - delta2 < 0 {
                                let proposal = Exchange::new(m1, p1, m2, p2);
                                if verifier.feasible(x, proposal) {
                                    let obj = verifier.objective(x, proposal);
                                    if obj < best_obj {
                                        best_obj = obj;
                                        best = Some(proposal);
                                    }
                                }
                            }
                        }
                    }
                }
                match best {
                    Some(proposal) => {
                        verifier.commit(x, proposal);
                        p_of_m1.retain(|&q| q != proposal.p1);
                        p_of_m1.push(proposal.p2);
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
mod test_balance_cost_optimizer {
    use std::sync::Arc;

    use crate::*;

    #[test]
    fn exchanging_opposite_profiles_reduces_the_balance_cost() {
        // two resources, one balance term (r1 -> r2, target 1, weight 100):
        // machine 0 hosts the r2-hungry process and pays the term, machine 1
        // has headroom; swapping the processes settles both machines.
        let values = vec![
            2, 0, 1, 0, 1, //
            2, //
            0, 0, 10, 10, 10, 10, 0, 1, //
            0, 0, 10, 10, 10, 10, 1, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 2, 8, 1, //
            1, 8, 2, 1, //
            1, 0, 1, 1, 100, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let mut x = SolutionInfo::new(pb, Arc::new(vec![0, 1]));
        let start_balance = x.balance_cost(0);
        assert!(start_balance > 0);
        let start = x.objective();
        BalanceCostOptimizer.optimize(&mut x);
        assert!(x.objective() < start);
        assert!(x.balance_cost(0) < start_balance);
        assert!(x.check());
    }
}
