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

//! This module defines the most basic data types that are used throughout all
//! the code of our library (both at the abstraction and implementation levels).
//! These are also the types your client code is likely to work with.

// ----------------------------------------------------------------------------
// --- IDENTIFIERS ------------------------------------------------------------
// ----------------------------------------------------------------------------
/// Identifies a process of the instance (dense, `0..process_count`).
pub type ProcessId = usize;
/// Identifies a machine of the instance (dense, `0..machine_count`).
pub type MachineId = usize;
/// Identifies a resource of the instance (dense, `0..resource_count`).
pub type ResourceId = usize;
/// Identifies a service of the instance (dense, `0..service_count`).
pub type ServiceId = usize;
/// Identifies a location (a group of machines sharing a physical site).
pub type LocationId = usize;
/// Identifies a neighborhood (a group of machines used by the dependency
/// constraints -- this has nothing to do with a local-search neighborhood).
pub type NeighborhoodId = usize;
/// Identifies one of the balance-cost terms of the objective function.
pub type BalanceId = usize;

/// An assignment maps every process onto the machine that hosts it. It is
/// nothing but a vector of machine identifiers indexed by process identifier.
pub type Assignment = Vec<MachineId>;

// ----------------------------------------------------------------------------
// --- MOVE -------------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The reassignment of one single process `p` from machine `src` to machine
/// `dst`. A move is only meaningful when `src` is the machine currently
/// hosting `p`; it is trivially reversible.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Move {
    pub p: ProcessId,
    pub src: MachineId,
    pub dst: MachineId,
}
impl Move {
    pub fn new(p: ProcessId, src: MachineId, dst: MachineId) -> Self {
        Move { p, src, dst }
    }
    /// This method returns the move undoing this one.
    ///
    /// # Examples:
    /// ```
    /// # use remach::Move;
    /// assert_eq!(Move::new(3, 1, 0), Move::new(3, 0, 1).reverse());
    /// ```
    pub fn reverse(self) -> Move {
        Move { p: self.p, src: self.dst, dst: self.src }
    }
}

// ----------------------------------------------------------------------------
// --- EXCHANGE ---------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The movement of process `p1` from machine `m1` to machine `m2` together
/// with the movement of process `p2` from machine `m2` to machine `m1`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Exchange {
    pub m1: MachineId,
    pub p1: ProcessId,
    pub m2: MachineId,
    pub p2: ProcessId,
}
impl Exchange {
    pub fn new(m1: MachineId, p1: ProcessId, m2: MachineId, p2: ProcessId) -> Self {
        Exchange { m1, p1, m2, p2 }
    }
    /// This method returns the exchange undoing this one: after the original
    /// exchange, `p2` sits on `m1` and `p1` sits on `m2`.
    pub fn reverse(self) -> Exchange {
        Exchange { m1: self.m1, p1: self.p2, m2: self.m2, p2: self.p1 }
    }
}

// ----------------------------------------------------------------------------
// --- DISTANCE ---------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The Hamming distance between two assignments: the number of processes
/// placed on different machines. This is the diversity measure used by the
/// solution pool and by path relinking.
pub fn assignment_delta(a: &[MachineId], b: &[MachineId]) -> usize {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count()
}

// ----------------------------------------------------------------------------
// --- COST KERNELS -----------------------------------------------------------
// ----------------------------------------------------------------------------
/// The load cost of one machine for one resource: the excess of the usage
/// over the safety capacity, clamped at zero. The arguments are signed so
/// that hypothetical usages (the current usage plus or minus a requirement)
/// can be evaluated without underflow.
pub fn load_cost(usage: i64, safety_capacity: i64) -> u64 {
    (usage - safety_capacity).max(0) as u64
}

/// The contribution of one machine to one balance-cost term:
/// `max(0, target * (cap1 - usage1) - (cap2 - usage2))`.
pub fn balance_cost(target: i64, cap1: i64, usage1: i64, cap2: i64, usage2: i64) -> u64 {
    (target * (cap1 - usage1) - (cap2 - usage2)).max(0) as u64
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_common {
    use crate::*;

    #[test]
    fn move_reverse_swaps_source_and_destination() {
        let mv = Move::new(7, 2, 5);
        assert_eq!(Move::new(7, 5, 2), mv.reverse());
        assert_eq!(mv, mv.reverse().reverse());
    }

    #[test]
    fn exchange_reverse_swaps_the_processes_not_the_machines() {
        let ex = Exchange::new(0, 10, 1, 20);
        assert_eq!(Exchange::new(0, 20, 1, 10), ex.reverse());
        assert_eq!(ex, ex.reverse().reverse());
    }

    #[test]
    fn delta_counts_differing_positions() {
        assert_eq!(0, assignment_delta(&[0, 1, 2], &[0, 1, 2]));
        assert_eq!(2, assignment_delta(&[0, 1, 2], &[1, 1, 0]));
        assert_eq!(3, assignment_delta(&[0, 0, 0], &[1, 1, 1]));
    }

    #[test]
    fn load_cost_is_the_positive_part_of_the_excess() {
        assert_eq!(0, load_cost(5, 10));
        assert_eq!(0, load_cost(10, 10));
        assert_eq!(3, load_cost(13, 10));
    }

    #[test]
    fn balance_cost_is_the_positive_part_of_the_slack_gap() {
        // target * (cap1 - u1) - (cap2 - u2) = 2 * (10 - 4) - (8 - 2) = 6
        assert_eq!(6, balance_cost(2, 10, 4, 8, 2));
        // a machine with no slack on the first resource incurs no cost
        assert_eq!(0, balance_cost(1, 10, 10, 8, 0));
    }
}
