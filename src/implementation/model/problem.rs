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

//! This module provides the immutable description of a machine-reassignment
//! instance: resources, machines, services, processes, balance-cost terms and
//! the global weights of the objective function. The instance is parsed once
//! from a flat stream of unsigned integers and never mutated afterwards; the
//! whole search shares it behind an `Arc`.

use crate::common::*;

/// A computation resource. Each machine offers a capacity of every resource
/// and each process consumes some of it.
#[derive(Debug, Clone)]
pub struct Resource {
    /// A transient resource stays allocated on the initial machine of a
    /// process for the whole duration of the reassignment (think disk images
    /// that must exist on both ends while a migration is in flight).
    pub transient: bool,
    /// The weight of this resource in the load-cost part of the objective.
    pub weight_load_cost: u64,
}

/// A machine hosting processes.
#[derive(Debug, Clone)]
pub struct Machine {
    pub neighborhood: NeighborhoodId,
    pub location: LocationId,
    capacity: Vec<u32>,
    safety_capacity: Vec<u32>,
}
impl Machine {
    /// The raw capacity of this machine for resource `r`.
    pub fn capacity(&self, r: ResourceId) -> u32 {
        self.capacity[r]
    }
    /// The safety capacity of this machine for resource `r`. Usage beyond the
    /// safety capacity is feasible but incurs a load cost.
    pub fn safety_capacity(&self, r: ResourceId) -> u32 {
        self.safety_capacity[r]
    }
}

/// A service grouping processes. All constraints involving several processes
/// (conflict, spread, dependency) are stated at the service level.
#[derive(Debug, Clone)]
pub struct Service {
    /// The minimum number of distinct locations that must host at least one
    /// process of this service.
    pub spread_min: u32,
}

/// A process to be placed on a machine.
#[derive(Debug, Clone)]
pub struct Process {
    pub service: ServiceId,
    requirement: Vec<u32>,
    pub movement_cost: u64,
}
impl Process {
    /// How much of resource `r` this process consumes on its hosting machine.
    pub fn requirement(&self, r: ResourceId) -> u32 {
        self.requirement[r]
    }
}

/// One balance-cost term `(r1, r2, target, weight)`. Every machine contributes
/// `max(0, target * slack(r1) - slack(r2))` to it, where `slack(r)` is the
/// unused raw capacity of `r`.
#[derive(Debug, Clone)]
pub struct BalanceCost {
    pub resource1: ResourceId,
    pub resource2: ResourceId,
    pub target: u64,
    pub weight: u64,
}

// ----------------------------------------------------------------------------
// --- DEPENDENCY GRAPH -------------------------------------------------------
// ----------------------------------------------------------------------------

/// The directed dependency graph over services, stored as forward and reverse
/// CSR adjacency arrays. An edge `s -> s2` means that every neighborhood
/// hosting a process of `s` must also host a process of `s2`. The graph may
/// contain cycles; nothing here cares.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    out_offsets: Vec<usize>,
    out_targets: Vec<ServiceId>,
    in_offsets: Vec<usize>,
    in_sources: Vec<ServiceId>,
}
impl DependencyGraph {
    /// Builds the graph from the per-service adjacency lists (in the order
    /// they appear in the instance file, which `outgoing` preserves).
    pub fn new(service_count: usize, adjacency: &[Vec<ServiceId>]) -> Self {
        let mut out_offsets = Vec::with_capacity(service_count + 1);
        let mut out_targets = vec![];
        out_offsets.push(0);
        for deps in adjacency.iter() {
            out_targets.extend_from_slice(deps);
            out_offsets.push(out_targets.len());
        }
        // reverse adjacency by counting sort on the target
        let mut in_degree = vec![0usize; service_count];
        for &t in out_targets.iter() {
            in_degree[t] += 1;
        }
        let mut in_offsets = Vec::with_capacity(service_count + 1);
        in_offsets.push(0);
        for s in 0..service_count {
            in_offsets.push(in_offsets[s] + in_degree[s]);
        }
        let mut next = in_offsets[..service_count].to_vec();
        let mut in_sources = vec![0; out_targets.len()];
        for (s, deps) in adjacency.iter().enumerate() {
            for &t in deps.iter() {
                in_sources[next[t]] = s;
                next[t] += 1;
            }
        }
        DependencyGraph { out_offsets, out_targets, in_offsets, in_sources }
    }
    /// The services which `s` depends on.
    pub fn outgoing(&self, s: ServiceId) -> &[ServiceId] {
        &self.out_targets[self.out_offsets[s]..self.out_offsets[s + 1]]
    }
    /// The services depending on `s`.
    pub fn incoming(&self, s: ServiceId) -> &[ServiceId] {
        &self.in_sources[self.in_offsets[s]..self.in_offsets[s + 1]]
    }
    pub fn out_degree(&self, s: ServiceId) -> usize {
        self.outgoing(s).len()
    }
    pub fn in_degree(&self, s: ServiceId) -> usize {
        self.incoming(s).len()
    }
}

// ----------------------------------------------------------------------------
// --- MACHINE MOVE COSTS -----------------------------------------------------
// ----------------------------------------------------------------------------

/// The dense `|M| x |M|` machine-move-cost table. When every entry of the
/// instance fits in a byte (which holds for all the large instances we care
/// about), the table is stored in 8-bit cells to quarter its footprint. The
/// branch is taken once, at parse time.
#[derive(Debug, Clone)]
enum MoveCostTable {
    Narrow(Vec<u8>),
    Wide(Vec<u32>),
}

// ----------------------------------------------------------------------------
// --- PARSE ERRORS -----------------------------------------------------------
// ----------------------------------------------------------------------------

/// The ways an instance or solution description can be rejected.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of input")]
    Truncated,
    #[error("trailing data after the expected end of input")]
    TrailingData,
    #[error("{kind} index {index} out of range (count is {count})")]
    IndexOutOfRange { kind: &'static str, index: u64, count: usize },
    #[error("value {0} does not fit in 32 bits")]
    ValueRange(u64),
}

struct Cursor<'a> {
    values: &'a [u64],
    pos: usize,
}
impl<'a> Cursor<'a> {
    fn new(values: &'a [u64]) -> Self {
        Cursor { values, pos: 0 }
    }
    fn next(&mut self) -> Result<u64, ParseError> {
        let v = *self.values.get(self.pos).ok_or(ParseError::Truncated)?;
        self.pos += 1;
        Ok(v)
    }
    fn next_u32(&mut self) -> Result<u32, ParseError> {
        let v = self.next()?;
        u32::try_from(v).map_err(|_| ParseError::ValueRange(v))
    }
    fn next_count(&mut self) -> Result<usize, ParseError> {
        Ok(self.next_u32()? as usize)
    }
    fn next_index(&mut self, kind: &'static str, count: usize) -> Result<usize, ParseError> {
        let v = self.next()?;
        let i = v as usize;
        if i >= count {
            Err(ParseError::IndexOutOfRange { kind, index: v, count })
        } else {
            Ok(i)
        }
    }
    fn exhausted(&self) -> bool {
        self.pos == self.values.len()
    }
}

// ----------------------------------------------------------------------------
// --- PROBLEM ----------------------------------------------------------------
// ----------------------------------------------------------------------------

/// An immutable machine-reassignment instance, together with the index tables
/// the search engine needs (processes by service, machines by location and by
/// neighborhood, transient / non-transient resource lists, per-service
/// structural flags) and the objective lower bound.
#[derive(Debug, Clone)]
pub struct Problem {
    location_count: usize,
    neighborhood_count: usize,
    resources: Vec<Resource>,
    machines: Vec<Machine>,
    services: Vec<Service>,
    processes: Vec<Process>,
    balance_costs: Vec<BalanceCost>,
    weight_process_move_cost: u64,
    weight_service_move_cost: u64,
    weight_machine_move_cost: u64,
    //
    service_single_process: Vec<bool>,
    service_no_in_dep: Vec<bool>,
    service_no_out_dep: Vec<bool>,
    processes_by_service: Vec<Vec<ProcessId>>,
    machines_by_location: Vec<Vec<MachineId>>,
    machines_by_neighborhood: Vec<Vec<MachineId>>,
    non_transient_resources: Vec<ResourceId>,
    transient_resources: Vec<ResourceId>,
    dependency: DependencyGraph,
    //
    lb_load_cost: Vec<u64>,
    lb_balance_cost: Vec<u64>,
    machine_move_cost: MoveCostTable,
}

impl Problem {
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }
    pub fn service_count(&self) -> usize {
        self.services.len()
    }
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }
    pub fn balance_cost_count(&self) -> usize {
        self.balance_costs.len()
    }
    pub fn location_count(&self) -> usize {
        self.location_count
    }
    pub fn neighborhood_count(&self) -> usize {
        self.neighborhood_count
    }
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }
    pub fn services(&self) -> &[Service] {
        &self.services
    }
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }
    pub fn balance_costs(&self) -> &[BalanceCost] {
        &self.balance_costs
    }
    pub fn weight_process_move_cost(&self) -> u64 {
        self.weight_process_move_cost
    }
    pub fn weight_service_move_cost(&self) -> u64 {
        self.weight_service_move_cost
    }
    pub fn weight_machine_move_cost(&self) -> u64 {
        self.weight_machine_move_cost
    }
    /// Returns true iff the service has a single process (in which case the
    /// conflict and spread constraints cannot be violated by moving it).
    pub fn service_has_single_process(&self, s: ServiceId) -> bool {
        self.service_single_process[s]
    }
    /// Returns true iff no other service depends on `s`.
    pub fn service_has_no_in_dependency(&self, s: ServiceId) -> bool {
        self.service_no_in_dep[s]
    }
    /// Returns true iff `s` depends on no other service.
    pub fn service_has_no_out_dependency(&self, s: ServiceId) -> bool {
        self.service_no_out_dep[s]
    }
    pub fn processes_by_service(&self, s: ServiceId) -> &[ProcessId] {
        &self.processes_by_service[s]
    }
    pub fn machines_by_location(&self, l: LocationId) -> &[MachineId] {
        &self.machines_by_location[l]
    }
    pub fn machines_by_neighborhood(&self, n: NeighborhoodId) -> &[MachineId] {
        &self.machines_by_neighborhood[n]
    }
    pub fn non_transient_resources(&self) -> &[ResourceId] {
        &self.non_transient_resources
    }
    pub fn transient_resources(&self) -> &[ResourceId] {
        &self.transient_resources
    }
    pub fn dependency(&self) -> &DependencyGraph {
        &self.dependency
    }
    /// The cost of hosting on `m2` a process whose initial machine is `m1`.
    pub fn machine_move_cost(&self, m1: MachineId, m2: MachineId) -> u64 {
        let index = m1 * self.machines.len() + m2;
        match &self.machine_move_cost {
            MoveCostTable::Narrow(t) => t[index] as u64,
            MoveCostTable::Wide(t) => t[index] as u64,
        }
    }
    pub fn lower_bound_load_cost(&self, r: ResourceId) -> u64 {
        self.lb_load_cost[r]
    }
    pub fn lower_bound_balance_cost(&self, b: BalanceId) -> u64 {
        self.lb_balance_cost[b]
    }
    /// A lower bound on the objective of any assignment: move costs can reach
    /// zero, but the aggregate excess of requirements over capacities cannot.
    pub fn lower_bound_objective(&self) -> u64 {
        let mut lb = 0;
        for (r, resource) in self.resources.iter().enumerate() {
            lb += self.lb_load_cost[r] * resource.weight_load_cost;
        }
        for (b, balance) in self.balance_costs.iter().enumerate() {
            lb += self.lb_balance_cost[b] * balance.weight;
        }
        lb
    }

    /// Reads an instance from the flat vector of unsigned integers making up
    /// an instance file. The layout is, in order: the resources, the machines
    /// (with capacities, safety capacities and the move-cost row), the
    /// services (with their dependency lists), the processes, the
    /// balance-cost terms and finally the three global weights. Anything left
    /// over after the weights is an error.
    pub fn parse(values: &[u64]) -> Result<Problem, ParseError> {
        let mut cur = Cursor::new(values);
        // resources
        let r_count = cur.next_count()?;
        let mut resources = Vec::with_capacity(r_count);
        let mut transient_resources = vec![];
        let mut non_transient_resources = vec![];
        for r in 0..r_count {
            let transient = cur.next()? > 0;
            let weight_load_cost = cur.next()?;
            if transient {
                transient_resources.push(r);
            } else {
                non_transient_resources.push(r);
            }
            resources.push(Resource { transient, weight_load_cost });
        }
        // machines
        let m_count = cur.next_count()?;
        let mut machines = Vec::with_capacity(m_count);
        let mut move_costs = vec![0u32; m_count * m_count];
        let mut max_move_cost = 0u32;
        let mut location_count = 0;
        let mut neighborhood_count = 0;
        for m in 0..m_count {
            let neighborhood = cur.next_count()?;
            let location = cur.next_count()?;
            let mut capacity = Vec::with_capacity(r_count);
            for _ in 0..r_count {
                capacity.push(cur.next_u32()?);
            }
            let mut safety_capacity = Vec::with_capacity(r_count);
            for _ in 0..r_count {
                safety_capacity.push(cur.next_u32()?);
            }
            for m2 in 0..m_count {
                let cost = cur.next_u32()?;
                max_move_cost = max_move_cost.max(cost);
                move_costs[m * m_count + m2] = cost;
            }
            location_count = location_count.max(location + 1);
            neighborhood_count = neighborhood_count.max(neighborhood + 1);
            machines.push(Machine { neighborhood, location, capacity, safety_capacity });
        }
        let machine_move_cost = if max_move_cost <= u8::MAX as u32 {
            MoveCostTable::Narrow(move_costs.iter().map(|&c| c as u8).collect())
        } else {
            MoveCostTable::Wide(move_costs)
        };
        let mut machines_by_location = vec![vec![]; location_count];
        let mut machines_by_neighborhood = vec![vec![]; neighborhood_count];
        for (m, machine) in machines.iter().enumerate() {
            machines_by_location[machine.location].push(m);
            machines_by_neighborhood[machine.neighborhood].push(m);
        }
        // services and their dependency lists
        let s_count = cur.next_count()?;
        let mut services = Vec::with_capacity(s_count);
        let mut adjacency = vec![vec![]; s_count];
        for s in 0..s_count {
            let spread_min = cur.next_u32()?;
            let dep_count = cur.next_count()?;
            for _ in 0..dep_count {
                adjacency[s].push(cur.next_index("service", s_count)?);
            }
            services.push(Service { spread_min });
        }
        let dependency = DependencyGraph::new(s_count, &adjacency);
        let service_no_in_dep = (0..s_count).map(|s| dependency.in_degree(s) == 0).collect();
        let service_no_out_dep = (0..s_count).map(|s| dependency.out_degree(s) == 0).collect();
        // processes
        let p_count = cur.next_count()?;
        let mut processes = Vec::with_capacity(p_count);
        let mut processes_by_service = vec![vec![]; s_count];
        for p in 0..p_count {
            let service = cur.next_index("service", s_count)?;
            let mut requirement = Vec::with_capacity(r_count);
            for _ in 0..r_count {
                requirement.push(cur.next_u32()?);
            }
            let movement_cost = cur.next()?;
            processes_by_service[service].push(p);
            processes.push(Process { service, requirement, movement_cost });
        }
        let service_single_process =
            processes_by_service.iter().map(|ps| ps.len() == 1).collect();
        // balance-cost terms
        let b_count = cur.next_count()?;
        let mut balance_costs = Vec::with_capacity(b_count);
        for _ in 0..b_count {
            let resource1 = cur.next_index("resource", r_count)?;
            let resource2 = cur.next_index("resource", r_count)?;
            let target = cur.next()?;
            let weight = cur.next()?;
            balance_costs.push(BalanceCost { resource1, resource2, target, weight });
        }
        // global weights
        let weight_process_move_cost = cur.next()?;
        let weight_service_move_cost = cur.next()?;
        let weight_machine_move_cost = cur.next()?;
        if !cur.exhausted() {
            return Err(ParseError::TrailingData);
        }
        // objective lower bounds
        let mut lb_load_cost = Vec::with_capacity(r_count);
        for r in 0..r_count {
            let total_safety: i64 =
                machines.iter().map(|m| m.safety_capacity(r) as i64).sum();
            let total_req: i64 = processes.iter().map(|p| p.requirement(r) as i64).sum();
            lb_load_cost.push((total_req - total_safety).max(0) as u64);
        }
        let mut lb_balance_cost = Vec::with_capacity(b_count);
        for balance in balance_costs.iter() {
            let (r1, r2) = (balance.resource1, balance.resource2);
            let total_cap1: i64 = machines.iter().map(|m| m.capacity(r1) as i64).sum();
            let total_cap2: i64 = machines.iter().map(|m| m.capacity(r2) as i64).sum();
            let total_req1: i64 = processes.iter().map(|p| p.requirement(r1) as i64).sum();
            let total_req2: i64 = processes.iter().map(|p| p.requirement(r2) as i64).sum();
            let lb = balance.target as i64 * (total_cap1 - total_req1) - (total_cap2 - total_req2);
            lb_balance_cost.push(lb.max(0) as u64);
        }
        Ok(Problem {
            location_count,
            neighborhood_count,
            resources,
            machines,
            services,
            processes,
            balance_costs,
            weight_process_move_cost,
            weight_service_move_cost,
            weight_machine_move_cost,
            service_single_process,
            service_no_in_dep,
            service_no_out_dep,
            processes_by_service,
            machines_by_location,
            machines_by_neighborhood,
            non_transient_resources,
            transient_resources,
            dependency,
            lb_load_cost,
            lb_balance_cost,
            machine_move_cost,
        })
    }

    /// Re-emits the instance as the flat integer stream `parse` consumes.
    /// Parsing then writing is the identity on the stream.
    pub fn write_values(&self) -> Vec<u64> {
        let mut out = vec![];
        out.push(self.resources.len() as u64);
        for r in self.resources.iter() {
            out.push(r.transient as u64);
            out.push(r.weight_load_cost);
        }
        out.push(self.machines.len() as u64);
        for (m, machine) in self.machines.iter().enumerate() {
            out.push(machine.neighborhood as u64);
            out.push(machine.location as u64);
            for r in 0..self.resources.len() {
                out.push(machine.capacity(r) as u64);
            }
            for r in 0..self.resources.len() {
                out.push(machine.safety_capacity(r) as u64);
            }
            for m2 in 0..self.machines.len() {
                out.push(self.machine_move_cost(m, m2));
            }
        }
        out.push(self.services.len() as u64);
        for (s, service) in self.services.iter().enumerate() {
            out.push(service.spread_min as u64);
            let deps = self.dependency.outgoing(s);
            out.push(deps.len() as u64);
            for &d in deps {
                out.push(d as u64);
            }
        }
        out.push(self.processes.len() as u64);
        for process in self.processes.iter() {
            out.push(process.service as u64);
            for r in 0..self.resources.len() {
                out.push(process.requirement(r) as u64);
            }
            out.push(process.movement_cost);
        }
        out.push(self.balance_costs.len() as u64);
        for balance in self.balance_costs.iter() {
            out.push(balance.resource1 as u64);
            out.push(balance.resource2 as u64);
            out.push(balance.target);
            out.push(balance.weight);
        }
        out.push(self.weight_process_move_cost);
        out.push(self.weight_service_move_cost);
        out.push(self.weight_machine_move_cost);
        out
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_problem {
    use crate::*;

    // 1 resource (non transient, weight 1); 2 machines in one location and
    // one neighborhood, capacity 10, safety 10, unit move costs; 1 service
    // (spread 1, no deps) with 2 processes of requirement 3 and movement
    // cost 5; no balance terms; weights (1, 1, 1).
    pub fn tiny_values() -> Vec<u64> {
        vec![
            1, 0, 1, // resources
            2, // machines
            0, 0, 10, 10, 0, 1, //
            0, 0, 10, 10, 1, 0, //
            1, 1, 0, // services
            2, // processes
            0, 3, 5, //
            0, 3, 5, //
            0, // balance costs
            1, 1, 1, // weights
        ]
    }

    #[test]
    fn parse_reads_every_section() {
        let pb = Problem::parse(&tiny_values()).unwrap();
        assert_eq!(1, pb.resource_count());
        assert_eq!(2, pb.machine_count());
        assert_eq!(1, pb.service_count());
        assert_eq!(2, pb.process_count());
        assert_eq!(0, pb.balance_cost_count());
        assert_eq!(1, pb.location_count());
        assert_eq!(1, pb.neighborhood_count());
        assert_eq!(&[0, 1], pb.processes_by_service(0));
        assert_eq!(&[0, 1], pb.machines_by_location(0));
        assert!(!pb.service_has_single_process(0));
        assert!(pb.service_has_no_in_dependency(0));
        assert!(pb.service_has_no_out_dependency(0));
        assert_eq!(1, pb.machine_move_cost(0, 1));
        assert_eq!(0, pb.machine_move_cost(1, 1));
    }

    #[test]
    fn parse_then_write_is_the_identity() {
        let values = tiny_values();
        let pb = Problem::parse(&values).unwrap();
        assert_eq!(values, pb.write_values());
    }

    #[test]
    fn truncated_input_is_rejected() {
        let mut values = tiny_values();
        values.pop();
        assert!(matches!(Problem::parse(&values), Err(ParseError::Truncated)));
    }

    #[test]
    fn trailing_input_is_rejected() {
        let mut values = tiny_values();
        values.push(42);
        assert!(matches!(Problem::parse(&values), Err(ParseError::TrailingData)));
    }

    #[test]
    fn out_of_range_service_index_is_rejected() {
        let mut values = tiny_values();
        values[20] = 7; // the service id of the first process
        assert!(matches!(
            Problem::parse(&values),
            Err(ParseError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn wide_move_costs_survive_the_round_trip() {
        let mut values = tiny_values();
        values[9] = 1000; // move cost from machine 0 to machine 1
        let pb = Problem::parse(&values).unwrap();
        assert_eq!(1000, pb.machine_move_cost(0, 1));
        assert_eq!(values, pb.write_values());
    }

    #[test]
    fn dependency_graph_exposes_both_directions() {
        let g = DependencyGraph::new(3, &[vec![1, 2], vec![2], vec![]]);
        assert_eq!(&[1, 2], g.outgoing(0));
        assert_eq!(&[2], g.outgoing(1));
        assert!(g.outgoing(2).is_empty());
        assert!(g.incoming(0).is_empty());
        assert_eq!(&[0], g.incoming(1));
        assert_eq!(&[0, 1], g.incoming(2));
    }

    #[test]
    fn load_cost_lower_bound_is_total_requirement_minus_total_safety() {
        let mut values = tiny_values();
        // shrink both safety capacities to 2: lb = (3 + 3) - (2 + 2) = 2
        values[7] = 2;
        values[13] = 2;
        let pb = Problem::parse(&values).unwrap();
        assert_eq!(2, pb.lower_bound_load_cost(0));
        assert_eq!(2, pb.lower_bound_objective());
    }
}
