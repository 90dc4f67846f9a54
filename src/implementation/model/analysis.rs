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

//! This module provides the statistics report behind the driver's
//! `--analyze` mode: instance dimensions, distribution summaries for the
//! structural quantities, and the cost composition of a given solution.

use std::io::{self, Write};

use crate::implementation::model::solution::SolutionInfo;

/// Running min / max / mean / variance over a stream of samples.
#[derive(Debug, Default, Clone, Copy)]
struct Summary {
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}
impl Summary {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        let mut acc = Summary { min: f64::INFINITY, max: f64::NEG_INFINITY, ..Self::default() };
        for v in values {
            acc.count += 1;
            acc.sum += v;
            acc.sum_sq += v * v;
            acc.min = acc.min.min(v);
            acc.max = acc.max.max(v);
        }
        acc
    }
    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
    fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            let mean = self.mean();
            (self.sum_sq / self.count as f64 - mean * mean).max(0.0)
        }
    }
}

fn write_summary(out: &mut dyn Write, label: &str, summary: Summary) -> io::Result<()> {
    writeln!(
        out,
        "{}: min = {}, max = {}, mean = {:.2}",
        label, summary.min, summary.max, summary.mean()
    )
}

fn write_summary_with_variance(
    out: &mut dyn Write,
    label: &str,
    summary: Summary,
) -> io::Result<()> {
    writeln!(
        out,
        "{}: min = {}, max = {}, mean = {:.2}, variance = {:.2}",
        label, summary.min, summary.max, summary.mean(), summary.variance()
    )
}

/// Writes the analysis report for a solution and its instance.
pub fn analyze(info: &SolutionInfo, out: &mut dyn Write) -> io::Result<()> {
    let pb = info.problem();
    writeln!(out, "Number of resources: {}", pb.resource_count())?;
    writeln!(out, "Number of transient resources: {}", pb.transient_resources().len())?;
    writeln!(out, "Number of balance costs: {}", pb.balance_cost_count())?;
    writeln!(out, "Number of processes: {}", pb.process_count())?;
    writeln!(out, "Number of services: {}", pb.service_count())?;
    writeln!(out, "Number of machines: {}", pb.machine_count())?;
    writeln!(out, "Number of neighborhoods: {}", pb.neighborhood_count())?;
    writeln!(out, "Number of locations: {}", pb.location_count())?;

    let services = 0..pb.service_count();
    write_summary(
        out,
        "Processes per service",
        Summary::of(services.clone().map(|s| pb.processes_by_service(s).len() as f64)),
    )?;
    write_summary(
        out,
        "Dependencies per service",
        Summary::of(services.clone().map(|s| pb.dependency().out_degree(s) as f64)),
    )?;
    write_summary(
        out,
        "Reverse dependencies per service",
        Summary::of(services.map(|s| pb.dependency().in_degree(s) as f64)),
    )?;
    write_summary(
        out,
        "Machines per location",
        Summary::of((0..pb.location_count()).map(|l| pb.machines_by_location(l).len() as f64)),
    )?;
    write_summary(
        out,
        "Machines per neighborhood",
        Summary::of(
            (0..pb.neighborhood_count()).map(|n| pb.machines_by_neighborhood(n).len() as f64),
        ),
    )?;
    for r in 0..pb.resource_count() {
        write_summary_with_variance(
            out,
            &format!("Resource {r} requirement per process"),
            Summary::of(pb.processes().iter().map(|p| p.requirement(r) as f64)),
        )?;
        write_summary_with_variance(
            out,
            &format!("Resource {r} capacity per machine"),
            Summary::of(pb.machines().iter().map(|m| m.capacity(r) as f64)),
        )?;
    }

    writeln!(out, "Objective lower bound: {}", pb.lower_bound_objective())?;
    let (tlc, tbc, tmc) = (
        info.total_load_cost(),
        info.total_balance_cost(),
        info.total_move_cost(),
    );
    let total = (tlc + tbc + tmc).max(1) as f64;
    writeln!(out, "Objective = {}, composition:", info.objective())?;
    writeln!(out, "  load costs:    {} ({:.1}%)", tlc, 100.0 * tlc as f64 / total)?;
    writeln!(out, "  balance costs: {} ({:.1}%)", tbc, 100.0 * tbc as f64 / total)?;
    writeln!(out, "  move costs:    {} ({:.1}%)", tmc, 100.0 * tmc as f64 / total)?;
    Ok(())
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_analysis {
    use std::sync::Arc;

    use super::Summary;
    use crate::*;

    #[test]
    fn summary_tracks_min_max_mean() {
        let s = Summary::of([1.0, 2.0, 3.0, 6.0].into_iter());
        assert_eq!(1.0, s.min);
        assert_eq!(6.0, s.max);
        assert_eq!(3.0, s.mean());
    }

    #[test]
    fn summary_variance_of_constant_stream_is_zero() {
        let s = Summary::of([4.0, 4.0, 4.0].into_iter());
        assert_eq!(0.0, s.variance());
    }

    #[test]
    fn report_mentions_the_objective() {
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 10, 10, 0, 1, //
            0, 0, 10, 10, 1, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 3, 5, //
            1, 3, 5, //
            0, //
            1, 1, 1,
        ];
        let pb = Arc::new(Problem::parse(&values).unwrap());
        let initial = Arc::new(vec![0, 1]);
        let info = SolutionInfo::new(pb, initial);
        let mut buffer = vec![];
        analyze(&info, &mut buffer).unwrap();
        let report = String::from_utf8(buffer).unwrap();
        assert!(report.contains("Number of processes: 2"));
        assert!(report.contains("Objective = 0"));
    }
}
