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

//! This module maps heuristic names to instances. An unknown name is an
//! initialization failure, reported before any thread is spawned.

use crate::abstraction::{Heuristic, HeuristicError, HeuristicSetup};
use crate::implementation::heuristics::best_improvement::BestImprovementLocalSearch;
use crate::implementation::heuristics::path_relinking::PathRelinking;
use crate::implementation::heuristics::simulated_annealing::SimulatedAnnealing;
use crate::implementation::heuristics::vns::Vns;

/// Builds the heuristic registered under `name`.
pub fn heuristic_by_name(
    name: &str,
    setup: HeuristicSetup,
) -> Result<Box<dyn Heuristic>, HeuristicError> {
    match name {
        "vns" | "vns3" => Ok(Box::new(Vns::new(setup))),
        "simulated_annealing" => Ok(Box::new(SimulatedAnnealing::new(setup))),
        "path_relinking" => Ok(Box::new(PathRelinking::new(setup))),
        "best_improvement_local_search" => Ok(Box::new(BestImprovementLocalSearch::new(setup))),
        _ => Err(HeuristicError::UnknownName(name.to_string())),
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_factory {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use super::heuristic_by_name;
    use crate::*;

    fn setup() -> HeuristicSetup {
        let values = vec![
            1, 0, 1, //
            2, //
            0, 0, 10, 10, 0, 1, //
            0, 0, 10, 10, 1, 0, //
            2, 1, 0, 1, 0, //
            2, //
            0, 3, 1, //
            1, 3, 1, //
            0, //
            1, 1, 1,
        ];
        HeuristicSetup {
            problem: Arc::new(Problem::parse(&values).unwrap()),
            initial: Arc::new(vec![0, 1]),
            seed: 0,
            flag: Arc::new(AtomicBool::new(false)),
            pool: Arc::new(SolutionPool::new(PoolConfig::default())),
            params: ParameterMap::default(),
        }
    }

    #[test]
    fn every_registered_name_resolves() {
        for name in [
            "vns",
            "vns3",
            "simulated_annealing",
            "path_relinking",
            "best_improvement_local_search",
        ] {
            assert!(heuristic_by_name(name, setup()).is_ok(), "{name}");
        }
    }

    #[test]
    fn an_unknown_name_is_an_error() {
        assert!(matches!(
            heuristic_by_name("tabu_search", setup()),
            Err(HeuristicError::UnknownName(_))
        ));
    }
}
