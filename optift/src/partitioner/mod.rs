use crate::{cost_model::CostModel, error::Error};
use std::collections::BTreeSet;

mod heuristic;

pub use heuristic::solve_heuristic;

/// One page's demand on the current font: a weight and a non-empty set of item ids.
#[derive(Clone, Debug)]
pub struct Request {
    weight: f64,
    items: Vec<usize>,
}
impl Request {
    pub fn new(weight: f64, items: impl IntoIterator<Item = usize>) -> Request {
        let mut items: Vec<usize> = items.into_iter().collect();
        items.sort_unstable();
        items.dedup();
        Request { weight, items }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// The item ids, sorted and deduplicated.
    pub fn items(&self) -> &[usize] {
        &self.items
    }
}

/// An ordered list of item sets. Valid solutions are pairwise disjoint and cover
/// `[0, n_items)` exactly; empty partitions are allowed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PartitionSoln {
    pub partitions: Vec<BTreeSet<usize>>,
}

/// The abstract partitioning problem for one font: weighted demand over opaque item ids plus a
/// cost model. Immutable after construction.
pub struct PartitionInstance {
    n_partitions: usize,
    n_items: usize,
    requests: Vec<Request>,
    cost_model: CostModel,
}
impl PartitionInstance {
    /// Builds an instance. Empty requests are dropped and the remaining weights normalized to
    /// sum to 1; a zero or non-finite total is degenerate demand.
    pub fn new(
        n_partitions: usize,
        n_items: usize,
        requests: Vec<Request>,
        cost_model: CostModel,
    ) -> Result<PartitionInstance, Error> {
        assert!(n_partitions >= 1, "instance needs at least one partition");
        let mut requests: Vec<Request> =
            requests.into_iter().filter(|x| !x.items.is_empty()).collect();
        for request in &requests {
            for &item in &request.items {
                assert!(item < n_items, "item id out of range: {item} >= {n_items}");
            }
        }

        let total_weight: f64 = requests.iter().map(|x| x.weight).sum();
        if !(total_weight > 0.0) || !total_weight.is_finite() {
            return Err(Error::DegenerateDemand(total_weight));
        }
        for request in &mut requests {
            request.weight /= total_weight;
        }

        Ok(PartitionInstance { n_partitions, n_items, requests, cost_model })
    }

    pub fn n_partitions(&self) -> usize {
        self.n_partitions
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn cost(&self, n_items: usize) -> f64 {
        self.cost_model.cost(n_items)
    }

    /// Evaluates a solution: each request pays the modelled cost of every partition its items
    /// touch, weighted. Accumulation runs in request order, then partition-index order, so a
    /// given instance and solution always evaluate to the same bits.
    pub fn eval(&self, soln: &PartitionSoln) -> Result<f64, Error> {
        if soln.partitions.len() != self.n_partitions {
            return Err(Error::InvalidSolution(format!(
                "expected {} partitions, got {}",
                self.n_partitions,
                soln.partitions.len()
            )));
        }

        let mut item_to_partition = vec![usize::MAX; self.n_items];
        let mut covered = 0usize;
        for (partition_idx, partition) in soln.partitions.iter().enumerate() {
            for &item in partition {
                if item >= self.n_items {
                    return Err(Error::InvalidSolution(format!(
                        "item id out of range: {item} >= {}",
                        self.n_items
                    )));
                }
                if item_to_partition[item] != usize::MAX {
                    return Err(Error::InvalidSolution(format!(
                        "item {item} is in partitions {} and {partition_idx}",
                        item_to_partition[item]
                    )));
                }
                item_to_partition[item] = partition_idx;
                covered += 1;
            }
        }
        if covered != self.n_items {
            return Err(Error::InvalidSolution(format!(
                "expected {} covered items, got {covered}",
                self.n_items
            )));
        }

        let partition_costs: Vec<f64> =
            soln.partitions.iter().map(|x| self.cost(x.len())).collect();

        let mut total = 0.0;
        let mut touched = vec![false; self.n_partitions];
        for request in &self.requests {
            touched.fill(false);
            for &item in &request.items {
                touched[item_to_partition[item]] = true;
            }
            let mut request_cost = 0.0;
            for (partition_idx, &is_touched) in touched.iter().enumerate() {
                if is_touched {
                    request_cost += partition_costs[partition_idx];
                }
            }
            total += request.weight * request_cost;
        }
        Ok(total)
    }
}

/// The trivial solution: every item in partition 0. Seeds the heuristic and serves as the
/// benchmark for reporting.
pub fn solve_baseline(instance: &PartitionInstance) -> PartitionSoln {
    let mut partitions = vec![BTreeSet::new(); instance.n_partitions];
    partitions[0] = (0..instance.n_items).collect();
    PartitionSoln { partitions }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soln(partitions: &[&[usize]]) -> PartitionSoln {
        PartitionSoln {
            partitions: partitions.iter().map(|x| x.iter().copied().collect()).collect(),
        }
    }

    fn simple_instance() -> PartitionInstance {
        PartitionInstance::new(
            1,
            4,
            vec![Request::new(1.0, [0, 1, 2, 3])],
            CostModel::Linear { cost_per_glyph: 10.0, cost_base: 100.0 },
        )
        .unwrap()
    }

    #[test]
    fn baseline_is_one_big_subset() {
        let instance = simple_instance();
        let baseline = solve_baseline(&instance);
        assert_eq!(baseline, soln(&[&[0, 1, 2, 3]]));
        assert_eq!(instance.eval(&baseline).unwrap(), 140.0);
    }

    #[test]
    fn eval_sums_touched_partitions_per_request() {
        let instance = PartitionInstance::new(
            2,
            4,
            vec![Request::new(0.5, [0, 1]), Request::new(0.5, [2, 3])],
            CostModel::Linear { cost_per_glyph: 1.0, cost_base: 0.0 },
        )
        .unwrap();

        // Each request touches only its own partition of size 2.
        assert_eq!(instance.eval(&soln(&[&[0, 1], &[2, 3]])).unwrap(), 2.0);
        // Both requests touch both partitions.
        assert_eq!(instance.eval(&soln(&[&[0, 2], &[1, 3]])).unwrap(), 4.0);
    }

    #[test]
    fn weights_are_normalized() {
        let instance = PartitionInstance::new(
            1,
            2,
            vec![Request::new(3.0, [0]), Request::new(1.0, [1])],
            CostModel::Linear { cost_per_glyph: 0.0, cost_base: 8.0 },
        )
        .unwrap();
        assert_eq!(instance.requests()[0].weight(), 0.75);
        assert_eq!(instance.requests()[1].weight(), 0.25);
        // Both requests touch the single partition: 0.75 * 8 + 0.25 * 8.
        assert_eq!(instance.eval(&soln(&[&[0, 1]])).unwrap(), 8.0);
    }

    #[test]
    fn empty_requests_are_dropped_and_pure_emptiness_is_degenerate() {
        let cost = CostModel::Linear { cost_per_glyph: 1.0, cost_base: 0.0 };
        let instance = PartitionInstance::new(
            1,
            2,
            vec![Request::new(5.0, []), Request::new(1.0, [0, 1])],
            cost.clone(),
        )
        .unwrap();
        assert_eq!(instance.requests().len(), 1);
        assert_eq!(instance.requests()[0].weight(), 1.0);

        assert!(matches!(
            PartitionInstance::new(1, 2, vec![Request::new(5.0, [])], cost.clone()),
            Err(Error::DegenerateDemand(_))
        ));
        assert!(matches!(
            PartitionInstance::new(1, 2, vec![Request::new(0.0, [0])], cost),
            Err(Error::DegenerateDemand(_))
        ));
    }

    #[test]
    fn eval_rejects_malformed_solutions() {
        let instance = simple_instance();
        // Wrong partition count.
        assert!(matches!(
            instance.eval(&soln(&[&[0, 1, 2, 3], &[]])),
            Err(Error::InvalidSolution(_))
        ));
        // Incomplete cover.
        assert!(matches!(
            instance.eval(&soln(&[&[0, 1, 2]])),
            Err(Error::InvalidSolution(_))
        ));
        // Out-of-range item.
        assert!(matches!(
            instance.eval(&soln(&[&[0, 1, 2, 4]])),
            Err(Error::InvalidSolution(_))
        ));

        let instance = PartitionInstance::new(
            2,
            2,
            vec![Request::new(1.0, [0, 1])],
            CostModel::Linear { cost_per_glyph: 1.0, cost_base: 0.0 },
        )
        .unwrap();
        // Overlapping partitions whose union still covers everything.
        assert!(matches!(
            instance.eval(&soln(&[&[0, 1], &[1]])),
            Err(Error::InvalidSolution(_))
        ));
    }

    #[test]
    fn an_extra_empty_partition_is_free() {
        let cost = CostModel::Linear { cost_per_glyph: 2.0, cost_base: 0.0 };
        let requests = vec![Request::new(1.0, [0, 1]), Request::new(1.0, [1])];
        let one = PartitionInstance::new(1, 2, requests.clone(), cost.clone()).unwrap();
        let two = PartitionInstance::new(2, 2, requests, cost).unwrap();
        assert_eq!(
            one.eval(&soln(&[&[0, 1]])).unwrap(),
            two.eval(&soln(&[&[0, 1], &[]])).unwrap()
        );
    }

    #[test]
    fn moving_items_to_an_empty_partition_only_reprices_sizes() {
        // With a cost model that is 0 at 0 and linear in n, splitting a partition a request
        // fully touches does not change that request's total.
        let instance = PartitionInstance::new(
            2,
            3,
            vec![Request::new(1.0, [0, 1, 2])],
            CostModel::Linear { cost_per_glyph: 1.0, cost_base: 0.0 },
        )
        .unwrap();
        assert_eq!(instance.eval(&soln(&[&[0, 1, 2], &[]])).unwrap(), 3.0);
        assert_eq!(instance.eval(&soln(&[&[0, 1], &[2]])).unwrap(), 3.0);
    }
}
