use crate::{
    error::Error,
    partitioner::{PartitionInstance, PartitionSoln},
};
use optift_common::bitset::DynamicBitset;
use std::collections::BTreeSet;
use tracing::debug;

/// Solver-side view of one partition: its items, and the indices of the requests whose item
/// sets intersect it. The request set is kept exact across every accepted move.
#[derive(Clone)]
struct HeuristicPartition {
    reqs: BTreeSet<usize>,
    items: DynamicBitset,
}

struct Move {
    src: usize,
    dst: usize,
    new_src: HeuristicPartition,
    new_dst: HeuristicPartition,
}

/// Local search over partition assignments, seeded with `initial_soln`.
///
/// A move `(c, i, j)` takes every item of request `c` out of partition `i` and adds it to
/// partition `j`. Moves are scored by delta cost without re-evaluating the instance; requests
/// are scanned in input order, source and destination partitions in index order, and a
/// candidate is replaced only by a strictly better one. The search ends after a full sweep
/// without an accepted move, so the result never costs more than the seed.
pub fn solve_heuristic(
    instance: &PartitionInstance,
    initial_soln: PartitionSoln,
) -> Result<PartitionSoln, Error> {
    let n_items = instance.n_items();
    let mut cur_cost = instance.eval(&initial_soln)?;

    let reqs: Vec<(f64, DynamicBitset)> = instance
        .requests()
        .iter()
        .map(|x| (x.weight(), DynamicBitset::from_indices(n_items, x.items().iter().copied())))
        .collect();

    let mut item_to_reqs: Vec<Vec<usize>> = vec![Vec::new(); n_items];
    for (u, request) in instance.requests().iter().enumerate() {
        for &item in request.items() {
            item_to_reqs[item].push(u);
        }
    }

    let mut partitions: Vec<HeuristicPartition> = initial_soln
        .partitions
        .iter()
        .map(|partition| {
            let mut items = DynamicBitset::new(n_items);
            let mut touching = BTreeSet::new();
            for &item in partition {
                items.set(item);
                touching.extend(item_to_reqs[item].iter().copied());
            }
            HeuristicPartition { reqs: touching, items }
        })
        .collect();

    let mut iter = 0;
    let mut can_improve = true;
    while can_improve {
        can_improve = false;
        for c in 0..reqs.len() {
            let mut best_cost = cur_cost;
            let mut best_move: Option<Move> = None;
            let items_c = &reqs[c].1;

            for i in 0..partitions.len() {
                let p1 = &partitions[i];
                let (items_retained, items_removed) = p1.items.diff_intersect(items_c);
                if items_removed.is_empty() {
                    // Removing nothing is a no-op move.
                    continue;
                }

                let mut reqs_retained = BTreeSet::new();
                let mut reqs_affected = Vec::new();
                let mut retained_weight = 0.0;
                let mut removed_weight = 0.0;
                for &u in &p1.reqs {
                    let (weight, ref items_u) = reqs[u];
                    if items_u.is_disjoint(&items_retained) {
                        removed_weight += weight;
                    } else {
                        retained_weight += weight;
                        reqs_retained.insert(u);
                    }
                    if !items_u.is_disjoint(&items_removed) {
                        reqs_affected.push(u);
                    }
                }

                let size_before = p1.items.len();
                let size_after = items_retained.len();
                let cost_after_ban = cur_cost
                    - removed_weight * instance.cost(size_before)
                    - retained_weight * (instance.cost(size_before) - instance.cost(size_after));

                // Try to move items_removed to another partition j
                for j in 0..partitions.len() {
                    if i == j {
                        continue;
                    }
                    let p2 = &partitions[j];
                    let items_extended = p2.items.union(&items_removed);
                    let size_before = p2.items.len();
                    let size_after = items_extended.len();

                    let mut existing_weight = 0.0;
                    for &u in &p2.reqs {
                        existing_weight += reqs[u].0;
                    }
                    let mut extended_weight = 0.0;
                    for &u in &reqs_affected {
                        if !p2.reqs.contains(&u) {
                            extended_weight += reqs[u].0;
                        }
                    }

                    let cost_after_add = cost_after_ban
                        + (instance.cost(size_after) - instance.cost(size_before))
                            * existing_weight
                        + instance.cost(size_after) * extended_weight;
                    if cost_after_add < best_cost {
                        best_cost = cost_after_add;
                        let mut new_dst_reqs = p2.reqs.clone();
                        new_dst_reqs.extend(reqs_affected.iter().copied());
                        best_move = Some(Move {
                            src: i,
                            dst: j,
                            new_src: HeuristicPartition {
                                reqs: reqs_retained.clone(),
                                items: items_retained.clone(),
                            },
                            new_dst: HeuristicPartition {
                                reqs: new_dst_reqs,
                                items: items_extended,
                            },
                        });
                    }
                }
            }

            if let Some(best_move) = best_move {
                can_improve = true;
                debug!(
                    "iter {iter:03} cost: {cur_cost:11.6} -> {best_cost:11.6} \
                     (ban {c:02} from {:02} and join {:02})",
                    best_move.src, best_move.dst,
                );
                partitions[best_move.src] = best_move.new_src;
                partitions[best_move.dst] = best_move.new_dst;
                cur_cost = best_cost;
            }
        }
        iter += 1;
    }

    let mut partitions: Vec<BTreeSet<usize>> =
        partitions.into_iter().map(|x| x.items.iter().collect()).collect();
    partitions.sort_by_key(|x| std::cmp::Reverse(x.len()));
    Ok(PartitionSoln { partitions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cost_model::CostModel, partitioner::solve_baseline, Request};

    /// n² at every integer point up to 8, so evaluation is exact for these instances.
    fn quadratic_cost() -> CostModel {
        CostModel::Empirical {
            knots: (0..=8).map(|n| (n, (n * n) as f64)).collect(),
        }
    }

    #[test]
    fn splits_independent_requests_apart() {
        let instance = PartitionInstance::new(
            2,
            4,
            vec![Request::new(0.5, [0, 1]), Request::new(0.5, [2, 3])],
            quadratic_cost(),
        )
        .unwrap();

        let baseline = solve_baseline(&instance);
        assert_eq!(instance.eval(&baseline).unwrap(), 16.0);

        let soln = solve_heuristic(&instance, baseline).unwrap();
        assert_eq!(instance.eval(&soln).unwrap(), 4.0);
        let partitions: Vec<Vec<usize>> =
            soln.partitions.iter().map(|x| x.iter().copied().collect()).collect();
        assert!(partitions.contains(&vec![0, 1]));
        assert!(partitions.contains(&vec![2, 3]));
    }

    #[test]
    fn declines_all_moves_when_nothing_improves() {
        // A single request over everything with a linear, zero-intercept cost: any split leaves
        // the touched total at exactly 3.
        let instance = PartitionInstance::new(
            2,
            3,
            vec![Request::new(1.0, [0, 1, 2])],
            CostModel::Linear { cost_per_glyph: 1.0, cost_base: 0.0 },
        )
        .unwrap();

        let baseline = solve_baseline(&instance);
        let soln = solve_heuristic(&instance, baseline.clone()).unwrap();
        assert_eq!(soln, baseline);
        assert_eq!(instance.eval(&soln).unwrap(), 3.0);
    }

    #[test]
    fn never_regresses_from_the_seed() {
        // Overlapping requests; the optimum is not a clean split, but the result must stay
        // valid and cost no more than the seed.
        let instance = PartitionInstance::new(
            3,
            6,
            vec![
                Request::new(3.0, [0, 1, 2]),
                Request::new(2.0, [2, 3]),
                Request::new(1.0, [3, 4, 5]),
                Request::new(2.0, [0, 5]),
            ],
            quadratic_cost(),
        )
        .unwrap();

        let baseline = solve_baseline(&instance);
        let baseline_cost = instance.eval(&baseline).unwrap();
        let soln = solve_heuristic(&instance, baseline).unwrap();
        assert!(instance.eval(&soln).unwrap() <= baseline_cost);
    }

    #[test]
    fn is_deterministic() {
        let instance = PartitionInstance::new(
            3,
            6,
            vec![
                Request::new(1.0, [0, 1, 2, 3]),
                Request::new(1.0, [2, 3, 4]),
                Request::new(1.0, [4, 5]),
            ],
            quadratic_cost(),
        )
        .unwrap();

        let a = solve_heuristic(&instance, solve_baseline(&instance)).unwrap();
        let b = solve_heuristic(&instance, solve_baseline(&instance)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn result_partitions_are_sorted_by_descending_size() {
        let instance = PartitionInstance::new(
            3,
            5,
            vec![Request::new(1.0, [0, 1, 2]), Request::new(1.0, [3, 4])],
            quadratic_cost(),
        )
        .unwrap();

        let soln = solve_heuristic(&instance, solve_baseline(&instance)).unwrap();
        let sizes: Vec<usize> = soln.partitions.iter().map(|x| x.len()).collect();
        let mut sorted = sizes.clone();
        sorted.sort_by_key(|&x| std::cmp::Reverse(x));
        assert_eq!(sizes, sorted);
        // Still a valid, evaluable solution.
        instance.eval(&soln).unwrap();
    }

    #[test]
    fn rejects_invalid_seeds() {
        let instance = PartitionInstance::new(
            2,
            4,
            vec![Request::new(1.0, [0, 1, 2, 3])],
            quadratic_cost(),
        )
        .unwrap();
        let bad_seed = PartitionSoln {
            partitions: vec![[0usize, 1].into_iter().collect(), BTreeSet::new()],
        };
        assert!(matches!(
            solve_heuristic(&instance, bad_seed),
            Err(Error::InvalidSolution(_))
        ));
    }
}
