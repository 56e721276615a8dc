//! Optimal order-preserving vertex removal, by label setting.
//!
//! Given a tour's vertex sequence, build the chain DAG over positions
//! 0..=n (position n duplicates the anchor) with an arc (i, j) for every
//! i < j except (0, n), costed by the travel time between the original
//! vertices at those positions. A label-setting sweep in topological
//! order finds, among all subsequences that preserve the cyclic order,
//! the one of maximum prize whose accumulated travel time stays within
//! the budget.
//!
//! Dominance: a label dominates another iff its time is no larger and
//! its prize no smaller, with at least one strict. Only Pareto-optimal
//! labels are extended.

use crate::graph::Graph;

#[derive(Debug, Clone, Copy)]
struct Label {
    time: f64,
    prize: f64,
    /// Predecessor node and label index, for path reconstruction.
    pred: Option<(usize, usize)>,
}

impl Label {
    fn dominates(&self, other: &Label) -> bool {
        self.time <= other.time
            && self.prize >= other.prize
            && (self.time < other.time || self.prize > other.prize)
    }
}

/// The maximum-prize subsequence of `vertices` (a closed tour starting
/// at its anchor) whose travel time fits `budget`.
///
/// The anchor is always kept, and so is at least one interior vertex:
/// the chain has no direct (0, n) arc. Returns the kept vertices in
/// their original order.
pub(crate) fn max_prize_subsequence(graph: &Graph, vertices: &[usize], budget: f64) -> Vec<usize> {
    let n = vertices.len();
    debug_assert!(n >= 2);

    // Chain node i < n is position i; node n is the anchor again.
    let node_vertex = |node: usize| {
        if node == n {
            vertices[0]
        } else {
            vertices[node]
        }
    };

    let mut labels: Vec<Vec<Label>> = vec![Vec::new(); n + 1];
    labels[0].push(Label {
        time: 0.0,
        prize: graph.vertex(vertices[0]).prize,
        pred: None,
    });

    // Topological sweep: all arcs go from lower to higher positions.
    for i in 0..n {
        if labels[i].is_empty() {
            continue;
        }
        for j in (i + 1)..=n {
            if i == 0 && j == n {
                continue;
            }
            let arc_time = graph.travel_time(node_vertex(i), node_vertex(j));
            let dest_prize = graph.vertex(node_vertex(j)).prize;

            for li in 0..labels[i].len() {
                let label = labels[i][li];
                let time = label.time + arc_time;
                if time > budget {
                    continue;
                }
                let extended = Label {
                    time,
                    prize: label.prize + dest_prize,
                    pred: Some((i, li)),
                };
                insert_if_not_dominated(&mut labels[j], extended);
            }
        }
    }

    let terminal = labels[n]
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.prize.total_cmp(&b.prize))
        .map(|(i, _)| i);

    let Some(mut label_idx) = terminal else {
        // No interior vertex fits the budget; keep the cheapest pair so
        // the tour stays well-formed. This mirrors the degenerate-tour
        // floor of the removal primitives.
        log::warn!("no budget-feasible subsequence; keeping the anchor pair");
        return vec![vertices[0], vertices[1]];
    };

    // Reconstruct kept positions by walking predecessors from node n.
    let mut kept_nodes = Vec::new();
    let mut node = n;
    loop {
        kept_nodes.push(node);
        match labels[node][label_idx].pred {
            Some((pred_node, pred_idx)) => {
                node = pred_node;
                label_idx = pred_idx;
            }
            None => break,
        }
    }
    kept_nodes.reverse();

    kept_nodes
        .into_iter()
        .filter(|&node| node < n)
        .map(|node| vertices[node])
        .collect()
}

fn insert_if_not_dominated(labels: &mut Vec<Label>, candidate: Label) {
    if labels.iter().any(|l| l.dominates(&candidate)) {
        return;
    }
    labels.retain(|l| !candidate.dominates(l));
    labels.push(candidate);
}
