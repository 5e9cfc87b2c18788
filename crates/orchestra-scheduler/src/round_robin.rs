//! Round-robin placement.

use std::collections::HashMap;

use orchestra_node::Node;
use orchestra_task::Task;

use crate::Scheduler;

/// Round-robin over the candidate list.
///
/// The cursor advances before indexing and wraps modulo the candidate
/// count, so N nodes are visited in order `1, 2, …, N-1, 0, 1, …` — the
/// first pick lands on the second node. Not safe for concurrent callers;
/// the dispatcher loop is the only driver.
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for RoundRobin {
    fn select_candidates(&self, _task: &Task, nodes: &[Node]) -> Vec<Node> {
        // Round-robin has no hard requirements; every node is a candidate.
        nodes.to_vec()
    }

    fn score(&mut self, _task: &Task, candidates: &[Node]) -> HashMap<String, f64> {
        if candidates.is_empty() {
            return HashMap::new();
        }

        self.cursor = (self.cursor + 1) % candidates.len();

        candidates
            .iter()
            .enumerate()
            .map(|(idx, node)| {
                let score = if idx == self.cursor { 1.0 } else { 0.0 };
                (node.name.clone(), score)
            })
            .collect()
    }

    fn pick(&self, scores: &HashMap<String, f64>, candidates: &[Node]) -> Option<Node> {
        let mut best: Option<(&Node, f64)> = None;
        for node in candidates {
            let score = scores.get(&node.name).copied().unwrap_or(0.0);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((node, score)),
            }
        }
        best.map(|(node, _)| node.clone())
    }
}
