//! Cycle detection over a directed graph.

use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

/// Find the cycles reachable from `nodes`.
///
/// Depth-first search with an explicit recursion stack. When an edge
/// reaches a node that is still on the stack, the stack slice from that
/// node to the top is a cycle, in discovery order. Each node on a cycle maps
/// to the first cycle found through it; a node with an edge to itself maps
/// to a one-element cycle.
pub fn find_cycles<N, I, F, A>(nodes: I, mut adjacent: F) -> FxHashMap<N, Vec<N>>
where
    N: Clone + Eq + Hash,
    I: IntoIterator<Item = N>,
    F: FnMut(&N) -> A,
    A: IntoIterator<Item = N>,
{
    let mut finder = Finder {
        visited: FxHashSet::default(),
        on_stack: FxHashSet::default(),
        stack: Vec::new(),
        cycles: FxHashMap::default(),
    };
    for node in nodes {
        if !finder.visited.contains(&node) {
            finder.visit(node, &mut adjacent);
        }
    }
    finder.cycles
}

struct Finder<N> {
    visited: FxHashSet<N>,
    on_stack: FxHashSet<N>,
    stack: Vec<N>,
    cycles: FxHashMap<N, Vec<N>>,
}

impl<N: Clone + Eq + Hash> Finder<N> {
    fn visit<F, A>(&mut self, node: N, adjacent: &mut F)
    where
        F: FnMut(&N) -> A,
        A: IntoIterator<Item = N>,
    {
        self.visited.insert(node.clone());
        self.on_stack.insert(node.clone());
        self.stack.push(node.clone());

        // Deduplicate so parallel edges do not re-report the same cycle.
        let mut seen = FxHashSet::default();
        let next: Vec<N> = adjacent(&node)
            .into_iter()
            .filter(|n| seen.insert(n.clone()))
            .collect();

        for target in next {
            if self.on_stack.contains(&target) {
                if let Some(start) = self.stack.iter().position(|n| *n == target) {
                    let cycle = self.stack[start..].to_vec();
                    for member in &cycle {
                        self.cycles
                            .entry(member.clone())
                            .or_insert_with(|| cycle.clone());
                    }
                }
            } else if !self.visited.contains(&target) {
                self.visit(target, adjacent);
            }
        }

        self.stack.pop();
        self.on_stack.remove(&node);
    }
}
