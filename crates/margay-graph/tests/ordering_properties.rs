//! Property tests for the dependency graph ordering invariants.

use margay_graph::DependencyGraph;
use proptest::prelude::*;

/// Build a guaranteed-acyclic graph: node `i` may only depend on nodes `< i`.
fn acyclic_graph(edges: &[(usize, usize)], node_count: usize) -> DependencyGraph {
    let mut deps: Vec<Vec<String>> = vec![Vec::new(); node_count];
    for &(hi, lo) in edges {
        let hi = hi % node_count;
        let lo = lo % node_count;
        if hi == lo {
            continue;
        }
        let (hi, lo) = if hi > lo { (hi, lo) } else { (lo, hi) };
        let dep = format!("n{lo:02}");
        if !deps[hi].contains(&dep) {
            deps[hi].push(dep);
        }
    }
    let mut graph = DependencyGraph::new();
    for (i, d) in deps.into_iter().enumerate() {
        graph.add_node(format!("n{i:02}"), d);
    }
    graph
}

proptest! {
    /// Every prerequisite appears strictly before its dependents.
    #[test]
    fn topological_order_respects_prerequisites(
        edges in proptest::collection::vec((0usize..12, 0usize..12), 0..30),
        node_count in 2usize..12,
    ) {
        let graph = acyclic_graph(&edges, node_count);
        let order = graph.topological_sort().expect("acyclic by construction");
        prop_assert_eq!(order.len(), graph.len());

        let position: std::collections::HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        for (id, node) in graph.nodes() {
            for dep in &node.dependencies {
                prop_assert!(position[dep.as_str()] < position[id.as_str()]);
            }
        }
    }

    /// Sorting succeeds exactly when no cycle is found.
    #[test]
    fn sort_succeeds_iff_no_cycles(
        edges in proptest::collection::vec((0usize..8, 0usize..8), 0..24),
        node_count in 2usize..8,
        close_cycle in proptest::bool::ANY,
    ) {
        let mut graph = acyclic_graph(&edges, node_count);
        if close_cycle {
            // force one back edge from the lowest node to the highest
            graph.add_node("n00", vec![format!("n{:02}", node_count - 1)]);
            graph.add_node(format!("n{:02}", node_count - 1), vec!["n00".to_string()]);
        }
        let cycles = graph.find_cycles();
        let sorted = graph.topological_sort();
        prop_assert_eq!(cycles.is_empty(), sorted.is_ok());
    }

    /// Marking nodes converted in topological order keeps the ready set
    /// non-empty until the graph is exhausted.
    #[test]
    fn ready_set_drains_in_order(
        edges in proptest::collection::vec((0usize..10, 0usize..10), 0..20),
        node_count in 2usize..10,
    ) {
        let mut graph = acyclic_graph(&edges, node_count);
        let mut remaining = graph.len();
        while remaining > 0 {
            let ready = graph.get_ready_to_convert();
            prop_assert!(!ready.is_empty());
            for id in ready {
                graph.mark_as_converted(&id);
                remaining -= 1;
            }
        }
        prop_assert!(graph.get_ready_to_convert().is_empty());
    }
}
