//! Name-keyed dependency graph with deterministic ordering.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use margay_analyzer::FileInfo;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cannot determine conversion order due to circular dependencies:\n{}", format_cycles(.0))]
    CircularDependencies(Vec<Vec<String>>),
    #[error("unknown node: {0}")]
    UnknownNode(String),
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| c.join(" -> "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One node: its prerequisites and conversion state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyNode {
    pub program_id: String,
    pub dependencies: Vec<String>,
    pub is_converted: bool,
    /// Set only after a successful topological sort.
    pub conversion_order: Option<usize>,
}

impl DependencyNode {
    pub fn has_dependency(&self, program_id: &str) -> bool {
        self.dependencies.iter().any(|d| d == program_id)
    }
}

/// Snapshot counters for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct GraphStatistics {
    pub total_programs: usize,
    pub converted_programs: usize,
    pub pending_programs: usize,
    pub total_dependencies: usize,
    pub circular_dependencies: usize,
    pub conversion_progress: f64,
}

/// Forward map plus separately maintained reverse index.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, DependencyNode>,
    reverse: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    pub fn nodes(&self) -> &BTreeMap<String, DependencyNode> {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&DependencyNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert or replace a node and its prerequisite list.
    ///
    /// Dependencies that are not yet known become dangling nodes with no
    /// prerequisites of their own. The reverse index is kept consistent
    /// with the forward edges on every call.
    pub fn add_node(&mut self, program_id: impl Into<String>, dependencies: Vec<String>) {
        let program_id = program_id.into();

        if let Some(existing) = self.nodes.get(&program_id) {
            for old_dep in existing.dependencies.clone() {
                if let Some(dependents) = self.reverse.get_mut(&old_dep) {
                    dependents.remove(&program_id);
                }
            }
        }

        for dep in &dependencies {
            self.reverse
                .entry(dep.clone())
                .or_default()
                .insert(program_id.clone());
            self.nodes.entry(dep.clone()).or_insert_with(|| DependencyNode {
                program_id: dep.clone(),
                ..DependencyNode::default()
            });
        }

        let entry = self.nodes.entry(program_id.clone()).or_insert_with(|| DependencyNode {
            program_id,
            ..DependencyNode::default()
        });
        entry.dependencies = dependencies;
    }

    /// The only mutation that changes readiness.
    pub fn mark_as_converted(&mut self, program_id: &str) {
        if let Some(node) = self.nodes.get_mut(program_id) {
            node.is_converted = true;
        }
    }

    /// Unconverted nodes whose prerequisites are all converted, sorted.
    pub fn get_ready_to_convert(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| !node.is_converted)
            .filter(|node| {
                node.dependencies.iter().all(|dep| {
                    self.nodes.get(dep).map(|n| n.is_converted).unwrap_or(true)
                })
            })
            .map(|node| node.program_id.clone())
            .collect()
    }

    pub fn dependents_of(&self, program_id: &str) -> BTreeSet<String> {
        self.reverse.get(program_id).cloned().unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Cycle detection (DFS coloring)
    // ------------------------------------------------------------------

    /// Enumerate cycles via white/gray/black DFS; each back edge reports the
    /// cycle as `[v, ..., v]`.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: BTreeMap<&str, Color> =
            self.nodes.keys().map(|k| (k.as_str(), Color::White)).collect();
        let mut cycles = Vec::new();

        fn dfs<'a>(
            graph: &'a DependencyGraph,
            u: &'a str,
            color: &mut BTreeMap<&'a str, Color>,
            stack: &mut Vec<&'a str>,
            cycles: &mut Vec<Vec<String>>,
        ) {
            color.insert(u, Color::Gray);
            stack.push(u);
            if let Some(node) = graph.nodes.get(u) {
                for dep in &node.dependencies {
                    match color.get(dep.as_str()).copied().unwrap_or(Color::White) {
                        Color::White => {
                            if graph.nodes.contains_key(dep) {
                                dfs(graph, dep, color, stack, cycles);
                            }
                        }
                        Color::Gray => {
                            if let Some(start) = stack.iter().position(|s| *s == dep) {
                                let mut cycle: Vec<String> =
                                    stack[start..].iter().map(|s| s.to_string()).collect();
                                cycle.push(dep.clone());
                                cycles.push(cycle);
                            }
                        }
                        Color::Black => {}
                    }
                }
            }
            stack.pop();
            color.insert(u, Color::Black);
        }

        let ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        for id in ids {
            if color.get(id).copied() == Some(Color::White) {
                let mut stack = Vec::new();
                dfs(self, id, &mut color, &mut stack, &mut cycles);
            }
        }
        cycles
    }

    // ------------------------------------------------------------------
    // Topological ordering (Kahn)
    // ------------------------------------------------------------------

    /// Kahn's algorithm with an alphabetical ready queue.
    ///
    /// Returns the order (prerequisites strictly first) or the cycles that
    /// prevented it.
    pub fn topological_sort(&self) -> Result<Vec<String>, Vec<Vec<String>>> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        for (id, node) in &self.nodes {
            let degree = node
                .dependencies
                .iter()
                .filter(|dep| self.nodes.contains_key(*dep))
                .count();
            in_degree.insert(id.as_str(), degree);
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(next) = ready.iter().next().copied() {
            ready.remove(next);
            order.push(next.to_string());
            if let Some(dependents) = self.reverse.get(next) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(dependent.as_str());
                        }
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            Err(self.find_cycles())
        } else {
            Ok(order)
        }
    }

    /// Topological sort that also stamps `conversion_order` on success.
    pub fn get_conversion_order(&mut self) -> Result<Vec<String>, GraphError> {
        let order = self
            .topological_sort()
            .map_err(GraphError::CircularDependencies)?;
        for (idx, id) in order.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.conversion_order = Some(idx);
            }
        }
        Ok(order)
    }

    // ------------------------------------------------------------------
    // Strongly connected components (Tarjan)
    // ------------------------------------------------------------------

    pub fn tarjan_scc(&self) -> Vec<Vec<String>> {
        struct State<'a> {
            index: usize,
            indices: BTreeMap<&'a str, usize>,
            low: BTreeMap<&'a str, usize>,
            stack: Vec<&'a str>,
            on_stack: BTreeSet<&'a str>,
            sccs: Vec<Vec<String>>,
        }

        fn strongconnect<'a>(graph: &'a DependencyGraph, v: &'a str, st: &mut State<'a>) {
            st.indices.insert(v, st.index);
            st.low.insert(v, st.index);
            st.index += 1;
            st.stack.push(v);
            st.on_stack.insert(v);

            if let Some(node) = graph.nodes.get(v) {
                for dep in &node.dependencies {
                    let w = dep.as_str();
                    if !graph.nodes.contains_key(w) {
                        continue;
                    }
                    if !st.indices.contains_key(w) {
                        strongconnect(graph, w, st);
                        let low_w = st.low[w];
                        let low_v = st.low.get_mut(v).unwrap();
                        *low_v = (*low_v).min(low_w);
                    } else if st.on_stack.contains(w) {
                        let idx_w = st.indices[w];
                        let low_v = st.low.get_mut(v).unwrap();
                        *low_v = (*low_v).min(idx_w);
                    }
                }
            }

            if st.low[v] == st.indices[v] {
                let mut component = Vec::new();
                while let Some(w) = st.stack.pop() {
                    st.on_stack.remove(w);
                    component.push(w.to_string());
                    if w == v {
                        break;
                    }
                }
                st.sccs.push(component);
            }
        }

        let mut state = State {
            index: 0,
            indices: BTreeMap::new(),
            low: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            sccs: Vec::new(),
        };
        for id in self.nodes.keys() {
            if !state.indices.contains_key(id.as_str()) {
                strongconnect(self, id, &mut state);
            }
        }
        state.sccs
    }

    /// Condense the graph to its SCC DAG and topologically order the
    /// components. Used as the conversion-order hint for cyclic graphs.
    /// Members inside one component are sorted for stability.
    pub fn condensed_order(&self) -> Vec<Vec<String>> {
        let sccs = self.tarjan_scc();
        let mut component_of: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, component) in sccs.iter().enumerate() {
            for member in component {
                component_of.insert(member.as_str(), i);
            }
        }

        // reverse edges between distinct components: prerequisite -> dependents
        let mut component_dependents: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut in_degree: BTreeMap<usize, usize> = (0..sccs.len()).map(|i| (i, 0)).collect();
        for (id, node) in &self.nodes {
            let from = component_of[id.as_str()];
            for dep in &node.dependencies {
                let Some(&to) = component_of.get(dep.as_str()) else {
                    continue;
                };
                if from != to && component_dependents.entry(to).or_default().insert(from) {
                    *in_degree.get_mut(&from).unwrap() += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| *i)
            .collect();
        let mut order = Vec::new();
        while let Some(next) = ready.iter().next().copied() {
            ready.remove(&next);
            order.push(next);
            if let Some(dependents) = component_dependents.get(&next) {
                for dependent in dependents.clone() {
                    let degree = in_degree.get_mut(&dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        order
            .into_iter()
            .map(|i| {
                let mut members = sccs[i].clone();
                members.sort();
                members
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    pub fn statistics(&self) -> GraphStatistics {
        let total = self.nodes.len();
        let converted = self.nodes.values().filter(|n| n.is_converted).count();
        let edges: usize = self.nodes.values().map(|n| n.dependencies.len()).sum();
        let cycles = self.find_cycles();
        GraphStatistics {
            total_programs: total,
            converted_programs: converted,
            pending_programs: total - converted,
            total_dependencies: edges,
            circular_dependencies: cycles.len(),
            conversion_progress: if total > 0 {
                converted as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    pub fn render_text(&self) -> String {
        let mut lines = vec!["Dependency Graph:".to_string(), "=".repeat(50)];
        for (id, node) in &self.nodes {
            let status = if node.is_converted { "x" } else { "o" };
            let deps = if node.dependencies.is_empty() {
                "none".to_string()
            } else {
                node.dependencies.join(", ")
            };
            lines.push(format!("[{status}] {id}"));
            lines.push(format!("    depends on: {deps}"));
            let dependents = self.dependents_of(id);
            if !dependents.is_empty() {
                let used_by: Vec<&str> = dependents.iter().map(String::as_str).collect();
                lines.push(format!("    used by: {}", used_by.join(", ")));
            }
        }
        lines.join("\n")
    }

    /// Graphviz rendering of the graph, headers and sources color-coded.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph Dependencies {\n");
        out.push_str("  rankdir=LR;\n");
        out.push_str("  node [shape=box, style=\"rounded,filled\"];\n\n");
        for id in self.nodes.keys() {
            let color = if id.ends_with(".h") {
                "lightblue"
            } else if id.ends_with(".c") {
                "lightgreen"
            } else {
                "lightgray"
            };
            out.push_str(&format!("  \"{id}\" [fillcolor={color}];\n"));
        }
        out.push('\n');
        for (id, node) in &self.nodes {
            let mut deps: Vec<&String> = node.dependencies.iter().collect();
            deps.sort();
            for dep in deps {
                out.push_str(&format!("  \"{id}\" -> \"{dep}\";\n"));
            }
        }
        out.push_str("}\n");
        out
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn dirname(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Build the file-level graph from per-file user includes.
///
/// Each include resolves basename-in-same-directory-first, falling back to
/// any basename match across the project. Includes that match no project
/// file stay in the graph as dangling nodes.
pub fn build_file_graph(files: &BTreeMap<String, FileInfo>) -> DependencyGraph {
    let mut basename_map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for path in files.keys() {
        basename_map.entry(basename(path)).or_default().push(path);
    }

    let mut graph = DependencyGraph::new();
    for (path, info) in files {
        let node_name = basename(path).to_string();
        let parent = dirname(path);

        let mut deps = Vec::new();
        for include in &info.user_includes {
            let include_base = basename(include);
            let resolved = match basename_map.get(include_base) {
                Some(candidates) => candidates
                    .iter()
                    .find(|cand| dirname(cand) == parent)
                    .map(|cand| basename(cand))
                    .unwrap_or(include_base),
                None => include_base,
            };
            let resolved = resolved.to_string();
            if resolved != node_name && !deps.contains(&resolved) {
                deps.push(resolved);
            }
        }
        graph.add_node(node_name, deps);
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_file_graph() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        graph.add_node("util.c", vec![]);
        graph.add_node("main.c", vec!["util.c".to_string()]);
        graph
    }

    // ---------------------------------------------------------------
    // Construction and reverse index
    // ---------------------------------------------------------------

    #[test]
    fn add_node_creates_dangling_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", vec!["b".to_string()]);
        assert_eq!(graph.len(), 2);
        assert!(graph.node("b").unwrap().dependencies.is_empty());
    }

    #[test]
    fn reverse_index_tracks_dependents() {
        let graph = two_file_graph();
        let dependents = graph.dependents_of("util.c");
        assert!(dependents.contains("main.c"));
        assert!(graph.dependents_of("main.c").is_empty());
    }

    #[test]
    fn replacing_dependencies_updates_reverse_index() {
        let mut graph = two_file_graph();
        graph.add_node("main.c", vec![]);
        assert!(graph.dependents_of("util.c").is_empty());
    }

    // ---------------------------------------------------------------
    // Topological ordering
    // ---------------------------------------------------------------

    #[test]
    fn prerequisites_come_first() {
        let graph = two_file_graph();
        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec!["util.c", "main.c"]);
    }

    #[test]
    fn ready_queue_breaks_ties_alphabetically() {
        let mut graph = DependencyGraph::new();
        graph.add_node("zebra", vec![]);
        graph.add_node("apple", vec![]);
        graph.add_node("mango", vec![]);
        let order = graph.topological_sort().unwrap();
        assert_eq!(order, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn conversion_order_stamps_positions() {
        let mut graph = two_file_graph();
        let order = graph.get_conversion_order().unwrap();
        assert_eq!(order, vec!["util.c", "main.c"]);
        assert_eq!(graph.node("util.c").unwrap().conversion_order, Some(0));
        assert_eq!(graph.node("main.c").unwrap().conversion_order, Some(1));
    }

    #[test]
    fn diamond_order_respects_every_edge() {
        let mut graph = DependencyGraph::new();
        graph.add_node("base", vec![]);
        graph.add_node("left", vec!["base".to_string()]);
        graph.add_node("right", vec!["base".to_string()]);
        graph.add_node(
            "top",
            vec!["left".to_string(), "right".to_string()],
        );
        let order = graph.topological_sort().unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("base") < pos("left"));
        assert!(pos("base") < pos("right"));
        assert!(pos("left") < pos("top"));
        assert!(pos("right") < pos("top"));
    }

    // ---------------------------------------------------------------
    // Cycles and SCC condensation
    // ---------------------------------------------------------------

    #[test]
    fn cycle_fails_the_sort_and_is_reported() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a.h", vec!["b.h".to_string()]);
        graph.add_node("b.h", vec!["a.h".to_string()]);

        let cycles = graph.topological_sort().unwrap_err();
        assert_eq!(cycles.len(), 1);
        let cycle = &cycles[0];
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&"a.h".to_string()));
        assert!(cycle.contains(&"b.h".to_string()));
    }

    #[test]
    fn no_cycles_means_sort_succeeds_and_vice_versa() {
        let acyclic = two_file_graph();
        assert!(acyclic.find_cycles().is_empty());
        assert!(acyclic.topological_sort().is_ok());

        let mut cyclic = DependencyGraph::new();
        cyclic.add_node("x", vec!["y".to_string()]);
        cyclic.add_node("y", vec!["x".to_string()]);
        assert!(!cyclic.find_cycles().is_empty());
        assert!(cyclic.topological_sort().is_err());
    }

    #[test]
    fn tarjan_groups_the_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", vec!["b".to_string()]);
        graph.add_node("b", vec!["a".to_string()]);
        graph.add_node("c", vec!["a".to_string()]);

        let sccs = graph.tarjan_scc();
        let sizes: Vec<usize> = {
            let mut s: Vec<usize> = sccs.iter().map(Vec::len).collect();
            s.sort();
            s
        };
        assert_eq!(sizes, vec![1, 2]);
    }

    #[test]
    fn condensed_order_places_cycle_before_dependent() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", vec!["b".to_string()]);
        graph.add_node("b", vec!["a".to_string()]);
        graph.add_node("c", vec!["a".to_string()]);

        let hint = graph.condensed_order();
        assert_eq!(hint.len(), 2);
        assert_eq!(hint[0], vec!["a", "b"]);
        assert_eq!(hint[1], vec!["c"]);
    }

    #[test]
    fn get_conversion_order_surfaces_cycles_as_error() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a.h", vec!["b.h".to_string()]);
        graph.add_node("b.h", vec!["a.h".to_string()]);
        let err = graph.get_conversion_order().unwrap_err();
        assert!(err.to_string().contains("circular dependencies"));
    }

    // ---------------------------------------------------------------
    // Readiness
    // ---------------------------------------------------------------

    #[test]
    fn readiness_follows_conversion() {
        let mut graph = two_file_graph();
        assert_eq!(graph.get_ready_to_convert(), vec!["util.c"]);
        graph.mark_as_converted("util.c");
        assert_eq!(graph.get_ready_to_convert(), vec!["main.c"]);
        graph.mark_as_converted("main.c");
        assert!(graph.get_ready_to_convert().is_empty());
    }

    #[test]
    fn statistics_track_progress() {
        let mut graph = two_file_graph();
        graph.mark_as_converted("util.c");
        let stats = graph.statistics();
        assert_eq!(stats.total_programs, 2);
        assert_eq!(stats.converted_programs, 1);
        assert_eq!(stats.pending_programs, 1);
        assert_eq!(stats.total_dependencies, 1);
        assert_eq!(stats.circular_dependencies, 0);
        assert_eq!(stats.conversion_progress, 50.0);
    }

    // ---------------------------------------------------------------
    // File graph construction
    // ---------------------------------------------------------------

    fn file_info(path: &str, user_includes: &[&str]) -> FileInfo {
        FileInfo {
            path: path.to_string(),
            user_includes: user_includes.iter().map(|s| s.to_string()).collect(),
            ..FileInfo::default()
        }
    }

    #[test]
    fn file_graph_resolves_same_directory_first() {
        let mut files = BTreeMap::new();
        files.insert(
            "proj/a/main.c".to_string(),
            file_info("proj/a/main.c", &["util.h"]),
        );
        files.insert(
            "proj/a/util.h".to_string(),
            file_info("proj/a/util.h", &[]),
        );
        files.insert(
            "proj/b/util.h".to_string(),
            file_info("proj/b/util.h", &[]),
        );

        let graph = build_file_graph(&files);
        assert!(graph.node("main.c").unwrap().has_dependency("util.h"));
    }

    #[test]
    fn unresolved_include_stays_as_dangling_node() {
        let mut files = BTreeMap::new();
        files.insert(
            "main.c".to_string(),
            file_info("main.c", &["vendor/missing.h"]),
        );
        let graph = build_file_graph(&files);
        assert!(graph.node("missing.h").is_some());
        assert!(graph.node("main.c").unwrap().has_dependency("missing.h"));
    }

    #[test]
    fn self_include_is_ignored() {
        let mut files = BTreeMap::new();
        files.insert("solo.h".to_string(), file_info("solo.h", &["solo.h"]));
        let graph = build_file_graph(&files);
        assert!(graph.node("solo.h").unwrap().dependencies.is_empty());
    }

    #[test]
    fn dot_export_lists_nodes_and_edges() {
        let graph = two_file_graph();
        let dot = graph.to_dot();
        assert!(dot.contains("\"main.c\" [fillcolor=lightgreen];"));
        assert!(dot.contains("\"main.c\" -> \"util.c\";"));
    }
}
