//! Dependency graph over translation units.
//!
//! One name-keyed graph serves both levels the pipeline works at: the
//! file-include graph built from user includes, and the program graph the
//! orchestrator walks. Nodes carry their prerequisite list (`dependencies`)
//! and a separately maintained reverse index; the reverse index is updated
//! on every mutation, never inferred lazily.
//!
//! Conversion order places every prerequisite strictly before its
//! dependents. When the graph is cyclic, Tarjan SCC condensation produces a
//! DAG whose topological order serves as an ordering hint.

pub mod graph;

pub use graph::{
    build_file_graph, DependencyGraph, DependencyNode, GraphError, GraphStatistics,
};
