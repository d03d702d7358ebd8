//! Validated, identified graphs.
//!
//! A `Plan` is immutable: every constructor checks acyclicity and computes
//! the plan id once.

use super::error::{FrofError, FrofResult};
use super::graph::Graph;
use super::parser;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    graph: Graph,
    plan_id: String,
}

impl Plan {
    /// Wrap an already-built graph.
    pub fn from_graph(graph: Graph) -> FrofResult<Self> {
        graph.topological_order()?;
        let plan_id = compute_plan_id(&graph);
        Ok(Self { graph, plan_id })
    }

    /// Parse inline DSL text.
    pub fn from_source(src: &str) -> FrofResult<Self> {
        Self::from_graph(parser::parse(src)?)
    }

    /// Read and parse a DSL file.
    pub fn from_file(path: &Path) -> FrofResult<Self> {
        Self::from_graph(parser::parse_file(path)?)
    }

    /// Accept either inline DSL or a path to a DSL file.
    ///
    /// Text with a newline is always inline. Otherwise the text is tried as a
    /// path (`~/` expands to `$HOME`) and falls back to inline when no such
    /// file exists.
    pub fn resolve(input: &str) -> FrofResult<Self> {
        if !input.contains('\n') {
            let path = expand_home(input);
            if path.is_file() {
                return Self::from_file(&path);
            }
        }
        Self::from_source(input)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Deep copy of the graph, detached from the plan.
    pub fn to_graph(&self) -> Graph {
        self.graph.clone()
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

/// Lowercase hex SHA-256 of the node ids in graph order joined by `.`.
pub fn compute_plan_id(graph: &Graph) -> String {
    let joined = graph.node_ids().collect::<Vec<_>>().join(".");
    let digest = Sha256::digest(joined.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn expand_home(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(input)
}

impl TryFrom<Graph> for Plan {
    type Error = FrofError;

    fn try_from(graph: Graph) -> FrofResult<Self> {
        Self::from_graph(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::JobNode;
    use crate::core::job::Job;
    use proptest::prelude::*;

    #[test]
    fn test_plan_id_is_sha256_of_joined_ids() {
        let plan = Plan::from_source("A -> B -> C").unwrap();
        assert_eq!(plan.plan_id().len(), 64);
        assert!(plan.plan_id().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        let digest = Sha256::digest(b"A.B.C");
        let expected: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(plan.plan_id(), expected);
    }

    #[test]
    fn test_plan_id_depends_on_order_only() {
        let a = Plan::from_source("A -> B\nA: echo one").unwrap();
        let b = Plan::from_source("A\nB\nA: echo two").unwrap();
        assert_eq!(a.plan_id(), b.plan_id());
        let c = Plan::from_source("B -> A").unwrap();
        assert_ne!(a.plan_id(), c.plan_id());
    }

    #[test]
    fn test_plan_id_changes_with_node_set() {
        let base = Plan::from_source("A -> B").unwrap();
        for other in ["A -> B\nC", "A", "A -> Bx"] {
            let plan = Plan::from_source(other).unwrap();
            assert_ne!(base.plan_id(), plan.plan_id(), "{other}");
        }
    }

    #[test]
    fn test_resolve_does_not_trim_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.frof");
        std::fs::write(&path, "X -> Y\n").unwrap();
        let padded = format!(" {}", path.display());
        // no file named " /…/p.frof", so the text is parsed as DSL and fails
        assert!(matches!(Plan::resolve(&padded), Err(FrofError::Parse { .. })));
    }

    #[test]
    fn test_from_graph_rejects_cycle() {
        let mut g = Graph::new();
        for id in ["a", "b"] {
            g.ensure_node(id);
        }
        g.add_path(&["a", "b", "a"]).unwrap();
        assert!(matches!(Plan::from_graph(g), Err(FrofError::Cycle { .. })));
        assert!(matches!(
            Plan::from_source("A -> B -> C -> A"),
            Err(FrofError::Cycle { .. })
        ));
    }

    #[test]
    fn test_to_graph_is_detached() {
        let plan = Plan::from_source("A -> B").unwrap();
        let mut copy = plan.to_graph();
        copy.add_node(JobNode::new("C", Job::noop())).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(copy.len(), 3);
    }

    #[test]
    fn test_resolve_inline_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.frof");
        std::fs::write(&path, "X -> Y\nX: true\nY: true\n").unwrap();

        let from_path = Plan::resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(from_path.graph().node_ids().collect::<Vec<_>>(), vec!["X", "Y"]);

        let inline = Plan::resolve("X -> Y\nX: true").unwrap();
        assert_eq!(inline.plan_id(), from_path.plan_id());

        // single line that is not a file is parsed as DSL
        let single = Plan::resolve("only").unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_from_file_missing_is_io_error() {
        let err = Plan::from_file(Path::new("/no/such/plan.frof")).unwrap_err();
        assert!(matches!(err, FrofError::Io { .. }));
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_home("~/x.frof"), PathBuf::from(home).join("x.frof"));
        }
        assert_eq!(expand_home("rel/x.frof"), PathBuf::from("rel/x.frof"));
    }

    fn source_from(names: &[String], edges: &[(usize, usize)]) -> String {
        let mut src = String::new();
        for n in names {
            src.push_str(n);
            src.push('\n');
        }
        for &(a, b) in edges {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            if lo != hi {
                src.push_str(&format!("{} -> {}\n", names[lo], names[hi]));
            }
        }
        src
    }

    proptest! {
        #[test]
        fn prop_plan_id_deterministic(
            n in 1usize..12,
            edges in proptest::collection::vec((0usize..12, 0usize..12), 0..30),
        ) {
            let names: Vec<String> = (0..n).map(|i| format!("j{}", i)).collect();
            let edges: Vec<(usize, usize)> =
                edges.into_iter().map(|(a, b)| (a % n, b % n)).collect();
            let src = source_from(&names, &edges);
            let a = Plan::from_source(&src).unwrap();
            let b = Plan::from_source(&src).unwrap();
            prop_assert_eq!(a.plan_id(), b.plan_id());
            prop_assert_eq!(a.graph(), b.graph());
        }

        #[test]
        fn prop_topological_order_respects_edges(
            n in 1usize..15,
            edges in proptest::collection::vec((0usize..15, 0usize..15), 0..40),
        ) {
            let names: Vec<String> = (0..n).map(|i| format!("j{}", i)).collect();
            let edges: Vec<(usize, usize)> =
                edges.into_iter().map(|(a, b)| (a % n, b % n)).collect();
            let plan = Plan::from_source(&source_from(&names, &edges)).unwrap();
            let order = plan.graph().topological_order().unwrap();
            prop_assert_eq!(order.len(), n);
            for (from, to) in plan.graph().edges() {
                let i = order.iter().position(|x| x == from).unwrap();
                let j = order.iter().position(|x| x == to).unwrap();
                prop_assert!(i < j);
            }
        }
    }
}
