//! Dependency graph of job nodes.
//!
//! Nodes are kept in insertion order; that order is the "graph order" used
//! for admission tie-breaking and for the plan id. Edges `u → v` mean v may
//! not start until u has completed.

use super::error::{FrofError, FrofResult};
use super::job::Job;
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// A node: a job plus its optional parallelism group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNode {
    pub id: String,
    pub job: Job,
    pub parallelism_group: Option<String>,
    /// Per-round admission cap for the group; `None` is unbounded
    pub max_parallel_count: Option<NonZeroUsize>,
}

impl JobNode {
    pub fn new(id: impl Into<String>, job: Job) -> Self {
        Self {
            id: id.into(),
            job,
            parallelism_group: None,
            max_parallel_count: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>, cap: Option<NonZeroUsize>) -> Self {
        self.parallelism_group = Some(group.into());
        self.max_parallel_count = cap;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: IndexMap<String, JobNode>,
    successors: IndexMap<String, IndexSet<String>>,
    predecessors: IndexMap<String, IndexSet<String>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Errors if the id already exists.
    pub fn add_node(&mut self, node: JobNode) -> FrofResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(FrofError::DuplicateJob {
                id: node.id,
                at: None,
            });
        }
        self.successors.insert(node.id.clone(), IndexSet::new());
        self.predecessors.insert(node.id.clone(), IndexSet::new());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Insert a zero-delay no-op node unless `id` already exists.
    pub fn ensure_node(&mut self, id: &str) {
        if !self.nodes.contains_key(id) {
            // cannot collide: checked above
            let _ = self.add_node(JobNode::new(id, Job::noop()));
        }
    }

    /// Add edge `from → to`. Both ends must exist.
    pub fn add_edge(&mut self, from: &str, to: &str) -> FrofResult<()> {
        for id in [from, to] {
            if !self.nodes.contains_key(id) {
                return Err(FrofError::UnknownNode(id.to_string()));
            }
        }
        if let Some(succ) = self.successors.get_mut(from) {
            succ.insert(to.to_string());
        }
        if let Some(pred) = self.predecessors.get_mut(to) {
            pred.insert(from.to_string());
        }
        Ok(())
    }

    /// Add edges along a path: `a → b → c`.
    pub fn add_path(&mut self, ids: &[&str]) -> FrofResult<()> {
        for pair in ids.windows(2) {
            self.add_edge(pair[0], pair[1])?;
        }
        Ok(())
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Option<JobNode> {
        let node = self.nodes.shift_remove(id)?;
        if let Some(succ) = self.successors.shift_remove(id) {
            for s in succ {
                if let Some(pred) = self.predecessors.get_mut(&s) {
                    pred.shift_remove(id);
                }
            }
        }
        if let Some(pred) = self.predecessors.shift_remove(id) {
            for p in pred {
                if let Some(succ) = self.successors.get_mut(&p) {
                    succ.shift_remove(id);
                }
            }
        }
        Some(node)
    }

    pub fn node(&self, id: &str) -> Option<&JobNode> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut JobNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in graph order.
    pub fn nodes(&self) -> impl Iterator<Item = &JobNode> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Position of a node in graph order.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.predecessors
            .get(id)
            .into_iter()
            .flat_map(|s| s.iter().map(String::as_str))
    }

    pub fn successors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.successors
            .get(id)
            .into_iter()
            .flat_map(|s| s.iter().map(String::as_str))
    }

    /// All edges as `(from, to)`, grouped by source in graph order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.successors
            .iter()
            .flat_map(|(from, succ)| succ.iter().map(move |to| (from.as_str(), to.as_str())))
    }

    pub fn edge_count(&self) -> usize {
        self.successors.values().map(IndexSet::len).sum()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Topological order via Kahn's algorithm, ties broken by graph order.
    /// Errors with the unresolved members when the graph has a cycle.
    pub fn topological_order(&self) -> FrofResult<Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .nodes
            .keys()
            .map(|id| self.predecessors.get(id).map_or(0, IndexSet::len))
            .collect();

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            let Some((id, _)) = self.nodes.get_index(current) else {
                continue;
            };
            order.push(id.clone());

            let mut next_ready: Vec<usize> = Vec::new();
            for succ in self.successors(id) {
                if let Some(i) = self.nodes.get_index_of(succ) {
                    in_degree[i] -= 1;
                    if in_degree[i] == 0 {
                        next_ready.push(i);
                    }
                }
            }
            next_ready.sort_unstable();
            queue.extend(next_ready);
        }

        if order.len() != self.nodes.len() {
            let members = self
                .nodes
                .keys()
                .enumerate()
                .filter(|(i, _)| in_degree[*i] > 0)
                .map(|(_, id)| id.clone())
                .collect();
            return Err(FrofError::Cycle { members });
        }

        Ok(order)
    }
}
