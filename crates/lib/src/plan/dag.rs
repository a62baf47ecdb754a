//! Dependency graph of a build plan.
//!
//! Wraps a petgraph [`DiGraph`] with edges running from dependency to
//! dependent, and computes the order nodes execute in.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::types::{PlanError, TaskId, TaskNode};

/// A validated, acyclic set of [`TaskNode`]s.
///
/// Nodes keep the order they were added in; that order breaks ties wherever
/// the graph leaves a choice, so equal inputs always yield equal plans.
#[derive(Debug, Clone)]
pub struct BuildPlan {
  graph: DiGraph<TaskId, ()>,
  nodes: Vec<TaskNode>,
  index: HashMap<TaskId, NodeIndex>,
}

impl BuildPlan {
  /// Build a plan from nodes.
  ///
  /// # Errors
  ///
  /// - [`PlanError::DuplicateNode`] if two nodes share an id
  /// - [`PlanError::UnknownDependency`] if a node depends on an id not in the plan
  /// - [`PlanError::CycleDetected`] if the dependencies form a cycle
  pub fn new(nodes: Vec<TaskNode>) -> Result<Self, PlanError> {
    let mut graph = DiGraph::new();
    let mut index = HashMap::new();

    for node in &nodes {
      if index.contains_key(&node.id) {
        return Err(PlanError::DuplicateNode(node.id.clone()));
      }
      let idx = graph.add_node(node.id.clone());
      index.insert(node.id.clone(), idx);
    }

    for node in &nodes {
      let dependent = index[&node.id];
      for dep in &node.deps {
        let Some(&dependency) = index.get(dep) else {
          return Err(PlanError::UnknownDependency {
            node: node.id.clone(),
            dependency: dep.clone(),
          });
        };
        graph.add_edge(dependency, dependent, ());
      }
    }

    toposort(&graph, None).map_err(|_| PlanError::CycleDetected)?;

    Ok(Self { graph, nodes, index })
  }

  /// Nodes in insertion order.
  pub fn nodes(&self) -> &[TaskNode] {
    &self.nodes
  }

  pub fn node(&self, id: &TaskId) -> Option<&TaskNode> {
    self.index.get(id).map(|idx| &self.nodes[idx.index()])
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// `(dependency, dependent)` pairs, grouped by dependent in insertion order.
  pub fn edges(&self) -> Vec<(TaskId, TaskId)> {
    self
      .nodes
      .iter()
      .flat_map(|node| node.deps.iter().map(|dep| (dep.clone(), node.id.clone())))
      .collect()
  }

  /// Direct dependents of a node.
  pub fn dependents(&self, id: &TaskId) -> Vec<TaskId> {
    let Some(&idx) = self.index.get(id) else {
      return Vec::new();
    };
    let mut dependents: Vec<NodeIndex> = self.graph.neighbors_directed(idx, Direction::Outgoing).collect();
    dependents.sort();
    dependents.into_iter().map(|i| self.graph[i].clone()).collect()
  }

  /// Nodes grouped into waves.
  ///
  /// Every node's dependencies lie in earlier waves, so the nodes of one wave
  /// may run in any order or concurrently. Within a wave nodes keep insertion
  /// order.
  pub fn execution_waves(&self) -> Vec<Vec<TaskId>> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let mut ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[idx] == 0).copied().collect();
      // Validated acyclic in `new`, so some node is always ready.
      if ready.is_empty() {
        break;
      }
      ready.sort();

      for &idx in &ready {
        remaining.remove(&idx);
        for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&neighbor) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      waves.push(ready.into_iter().map(|idx| self.graph[idx].clone()).collect());
    }

    waves
  }

  /// A topological order of all nodes: the waves, flattened.
  pub fn topological_order(&self) -> Vec<TaskId> {
    self.execution_waves().into_iter().flatten().collect()
  }
}
