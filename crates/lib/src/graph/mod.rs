//! Module dependency graph.
//!
//! This module turns the flat, ordered list of module declarations into a
//! directed acyclic graph and answers ordering queries over it:
//! - Topological build order (leaves first, ties broken by declaration order)
//! - Parallel build waves (groups of mutually independent modules)
//! - Direct and transitive dependency queries

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use petgraph::Direction;
use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use thiserror::Error;

use crate::manifest::{DependencyScope, ModuleDecl};

/// A dependency on a module that was never declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
  pub module: String,
  pub dependency: String,
}

impl std::fmt::Display for MissingDependency {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} -> {}", self.module, self.dependency)
  }
}

fn join_lines<T: std::fmt::Display>(items: &[T]) -> String {
  items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("\n  ")
}

/// Errors raised while loading the module graph.
///
/// Every variant carries all offending items, not just the first one found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("modules depend on undeclared modules:\n  {}", join_lines(.0))]
  MissingDependencies(Vec<MissingDependency>),

  #[error("modules declared more than once: {}", .0.join(", "))]
  DuplicateModules(Vec<String>),

  /// Each inner list is one strongly connected set of modules.
  #[error("dependency cycle between modules:\n  {}", .0.iter().map(|c| c.join(", ")).collect::<Vec<_>>().join("\n  "))]
  Cycle(Vec<Vec<String>>),

  #[error("unknown module: {0}")]
  UnknownModule(String),
}

/// The module dependency DAG.
///
/// Edges point from a dependency to its dependent and carry the scope of the
/// dependency (main or test outputs).
#[derive(Debug, Clone)]
pub struct ModuleGraph {
  graph: DiGraph<usize, DependencyScope>,
  names: Vec<String>,
  nodes: HashMap<String, NodeIndex>,
}

impl ModuleGraph {
  /// Build the graph from module declarations.
  ///
  /// # Errors
  ///
  /// - `DuplicateModules` if a name is declared twice
  /// - `MissingDependencies` listing every reference to an undeclared module
  /// - `Cycle` naming the modules of every cycle
  pub fn load(modules: &[ModuleDecl]) -> Result<Self, GraphError> {
    let mut graph = DiGraph::new();
    let mut names = Vec::with_capacity(modules.len());
    let mut nodes = HashMap::new();
    let mut duplicates = BTreeSet::new();

    // First pass: one node per module, in declaration order
    for module in modules {
      if nodes.contains_key(&module.name) {
        duplicates.insert(module.name.clone());
        continue;
      }
      let idx = graph.add_node(names.len());
      names.push(module.name.clone());
      nodes.insert(module.name.clone(), idx);
    }

    if !duplicates.is_empty() {
      return Err(GraphError::DuplicateModules(duplicates.into_iter().collect()));
    }

    // Second pass: edges from dependency to dependent
    let mut missing = Vec::new();
    for module in modules {
      let dependent_idx = nodes[&module.name];
      for dep in &module.depends_on {
        match nodes.get(dep.module()) {
          Some(&dep_idx) => {
            graph.add_edge(dep_idx, dependent_idx, dep.scope());
          }
          None => missing.push(MissingDependency {
            module: module.name.clone(),
            dependency: dep.module().to_string(),
          }),
        }
      }
    }

    if !missing.is_empty() {
      return Err(GraphError::MissingDependencies(missing));
    }

    let dag = Self { graph, names, nodes };
    dag.verify_acyclic()?;
    Ok(dag)
  }

  /// Verify that the graph is acyclic, naming every cycle found.
  fn verify_acyclic(&self) -> Result<(), GraphError> {
    let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
      .into_iter()
      .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
      .map(|scc| {
        let mut members: Vec<usize> = scc.iter().map(|&idx| self.graph[idx]).collect();
        members.sort_unstable();
        members.into_iter().map(|i| self.names[i].clone()).collect()
      })
      .collect();

    if cycles.is_empty() {
      return Ok(());
    }

    cycles.sort();
    Err(GraphError::Cycle(cycles))
  }

  fn index(&self, name: &str) -> Result<NodeIndex, GraphError> {
    self
      .nodes
      .get(name)
      .copied()
      .ok_or_else(|| GraphError::UnknownModule(name.to_string()))
  }

  fn sorted_names(&self, indices: impl Iterator<Item = NodeIndex>) -> Vec<&str> {
    let mut decl: Vec<usize> = indices.map(|idx| self.graph[idx]).collect();
    decl.sort_unstable();
    decl.dedup();
    decl.into_iter().map(|i| self.names[i].as_str()).collect()
  }

  /// Module names in declaration order.
  pub fn modules(&self) -> &[String] {
    &self.names
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.nodes.contains_key(name)
  }

  /// Topological build order, leaves first.
  ///
  /// Among modules that are ready at the same time, the one declared first
  /// comes first, so the order is stable across runs.
  pub fn build_order(&self) -> Vec<&str> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.direct_dependency_count(idx)))
      .collect();

    let mut ready: BinaryHeap<Reverse<(usize, NodeIndex)>> = in_degree
      .iter()
      .filter(|&(_, &deg)| deg == 0)
      .map(|(&idx, _)| Reverse((self.graph[idx], idx)))
      .collect();

    let mut order = Vec::with_capacity(self.names.len());
    while let Some(Reverse((decl, idx))) = ready.pop() {
      order.push(self.names[decl].as_str());
      for dependent in self.unique_neighbors(idx, Direction::Outgoing) {
        if let Some(deg) = in_degree.get_mut(&dependent) {
          *deg = deg.saturating_sub(1);
          if *deg == 0 {
            ready.push(Reverse((self.graph[dependent], dependent)));
          }
        }
      }
    }

    order
  }

  /// Modules grouped into parallel waves.
  ///
  /// Every module's dependencies are in earlier waves. Within a wave modules
  /// keep declaration order.
  pub fn waves(&self) -> Vec<Vec<&str>> {
    let mut level: HashMap<NodeIndex, usize> = HashMap::new();
    for name in self.build_order() {
      let idx = self.nodes[name];
      let wave = self
        .unique_neighbors(idx, Direction::Incoming)
        .map(|dep| level[&dep] + 1)
        .max()
        .unwrap_or(0);
      level.insert(idx, wave);
    }

    let max_level = level.values().copied().max().map_or(0, |l| l + 1);
    let mut waves: Vec<Vec<&str>> = vec![Vec::new(); max_level];
    for (decl, name) in self.names.iter().enumerate() {
      let idx = self.nodes[name];
      debug_assert_eq!(self.graph[idx], decl);
      waves[level[&idx]].push(name.as_str());
    }
    waves
  }

  /// Direct dependencies of a module, in declaration order.
  pub fn dependencies(&self, name: &str) -> Result<Vec<&str>, GraphError> {
    let idx = self.index(name)?;
    Ok(self.sorted_names(self.graph.neighbors_directed(idx, Direction::Incoming)))
  }

  /// Direct dependencies of a module restricted to one scope.
  pub fn dependencies_in_scope(&self, name: &str, scope: DependencyScope) -> Result<Vec<&str>, GraphError> {
    let idx = self.index(name)?;
    Ok(
      self.sorted_names(
        self
          .graph
          .edges_directed(idx, Direction::Incoming)
          .filter(|e| *e.weight() == scope)
          .map(|e| e.source()),
      ),
    )
  }

  /// Modules that directly depend on `name`, in declaration order.
  pub fn dependents(&self, name: &str) -> Result<Vec<&str>, GraphError> {
    let idx = self.index(name)?;
    Ok(self.sorted_names(self.graph.neighbors_directed(idx, Direction::Outgoing)))
  }

  /// Does `module` transitively depend on `dependency`?
  ///
  /// A module does not depend on itself.
  pub fn depends_on(&self, module: &str, dependency: &str) -> Result<bool, GraphError> {
    let from = self.index(dependency)?;
    let to = self.index(module)?;
    if from == to {
      return Ok(false);
    }
    Ok(has_path_connecting(&self.graph, from, to, None))
  }

  /// Every module that transitively depends on `name`.
  pub fn transitive_dependents(&self, name: &str) -> Result<Vec<&str>, GraphError> {
    let start = self.index(name)?;
    let mut dfs = Dfs::new(&self.graph, start);
    let mut found = Vec::new();
    while let Some(idx) = dfs.next(&self.graph) {
      if idx != start {
        found.push(idx);
      }
    }
    Ok(self.sorted_names(found.into_iter()))
  }

  fn unique_neighbors(&self, idx: NodeIndex, dir: Direction) -> impl Iterator<Item = NodeIndex> + '_ {
    let mut seen: Vec<NodeIndex> = self.graph.neighbors_directed(idx, dir).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.into_iter()
  }

  fn direct_dependency_count(&self, idx: NodeIndex) -> usize {
    self.unique_neighbors(idx, Direction::Incoming).count()
  }
}
