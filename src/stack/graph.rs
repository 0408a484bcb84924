// ABOUTME: Service dependency resolution using Kahn's algorithm.
// ABOUTME: Produces a start order where dependencies come first; stop order is its reverse.

use std::collections::{HashMap, VecDeque};

/// The dependency graph contains a cycle. Lists every service that could not
/// be ordered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dependency cycle among services: {}", .unresolved.join(", "))]
pub struct CycleError {
    pub unresolved: Vec<String>,
}

/// Directed graph of services and the services they depend on.
#[derive(Debug, Clone, Default)]
pub struct ServiceGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    /// For each node, the nodes that depend on it.
    dependents: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl ServiceGraph {
    /// Build a graph from `(service, dependencies)` pairs.
    ///
    /// Declared services keep their given order; dependencies that are never
    /// declared become nodes too, in the order they are first seen.
    pub fn new<I, S, D>(services: I) -> Self
    where
        I: IntoIterator<Item = (S, D)>,
        S: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let services: Vec<(String, Vec<String>)> = services
            .into_iter()
            .map(|(name, deps)| (name.into(), deps.into_iter().map(Into::into).collect()))
            .collect();

        let mut graph = Self::default();
        for (name, _) in &services {
            graph.node(name);
        }
        for (_, deps) in &services {
            for dep in deps {
                graph.node(dep);
            }
        }

        for (name, deps) in &services {
            let to = graph.index[name.as_str()];
            let mut seen = Vec::with_capacity(deps.len());
            for dep in deps {
                let from = graph.index[dep.as_str()];
                if seen.contains(&from) {
                    continue;
                }
                seen.push(from);
                graph.dependents[from].push(to);
                graph.in_degree[to] += 1;
            }
        }

        graph
    }

    fn node(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(name.to_string());
        self.index.insert(name.to_string(), i);
        self.dependents.push(Vec::new());
        self.in_degree.push(0);
        i
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Order in which services can be started: every service after all of
    /// its dependencies.
    pub fn start_order(&self) -> Result<Vec<String>, CycleError> {
        let mut in_degree = self.in_degree.clone();
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &next in &self.dependents[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let unresolved = (0..self.nodes.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].clone())
                .collect();
            return Err(CycleError { unresolved });
        }

        Ok(order.into_iter().map(|i| self.nodes[i].clone()).collect())
    }

    /// Reverse of [`start_order`](Self::start_order).
    pub fn stop_order(&self) -> Result<Vec<String>, CycleError> {
        let mut order = self.start_order()?;
        order.reverse();
        Ok(order)
    }
}
