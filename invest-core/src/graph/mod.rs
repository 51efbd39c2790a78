//! Influence-diagram model.
//!
//! A [`GraphModelBuilder`] collects nodes, arcs, CPTs and utility tables and
//! checks every contract as it goes. [`GraphModelBuilder::build`] freezes the
//! topology into a [`GraphModel`]: after that only CPT contents can change.

pub mod node;
pub mod table;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use invest_common::util::{normalize_token, tokens_match};

use crate::error::{Error, Result};
use crate::inference::junction::ClusterTree;
use crate::learning::CptSet;

pub use node::{Domain, Node, NodeId, NodeKind};
pub use table::{config_index, configurations, decode_config, ROW_TOLERANCE};

// ============================================================================
// Builder
// ============================================================================

/// Incremental constructor for a [`GraphModel`].
#[derive(Debug, Clone)]
pub struct GraphModelBuilder {
    name: String,
    graph: DiGraph<Node, ()>,
    parents: Vec<Vec<NodeId>>,
    tables: Vec<Option<Vec<f64>>>,
    by_name: HashMap<String, NodeId>,
    target: Option<NodeId>,
}

impl GraphModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: DiGraph::new(),
            parents: Vec::new(),
            tables: Vec::new(),
            by_name: HashMap::new(),
            target: None,
        }
    }

    /// Add a node. Chance and decision nodes need at least one label; utility
    /// nodes take none.
    pub fn add_node<S: AsRef<str>>(
        &mut self,
        name: &str,
        kind: NodeKind,
        labels: &[S],
    ) -> Result<NodeId> {
        let key = normalize_token(name);
        if key.is_empty() {
            return Err(Error::structural("node name must not be empty"));
        }
        if self.by_name.contains_key(&key) {
            return Err(Error::structural(format!("duplicate node {name}")));
        }
        match kind {
            NodeKind::Utility if !labels.is_empty() => {
                return Err(Error::structural(format!(
                    "utility node {name} cannot declare labels"
                )));
            }
            NodeKind::Chance | NodeKind::Decision if labels.is_empty() => {
                return Err(Error::structural(format!("{kind} node {name} has no labels")));
            }
            _ => {}
        }
        let domain = Domain::new(labels);
        for (i, label) in domain.labels().iter().enumerate() {
            if domain.index_of(label) != Some(i) {
                return Err(Error::structural(format!(
                    "{name}: label {label} is not distinct"
                )));
            }
        }

        let id = NodeId(self.graph.node_count());
        self.graph.add_node(Node {
            name: name.to_string(),
            kind,
            domain,
        });
        self.parents.push(Vec::new());
        self.tables.push(None);
        self.by_name.insert(key, id);
        Ok(id)
    }

    pub fn add_chance<S: AsRef<str>>(&mut self, name: &str, labels: &[S]) -> Result<NodeId> {
        self.add_node(name, NodeKind::Chance, labels)
    }

    pub fn add_decision<S: AsRef<str>>(&mut self, name: &str, labels: &[S]) -> Result<NodeId> {
        self.add_node(name, NodeKind::Decision, labels)
    }

    pub fn add_utility(&mut self, name: &str) -> Result<NodeId> {
        self.add_node::<&str>(name, NodeKind::Utility, &[])
    }

    /// Declare `alias` as an alternate spelling of `label` on `node`.
    pub fn add_alias(&mut self, node: &str, label: &str, alias: &str) -> Result<()> {
        let id = self.lookup(node)?;
        let domain = &mut self.graph[NodeIndex::new(id.0)].domain;
        let index = domain
            .labels()
            .iter()
            .position(|l| tokens_match(l, label))
            .ok_or_else(|| Error::structural(format!("{node} has no label {label}")))?;
        if let Some(existing) = domain.index_of(alias) {
            if existing != index {
                return Err(Error::structural(format!(
                    "{node}: alias {alias} already names label {existing}"
                )));
            }
            return Ok(());
        }
        domain.push_alias(index, alias);
        Ok(())
    }

    /// Add `tail → head`. Parent order of `head` follows insertion order.
    pub fn add_arc(&mut self, tail: &str, head: &str) -> Result<()> {
        let t = self.lookup(tail)?;
        let h = self.lookup(head)?;
        if t == h {
            return Err(Error::structural(format!("self-loop on {tail}")));
        }
        let (ti, hi) = (NodeIndex::new(t.0), NodeIndex::new(h.0));
        if self.graph[ti].kind == NodeKind::Utility {
            return Err(Error::structural(format!(
                "arc {tail} -> {head} leaves utility node {tail}"
            )));
        }
        if self.graph.find_edge(ti, hi).is_some() {
            return Err(Error::structural(format!("duplicate arc {tail} -> {head}")));
        }
        if has_path_connecting(&self.graph, hi, ti, None) {
            return Err(Error::structural(format!(
                "arc {tail} -> {head} would create a cycle"
            )));
        }
        self.graph.add_edge(ti, hi, ());
        self.parents[h.0].push(t);
        Ok(())
    }

    /// Install the CPT of a chance node (rows per parent configuration, last
    /// parent fastest).
    pub fn set_cpt(&mut self, node: &str, values: Vec<f64>) -> Result<()> {
        let id = self.lookup(node)?;
        let kind = self.graph[NodeIndex::new(id.0)].kind;
        if kind != NodeKind::Chance {
            return Err(Error::structural(format!(
                "{node} is a {kind} node and takes no CPT"
            )));
        }
        self.check_cpt(id, &values)?;
        self.tables[id.0] = Some(values);
        Ok(())
    }

    /// Install the utility table of a utility node.
    pub fn set_utility(&mut self, node: &str, values: Vec<f64>) -> Result<()> {
        let id = self.lookup(node)?;
        let kind = self.graph[NodeIndex::new(id.0)].kind;
        if kind != NodeKind::Utility {
            return Err(Error::structural(format!(
                "{node} is a {kind} node and takes no utility table"
            )));
        }
        let rows = configurations(&self.parent_cards(id));
        table::validate_utility(node, &values, rows)?;
        self.tables[id.0] = Some(values);
        Ok(())
    }

    /// Choose the decision reported by evaluation. Defaults to the last
    /// decision added.
    pub fn set_target_decision(&mut self, node: &str) -> Result<()> {
        let id = self.lookup(node)?;
        if self.graph[NodeIndex::new(id.0)].kind != NodeKind::Decision {
            return Err(Error::structural(format!("{node} is not a decision node")));
        }
        self.target = Some(id);
        Ok(())
    }

    /// Freeze the topology and precompute the cluster tree.
    pub fn build(self) -> Result<GraphModel> {
        let mut tables = Vec::with_capacity(self.tables.len());
        for (i, table) in self.tables.into_iter().enumerate() {
            let node = &self.graph[NodeIndex::new(i)];
            let id = NodeId(i);
            let cards: Vec<usize> = self.parents[i]
                .iter()
                .map(|p| self.graph[NodeIndex::new(p.0)].cardinality())
                .collect();
            let rows = configurations(&cards);
            match (node.kind, table) {
                (NodeKind::Chance, Some(values)) => {
                    table::validate_cpt(&node.name, &values, node.cardinality(), rows)?;
                    tables.push(values);
                }
                (NodeKind::Utility, Some(values)) => {
                    table::validate_utility(&node.name, &values, rows)?;
                    tables.push(values);
                }
                (NodeKind::Decision, _) => tables.push(Vec::new()),
                (kind, None) => {
                    return Err(Error::structural(format!(
                        "{kind} node {} ({id}) has no table",
                        node.name
                    )));
                }
            }
        }

        let target = self.target.or_else(|| {
            self.graph
                .node_indices()
                .filter(|i| self.graph[*i].kind == NodeKind::Decision)
                .last()
                .map(|i| NodeId(i.index()))
        });

        let topological = topological_order(&self.graph);
        let mut model = GraphModel {
            name: self.name,
            graph: self.graph,
            parents: self.parents,
            tables,
            by_name: self.by_name,
            topological,
            target,
            tree: ClusterTree::default(),
        };
        model.tree = ClusterTree::build(&model);
        tracing::debug!(
            model = %model.name,
            nodes = model.len(),
            clusters = model.tree.len(),
            "Built decision network"
        );
        Ok(model)
    }

    fn lookup(&self, name: &str) -> Result<NodeId> {
        self.by_name
            .get(&normalize_token(name))
            .copied()
            .ok_or_else(|| Error::structural(format!("unknown node {name}")))
    }

    fn parent_cards(&self, id: NodeId) -> Vec<usize> {
        self.parents[id.0]
            .iter()
            .map(|p| self.graph[NodeIndex::new(p.0)].cardinality())
            .collect()
    }

    fn check_cpt(&self, id: NodeId, values: &[f64]) -> Result<()> {
        let node = &self.graph[NodeIndex::new(id.0)];
        let rows = configurations(&self.parent_cards(id));
        table::validate_cpt(&node.name, values, node.cardinality(), rows)
    }
}

/// Kahn's algorithm, always releasing the ready node inserted first.
fn topological_order(graph: &DiGraph<Node, ()>) -> Vec<NodeId> {
    let mut indegree: Vec<usize> = graph
        .node_indices()
        .map(|i| graph.neighbors_directed(i, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(indegree.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(NodeId(i));
        for child in graph.neighbors_directed(NodeIndex::new(i), Direction::Outgoing) {
            let c = child.index();
            indegree[c] -= 1;
            if indegree[c] == 0 {
                ready.push(Reverse(c));
            }
        }
    }
    order
}

// ============================================================================
// Built model
// ============================================================================

/// A built influence diagram. Topology is fixed; CPT contents can be replaced.
#[derive(Debug, Clone)]
pub struct GraphModel {
    name: String,
    graph: DiGraph<Node, ()>,
    parents: Vec<Vec<NodeId>>,
    tables: Vec<Vec<f64>>,
    by_name: HashMap<String, NodeId>,
    topological: Vec<NodeId>,
    target: Option<NodeId>,
    tree: ClusterTree,
}

impl GraphModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.graph[NodeIndex::new(id.0)]
    }

    /// Look a node up by name, case-insensitively.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(&normalize_token(name)).copied()
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices().map(|i| NodeId(i.index()))
    }

    /// Parents in arc-insertion order.
    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.parents[id.0]
    }

    /// Children in insertion order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self
            .graph
            .neighbors_directed(NodeIndex::new(id.0), Direction::Outgoing)
            .map(|i| NodeId(i.index()))
            .collect();
        children.sort();
        children
    }

    /// Topological order, ties broken by insertion order.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.topological
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.node_ids().filter(|id| self.node(*id).kind == kind).collect()
    }

    pub fn decision_nodes(&self) -> Vec<NodeId> {
        self.nodes_of_kind(NodeKind::Decision)
    }

    pub fn chance_nodes(&self) -> Vec<NodeId> {
        self.nodes_of_kind(NodeKind::Chance)
    }

    pub fn utility_nodes(&self) -> Vec<NodeId> {
        self.nodes_of_kind(NodeKind::Utility)
    }

    /// The decision reported by evaluation.
    pub fn target_decision(&self) -> Option<NodeId> {
        self.target
    }

    /// Cardinalities of a node's parents, in parent order.
    pub fn parent_cards(&self, id: NodeId) -> Vec<usize> {
        self.parents[id.0]
            .iter()
            .map(|p| self.node(*p).cardinality())
            .collect()
    }

    /// CPT of a chance node.
    pub fn cpt(&self, id: NodeId) -> Option<&[f64]> {
        (self.node(id).kind == NodeKind::Chance).then(|| self.tables[id.0].as_slice())
    }

    /// CPT of a chance node, by name.
    pub fn cpt_by_name(&self, name: &str) -> Option<&[f64]> {
        self.node_id(name).and_then(|id| self.cpt(id))
    }

    /// Utility table of a utility node.
    pub fn utility(&self, id: NodeId) -> Option<&[f64]> {
        (self.node(id).kind == NodeKind::Utility).then(|| self.tables[id.0].as_slice())
    }

    /// Replace the CPT of a chance node.
    pub fn set_cpt(&mut self, node: &str, values: Vec<f64>) -> Result<()> {
        let id = self
            .node_id(node)
            .ok_or_else(|| Error::structural(format!("unknown node {node}")))?;
        self.check_cpt(id, &values)?;
        self.tables[id.0] = values;
        Ok(())
    }

    /// Install every table of a learned set whose name matches a chance node.
    ///
    /// All tables are validated before any is installed. Returns the number
    /// of CPTs replaced.
    pub fn apply_cpts(&mut self, set: &CptSet) -> Result<usize> {
        let mut staged = Vec::new();
        for (name, values) in set.iter() {
            let Some(id) = self.node_id(name) else {
                tracing::debug!(model = %self.name, node = %name, "Learned CPT has no matching node");
                continue;
            };
            if self.node(id).kind != NodeKind::Chance {
                continue;
            }
            self.check_cpt(id, values)?;
            staged.push((id, values.to_vec()));
        }

        let replaced = staged.len();
        for (id, values) in staged {
            self.tables[id.0] = values;
        }
        Ok(replaced)
    }

    pub(crate) fn cluster_tree(&self) -> &ClusterTree {
        &self.tree
    }

    fn check_cpt(&self, id: NodeId, values: &[f64]) -> Result<()> {
        let node = self.node(id);
        if node.kind != NodeKind::Chance {
            return Err(Error::structural(format!(
                "{} is a {} node and takes no CPT",
                node.name, node.kind
            )));
        }
        let rows = configurations(&self.parent_cards(id));
        table::validate_cpt(&node.name, values, node.cardinality(), rows)
    }
}
