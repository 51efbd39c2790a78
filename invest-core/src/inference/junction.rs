//! Cluster tree built by variable elimination, with two-pass message passing.
//!
//! The moral graph joins every factor scope into a clique: chance families,
//! decisions with their informational parents, and utility parent sets.
//! Variables are eliminated in reverse topological order (ties by insertion
//! order); eliminating `v` yields the cluster `{v} ∪ remaining neighbours(v)`,
//! whose parent is the cluster of the first-eliminated variable of its
//! separator. Cluster `i` is always eliminated before its parent, so the
//! collect pass runs over increasing indices and the distribute pass over
//! decreasing ones.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use crate::graph::{GraphModel, NodeId, NodeKind};
use crate::inference::potential::Potential;

#[derive(Debug, Clone)]
struct Cluster {
    vars: Vec<usize>,
    cards: Vec<usize>,
    separator: Vec<usize>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Elimination tree over the variables of a model.
#[derive(Debug, Clone, Default)]
pub struct ClusterTree {
    clusters: Vec<Cluster>,
    /// Elimination position of each node; `None` for utility nodes.
    position: Vec<Option<usize>>,
    elimination: Vec<NodeId>,
}

impl ClusterTree {
    pub(crate) fn build(model: &GraphModel) -> Self {
        let n = model.len();
        let is_var: Vec<bool> = model
            .node_ids()
            .map(|id| model.node(id).kind().is_variable())
            .collect();

        // Moral graph
        let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for id in model.node_ids() {
            let scope = factor_scope(model, id);
            for (i, a) in scope.iter().enumerate() {
                for b in &scope[i + 1..] {
                    adjacency[*a].insert(*b);
                    adjacency[*b].insert(*a);
                }
            }
        }

        let elimination = elimination_order(model, &is_var);
        let mut position = vec![None; n];
        for (k, id) in elimination.iter().enumerate() {
            position[id.0] = Some(k);
        }

        let mut eliminated = vec![false; n];
        let mut clusters = Vec::with_capacity(elimination.len());
        for id in &elimination {
            let v = id.0;
            let neighbours: Vec<usize> = adjacency[v]
                .iter()
                .copied()
                .filter(|u| !eliminated[*u])
                .collect();
            for (i, a) in neighbours.iter().enumerate() {
                for b in &neighbours[i + 1..] {
                    adjacency[*a].insert(*b);
                    adjacency[*b].insert(*a);
                }
            }
            eliminated[v] = true;

            let mut vars = neighbours.clone();
            vars.push(v);
            vars.sort_unstable();
            let cards = vars
                .iter()
                .map(|u| model.node(NodeId(*u)).cardinality())
                .collect();
            let parent = neighbours.iter().filter_map(|u| position[*u]).min();
            clusters.push(Cluster {
                vars,
                cards,
                separator: neighbours,
                parent,
                children: Vec::new(),
            });
        }

        for i in 0..clusters.len() {
            if let Some(p) = clusters[i].parent {
                clusters[p].children.push(i);
            }
        }

        Self {
            clusters,
            position,
            elimination,
        }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Variables in elimination order.
    pub fn elimination_order(&self) -> &[NodeId] {
        &self.elimination
    }

    /// Variables of every cluster, in cluster order.
    pub fn cluster_scopes(&self) -> Vec<Vec<usize>> {
        self.clusters.iter().map(|c| c.vars.clone()).collect()
    }

    /// Cluster holding a whole scope: the cluster of its first-eliminated variable.
    fn home(&self, scope: &[usize]) -> Option<usize> {
        scope
            .iter()
            .filter_map(|v| self.position.get(*v).copied().flatten())
            .min()
    }

    /// Multiply factors into their home clusters and run collect then distribute.
    pub(crate) fn calibrate(&self, factors: &[Potential]) -> Calibration {
        let m = self.clusters.len();
        let mut base: Vec<Potential> = self
            .clusters
            .iter()
            .map(|c| Potential::ones(&c.vars, &c.cards))
            .collect();
        let mut constant = 1.0;
        for factor in factors {
            match self.home(factor.vars()) {
                Some(h) => base[h] = base[h].product(factor),
                None => constant *= factor.total(),
            }
        }

        // Collect: child to parent, increasing index.
        let mut up: Vec<Option<Potential>> = vec![None; m];
        for i in 0..m {
            let cluster = &self.clusters[i];
            if cluster.parent.is_none() {
                continue;
            }
            let mut product = base[i].clone();
            for c in &cluster.children {
                if let Some(msg) = &up[*c] {
                    product = product.product(msg);
                }
            }
            up[i] = Some(product.marginalize(&cluster.separator));
        }

        // Distribute: parent to child, decreasing index.
        let mut down: Vec<Option<Potential>> = vec![None; m];
        for i in (0..m).rev() {
            let Some(p) = self.clusters[i].parent else {
                continue;
            };
            let mut product = base[p].clone();
            if let Some(msg) = &down[p] {
                product = product.product(msg);
            }
            for c in &self.clusters[p].children {
                if *c == i {
                    continue;
                }
                if let Some(msg) = &up[*c] {
                    product = product.product(msg);
                }
            }
            down[i] = Some(product.marginalize(&self.clusters[i].separator));
        }

        let mut root = vec![0; m];
        for i in (0..m).rev() {
            root[i] = self.clusters[i].parent.map_or(i, |p| root[p]);
        }

        let beliefs: Vec<Potential> = (0..m)
            .map(|i| {
                let mut belief = base[i].clone();
                if let Some(msg) = &down[i] {
                    belief = belief.product(msg);
                }
                for c in &self.clusters[i].children {
                    if let Some(msg) = &up[*c] {
                        belief = belief.product(msg);
                    }
                }
                belief
            })
            .collect();

        let root_totals: Vec<(usize, f64)> = (0..m)
            .filter(|i| self.clusters[*i].parent.is_none())
            .map(|r| (r, beliefs[r].total()))
            .collect();

        Calibration {
            beliefs,
            root,
            root_totals,
            constant,
        }
    }

    /// Normalized joint of a factor scope from a calibration, laid out in the
    /// given order. `None` when the scope's component has zero mass or the
    /// scope is not contained in one cluster.
    pub(crate) fn joint(&self, calibration: &Calibration, layout: &[usize]) -> Option<Vec<f64>> {
        if layout.is_empty() {
            return Some(vec![1.0]);
        }
        let h = self.home(layout)?;
        let belief = &calibration.beliefs[h];
        if layout.iter().any(|v| belief.card_of(*v).is_none()) {
            return None;
        }
        let total = calibration.component_total(h);
        if total <= 0.0 {
            return None;
        }
        let mut marginal = belief.marginalize(layout);
        marginal.scale(1.0 / total);
        Some(marginal.to_layout(layout))
    }
}

/// Scope of the factor contributed by a node.
pub(crate) fn factor_scope(model: &GraphModel, id: NodeId) -> Vec<usize> {
    let mut scope: Vec<usize> = model.parents(id).iter().map(|p| p.0).collect();
    if model.node(id).kind() != NodeKind::Utility {
        scope.push(id.0);
    }
    scope
}

/// Reverse topological order over variables: repeatedly remove a variable
/// with no remaining variable children, preferring the earliest inserted.
fn elimination_order(model: &GraphModel, is_var: &[bool]) -> Vec<NodeId> {
    let mut pending_children: Vec<usize> = model
        .node_ids()
        .map(|id| {
            model
                .children(id)
                .iter()
                .filter(|c| is_var[c.0])
                .count()
        })
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = model
        .node_ids()
        .filter(|id| is_var[id.0] && pending_children[id.0] == 0)
        .map(|id| Reverse(id.0))
        .collect();

    let mut order = Vec::new();
    while let Some(Reverse(v)) = ready.pop() {
        order.push(NodeId(v));
        for p in model.parents(NodeId(v)) {
            pending_children[p.0] -= 1;
            if pending_children[p.0] == 0 {
                ready.push(Reverse(p.0));
            }
        }
    }
    order
}

/// Calibrated cluster beliefs.
#[derive(Debug, Clone)]
pub(crate) struct Calibration {
    beliefs: Vec<Potential>,
    root: Vec<usize>,
    root_totals: Vec<(usize, f64)>,
    constant: f64,
}

impl Calibration {
    fn component_total(&self, cluster: usize) -> f64 {
        let r = self.root[cluster];
        self.root_totals
            .iter()
            .find(|(root, _)| *root == r)
            .map_or(0.0, |(_, t)| *t)
    }

    /// Probability of the entered evidence.
    pub(crate) fn evidence_probability(&self) -> f64 {
        self.root_totals
            .iter()
            .fold(self.constant, |acc, (_, t)| acc * t)
    }

    /// Natural log of the evidence probability, summed per component.
    pub(crate) fn log_evidence(&self) -> f64 {
        self.root_totals
            .iter()
            .fold(self.constant.ln(), |acc, (_, t)| acc + t.ln())
    }

    pub(crate) fn is_impossible(&self) -> bool {
        self.constant <= 0.0 || self.root_totals.iter().any(|(_, t)| *t <= 0.0)
    }
}
