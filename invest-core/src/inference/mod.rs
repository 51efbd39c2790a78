//! Exact evaluation of influence diagrams.
//!
//! Decisions are solved by backward induction over the cluster tree of the
//! model: each decision, latest first, gets a policy mapping every parent
//! configuration compatible with the evidence to the label of highest expected
//! utility, with later decisions following their policies and earlier ones
//! uniform. The target decision is then scored label by label.

pub mod evidence;
pub mod junction;
pub mod potential;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::graph::{configurations, decode_config, GraphModel, NodeId, NodeKind};

pub use evidence::{Evidence, Finding};
pub use junction::ClusterTree;
pub use potential::Potential;

use evidence::Resolved;
use junction::{factor_scope, Calibration};

/// Labels whose expected utility is within this margin of the best are ties;
/// the lowest domain index wins.
pub const TIE_EPSILON: f64 = 1e-9;

/// Outcome of evaluating the target decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Name of the target decision node
    pub decision: String,
    /// Chosen label
    pub label: String,
    /// Domain index of the chosen label
    pub index: usize,
    /// Domain of the target decision
    pub labels: Vec<String>,
    /// Expected utility of each label; `-inf` where the label makes the evidence impossible
    pub utility_by_label: Vec<f64>,
}

impl Evaluation {
    /// Expected utility of the chosen label.
    pub fn expected_utility(&self) -> f64 {
        self.utility_by_label[self.index]
    }
}

/// Policy of one decision during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Policy {
    /// Not yet solved
    Uniform,
    /// Fixed by evidence
    Fixed(usize),
    /// Chosen label per parent configuration (last parent fastest)
    Rule(Vec<usize>),
}

/// Index of the best value; ties within [`TIE_EPSILON`] go to the lowest index.
pub fn argmax_lowest(values: &[f64]) -> usize {
    let best = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .position(|v| *v >= best - TIE_EPSILON)
        .unwrap_or(0)
}

/// Evaluate the target decision of `model` under `evidence`.
pub fn evaluate(model: &GraphModel, evidence: &Evidence) -> Result<Evaluation> {
    let target = model
        .target_decision()
        .ok_or_else(|| Error::structural(format!("{} has no decision node", model.name())))?;
    let ctx = Context::new(model, evidence)?;
    if ctx.fixed.contains_key(&target) {
        return Err(Error::evidence(format!(
            "target decision {} cannot be observed",
            model.node(target).name()
        )));
    }

    let policies = ctx.solve_policies();
    let card = model.node(target).cardinality();
    let utility_by_label: Vec<f64> = (0..card)
        .map(|label| {
            ctx.expected_utility(&policies, Some((target, label)), &[])
                .unwrap_or(f64::NEG_INFINITY)
        })
        .collect();

    if utility_by_label.iter().all(|u| *u == f64::NEG_INFINITY) {
        return Err(Error::evidence(format!(
            "evidence has zero probability in {}",
            model.name()
        )));
    }

    let index = argmax_lowest(&utility_by_label);
    let node = model.node(target);
    let labels = node.domain().labels().to_vec();
    let label = labels[index].clone();
    tracing::debug!(
        model = %model.name(),
        decision = %node.name(),
        label = %label,
        utilities = ?utility_by_label,
        "Evaluated decision"
    );

    Ok(Evaluation {
        decision: node.name().to_string(),
        label,
        index,
        labels,
        utility_by_label,
    })
}

/// Posterior marginal of a chance or decision node, with every decision
/// following its solved policy. Evidence on any decision, the target
/// included, fixes it.
pub fn posterior(model: &GraphModel, evidence: &Evidence, node: &str) -> Result<Vec<f64>> {
    let id = model
        .node_id(node)
        .ok_or_else(|| Error::structural(format!("unknown node {node}")))?;
    if model.node(id).kind() == NodeKind::Utility {
        return Err(Error::structural(format!("utility node {node} has no posterior")));
    }
    let ctx = Context::new(model, evidence)?;
    let policies = ctx.solve_policies();
    let calibration = ctx.calibrate(&policies, None, &[]);
    if calibration.is_impossible() {
        return Err(Error::evidence(format!(
            "evidence has zero probability in {}",
            model.name()
        )));
    }
    model
        .cluster_tree()
        .joint(&calibration, &[id.0])
        .ok_or_else(|| Error::evidence(format!("no posterior for {node}")))
}

/// Solved policy of every decision under `evidence`.
pub fn solve_policies(model: &GraphModel, evidence: &Evidence) -> Result<HashMap<NodeId, Policy>> {
    let ctx = Context::new(model, evidence)?;
    Ok(ctx.solve_policies())
}

// ============================================================================
// Evaluation context
// ============================================================================

/// Factors that do not depend on decision policies, plus resolved evidence.
struct Context<'a> {
    model: &'a GraphModel,
    static_factors: Vec<Potential>,
    hard: HashMap<NodeId, usize>,
    fixed: HashMap<NodeId, usize>,
}

impl<'a> Context<'a> {
    fn new(model: &'a GraphModel, evidence: &Evidence) -> Result<Self> {
        let mut static_factors = chance_factors(model);
        let mut hard = HashMap::new();
        let mut fixed = HashMap::new();

        for (id, finding) in evidence::resolve(model, evidence)? {
            let node = model.node(id);
            match (node.kind(), finding) {
                (NodeKind::Decision, Resolved::Hard(state)) => {
                    fixed.insert(id, state);
                    hard.insert(id, state);
                }
                (_, Resolved::Hard(state)) => {
                    static_factors.push(Potential::indicator(id.0, node.cardinality(), state));
                    hard.insert(id, state);
                }
                (_, Resolved::Soft(weights)) => {
                    static_factors.push(Potential::likelihood(id.0, &weights));
                }
            }
        }

        Ok(Self {
            model,
            static_factors,
            hard,
            fixed,
        })
    }

    fn decision_factor(&self, id: NodeId, policy: &Policy) -> Potential {
        let card = self.model.node(id).cardinality();
        match policy {
            Policy::Uniform => Potential::uniform(id.0, card),
            Policy::Fixed(state) => Potential::indicator(id.0, card, *state),
            Policy::Rule(choices) => {
                let mut layout: Vec<usize> = self.model.parents(id).iter().map(|p| p.0).collect();
                layout.push(id.0);
                let mut cards = self.model.parent_cards(id);
                cards.push(card);
                let mut values = vec![0.0; choices.len() * card];
                for (row, choice) in choices.iter().enumerate() {
                    values[row * card + choice] = 1.0;
                }
                Potential::from_layout(&layout, &cards, &values)
            }
        }
    }

    fn calibrate(
        &self,
        policies: &HashMap<NodeId, Policy>,
        clamp: Option<(NodeId, usize)>,
        extra: &[Potential],
    ) -> Calibration {
        let mut factors = self.static_factors.clone();
        for id in self.model.decision_nodes() {
            let factor = match clamp {
                Some((clamped, state)) if clamped == id => {
                    Potential::indicator(id.0, self.model.node(id).cardinality(), state)
                }
                _ => self.decision_factor(id, policies.get(&id).unwrap_or(&Policy::Uniform)),
            };
            factors.push(factor);
        }
        factors.extend_from_slice(extra);
        self.model.cluster_tree().calibrate(&factors)
    }

    /// Sum of expected utilities, or `None` when the evidence is impossible.
    fn expected_utility(
        &self,
        policies: &HashMap<NodeId, Policy>,
        clamp: Option<(NodeId, usize)>,
        extra: &[Potential],
    ) -> Option<f64> {
        let calibration = self.calibrate(policies, clamp, extra);
        if calibration.is_impossible() {
            return None;
        }
        let tree = self.model.cluster_tree();
        let mut total = 0.0;
        for u in self.model.utility_nodes() {
            let table = self.model.utility(u)?;
            let scope = factor_scope(self.model, u);
            let joint = tree.joint(&calibration, &scope)?;
            total += joint.iter().zip(table).map(|(p, v)| p * v).sum::<f64>();
        }
        Some(total)
    }

    /// Backward induction over decisions, latest first.
    fn solve_policies(&self) -> HashMap<NodeId, Policy> {
        let mut policies: HashMap<NodeId, Policy> = self
            .fixed
            .iter()
            .map(|(id, state)| (*id, Policy::Fixed(*state)))
            .collect();

        let order: Vec<NodeId> = self
            .model
            .topological_order()
            .iter()
            .rev()
            .copied()
            .filter(|id| self.model.node(*id).kind() == NodeKind::Decision)
            .collect();

        for d in order {
            if self.fixed.contains_key(&d) {
                continue;
            }
            let parents = self.model.parents(d).to_vec();
            let cards = self.model.parent_cards(d);
            let card = self.model.node(d).cardinality();
            let rows = configurations(&cards);
            let mut rule = vec![0; rows];

            for (row, choice) in rule.iter_mut().enumerate() {
                let states = decode_config(row, &cards);
                let compatible = parents
                    .iter()
                    .zip(&states)
                    .all(|(p, s)| self.hard.get(p).map_or(true, |h| h == s));
                if !compatible {
                    continue;
                }
                let extra: Vec<Potential> = parents
                    .iter()
                    .zip(&states)
                    .zip(&cards)
                    .map(|((p, s), c)| Potential::indicator(p.0, *c, *s))
                    .collect();
                let utilities: Vec<f64> = (0..card)
                    .map(|label| {
                        self.expected_utility(&policies, Some((d, label)), &extra)
                            .unwrap_or(f64::NEG_INFINITY)
                    })
                    .collect();
                *choice = argmax_lowest(&utilities);
            }

            tracing::trace!(
                model = %self.model.name(),
                decision = %self.model.node(d).name(),
                rule = ?rule,
                "Solved policy"
            );
            policies.insert(d, Policy::Rule(rule));
        }
        policies
    }
}

/// One factor per chance node, built from its CPT.
pub(crate) fn chance_factors(model: &GraphModel) -> Vec<Potential> {
    model
        .chance_nodes()
        .into_iter()
        .map(|id| family_factor(model, id, model.cpt(id).unwrap_or_default()))
        .collect()
}

/// Factor over a chance node's family from a CPT laid out parents-then-child.
pub(crate) fn family_factor(model: &GraphModel, id: NodeId, table: &[f64]) -> Potential {
    let layout = factor_scope(model, id);
    let mut cards = model.parent_cards(id);
    cards.push(model.node(id).cardinality());
    Potential::from_layout(&layout, &cards, table)
}
