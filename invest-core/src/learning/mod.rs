//! Parameter learning: re-estimate chance-node CPTs from historical
//! observations.
//!
//! Columns are matched to chance nodes by name. When every learned family is
//! observed in every row the estimate is closed form; otherwise EM runs over
//! the model's cluster tree, with unmatched chance nodes and decisions latent
//! (decisions as uniform random variables). The scoring criterion enters the
//! estimate as an extra pseudo-count per CPT cell.

pub mod observations;
pub mod sampling;
pub mod scoring;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use invest_common::config::{LearningConfig, ScoringMethod};
use invest_common::util::format_distribution;

use crate::error::{InferenceNonConvergence, LearningDataError, Result};
use crate::graph::{config_index, configurations, GraphModel, NodeId, NodeKind};
use crate::inference::junction::factor_scope;
use crate::inference::{family_factor, Potential};

pub use observations::ObservationTable;
pub use sampling::forward_sample;
pub use scoring::{cpt_kl_divergence, free_parameters, penalty_per_parameter, pseudo_count};

// ============================================================================
// Outcome types
// ============================================================================

/// Summary of a learning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningReport {
    /// Model the estimate was computed for
    pub model: String,
    pub scoring: ScoringMethod,
    /// Rows kept after filtering
    pub rows: usize,
    /// Distinct row patterns
    pub patterns: usize,
    /// Nodes whose CPT was re-estimated
    pub learned: Vec<String>,
    /// Whether the estimate came from direct counting
    pub closed_form: bool,
    /// EM iterations run (0 for closed form)
    pub iterations: usize,
    /// Data log-likelihood of the returned estimate
    pub log_likelihood: f64,
    pub free_parameters: usize,
    pub penalty_per_parameter: f64,
    /// `log_likelihood − penalty_per_parameter × free_parameters`
    pub score: f64,
}

/// Learned CPTs keyed by node name, laid out like the model's tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CptSet {
    tables: BTreeMap<String, Vec<f64>>,
    pub report: LearningReport,
    /// Set when EM stopped at its iteration cap
    pub non_convergence: Option<InferenceNonConvergence>,
}

impl CptSet {
    pub fn get(&self, node: &str) -> Option<&[f64]> {
        self.tables.get(node).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn converged(&self) -> bool {
        self.non_convergence.is_none()
    }
}

/// Result of a learning run.
#[derive(Debug, Clone, PartialEq)]
pub enum LearnOutcome {
    /// Replacement CPTs for the learned nodes
    Learned(CptSet),
    /// Nothing usable; keep the prior CPTs
    NoOp(LearningDataError),
}

impl LearnOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp(_))
    }

    pub fn cpts(&self) -> Option<&CptSet> {
        match self {
            Self::Learned(set) => Some(set),
            Self::NoOp(_) => None,
        }
    }
}

// ============================================================================
// Learner
// ============================================================================

/// Observations reduced to weighted patterns over the matched nodes.
struct Patterns {
    nodes: Vec<NodeId>,
    rows: Vec<(Vec<Option<usize>>, f64)>,
    total: usize,
}

impl Patterns {
    fn slot(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| *n == id)
    }
}

/// CPT re-estimation with a configurable scoring criterion.
#[derive(Debug, Clone, Default)]
pub struct ParameterLearner {
    config: LearningConfig,
}

impl ParameterLearner {
    pub fn new(config: LearningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Learn CPTs for the chance nodes of `model` named by the table's columns.
    pub fn learn(
        &self,
        observations: &ObservationTable,
        model: &GraphModel,
        scoring: ScoringMethod,
    ) -> Result<LearnOutcome> {
        let span = invest_common::learning_span!(model.name(), scoring);
        let _enter = span.enter();

        let patterns = match collect_patterns(observations, model) {
            Ok(p) => p,
            Err(reason) => {
                tracing::warn!(model = %model.name(), reason = %reason, "Learning skipped, keeping prior CPTs");
                return Ok(LearnOutcome::NoOp(reason));
            }
        };

        let n = patterns.total as f64;
        let pseudo = pseudo_count(&self.config, scoring, n);
        let learned = patterns.nodes.clone();
        let mut tables: Vec<Vec<f64>> = model
            .node_ids()
            .map(|id| model.cpt(id).map(<[f64]>::to_vec).unwrap_or_default())
            .collect();

        let closed_form = learned.iter().all(|v| {
            factor_scope(model, *v).iter().all(|u| {
                patterns
                    .slot(NodeId(*u))
                    .map_or(false, |s| patterns.rows.iter().all(|(p, _)| p[s].is_some()))
            })
        });

        let mut non_convergence = None;
        let (log_likelihood, iterations) = if closed_form {
            let counts = count_families(model, &patterns, &learned);
            for (v, c) in learned.iter().zip(&counts) {
                tables[v.0] = m_step(c, model.node(*v).cardinality(), pseudo);
            }
            let (ll, _) = e_step(model, &tables, &patterns, &[]);
            (ll, 0)
        } else {
            let mut best: Option<(f64, Vec<Vec<f64>>)> = None;
            let mut previous: Option<f64> = None;
            let mut last_delta = f64::INFINITY;
            let mut converged = None;

            for iteration in 1..=self.config.max_iterations {
                let (ll, expected) = e_step(model, &tables, &patterns, &learned);
                if best.as_ref().map_or(true, |(b, _)| ll > *b) {
                    best = Some((ll, learned.iter().map(|v| tables[v.0].clone()).collect()));
                }
                if let Some(prev) = previous {
                    last_delta = (ll - prev).abs();
                    if last_delta < self.config.tolerance {
                        converged = Some((ll, iteration));
                        break;
                    }
                }
                previous = Some(ll);
                for (v, e) in learned.iter().zip(&expected) {
                    tables[v.0] = m_step(e, model.node(*v).cardinality(), pseudo);
                }
            }

            match (converged, best) {
                (Some(done), _) => done,
                (None, Some((ll, estimate))) => {
                    for (v, t) in learned.iter().zip(estimate) {
                        tables[v.0] = t;
                    }
                    let marker = InferenceNonConvergence {
                        iterations: self.config.max_iterations,
                        last_delta,
                        best_log_likelihood: ll,
                    };
                    tracing::warn!(model = %model.name(), "{marker}");
                    non_convergence = Some(marker);
                    (ll, self.config.max_iterations)
                }
                (None, None) => {
                    let (ll, _) = e_step(model, &tables, &patterns, &[]);
                    (ll, 0)
                }
            }
        };

        let k = free_parameters(model, &learned);
        let penalty = penalty_per_parameter(scoring, n);
        let report = LearningReport {
            model: model.name().to_string(),
            scoring,
            rows: patterns.total,
            patterns: patterns.rows.len(),
            learned: learned
                .iter()
                .map(|v| model.node(*v).name().to_string())
                .collect(),
            closed_form,
            iterations,
            log_likelihood,
            free_parameters: k,
            penalty_per_parameter: penalty,
            score: log_likelihood - penalty * k as f64,
        };

        tracing::info!(
            model = %report.model,
            scoring = %scoring,
            rows = report.rows,
            learned = ?report.learned,
            closed_form = report.closed_form,
            iterations = report.iterations,
            log_likelihood = report.log_likelihood,
            score = report.score,
            "Learned CPTs"
        );

        for v in &learned {
            tracing::debug!(
                node = %model.node(*v).name(),
                cpt = %format_distribution(&tables[v.0]),
                "Learned table"
            );
        }

        let tables = learned
            .iter()
            .map(|v| (model.node(*v).name().to_string(), tables[v.0].clone()))
            .collect();
        Ok(LearnOutcome::Learned(CptSet {
            tables,
            report,
            non_convergence,
        }))
    }

    /// Learn and install the result. Returns the number of CPTs replaced.
    pub fn refresh(
        &self,
        observations: &ObservationTable,
        model: &mut GraphModel,
        scoring: ScoringMethod,
    ) -> Result<usize> {
        match self.learn(observations, model, scoring)? {
            LearnOutcome::Learned(set) => model.apply_cpts(&set),
            LearnOutcome::NoOp(_) => Ok(0),
        }
    }
}

/// Match columns to chance nodes, map cells into domains, drop empty rows,
/// and merge identical rows.
fn collect_patterns(
    observations: &ObservationTable,
    model: &GraphModel,
) -> std::result::Result<Patterns, LearningDataError> {
    let mut columns: Vec<(usize, NodeId)> = Vec::new();
    for (c, name) in observations.columns().iter().enumerate() {
        match model.node_id(name) {
            Some(id)
                if model.node(id).kind() == NodeKind::Chance
                    && !columns.iter().any(|(_, seen)| *seen == id) =>
            {
                columns.push((c, id));
            }
            _ => tracing::debug!(model = %model.name(), column = %name, "Ignoring column"),
        }
    }
    if columns.is_empty() {
        return Err(LearningDataError::new(format!(
            "no column matches a chance node of {}",
            model.name()
        )));
    }

    let mut out_of_domain = 0;
    let states: Vec<Vec<Option<usize>>> = observations
        .rows()
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|(c, id)| {
                    let state = row[*c]
                        .as_deref()
                        .and_then(|v| model.node(*id).domain().index_of(v));
                    if state.is_none() && row[*c].is_some() {
                        out_of_domain += 1;
                    }
                    state
                })
                .collect()
        })
        .collect();
    if out_of_domain > 0 {
        tracing::debug!(model = %model.name(), cells = out_of_domain, "Out-of-domain cells treated as missing");
    }

    // A column with no usable cell carries nothing to learn from.
    let keep: Vec<usize> = (0..columns.len())
        .filter(|j| states.iter().any(|row| row[*j].is_some()))
        .collect();
    if keep.is_empty() {
        return Err(LearningDataError::new(format!(
            "no row has an observed value for {}",
            model.name()
        )));
    }

    let mut merged: BTreeMap<Vec<Option<usize>>, f64> = BTreeMap::new();
    let mut total = 0;
    for row in &states {
        let pattern: Vec<Option<usize>> = keep.iter().map(|j| row[*j]).collect();
        if pattern.iter().all(Option::is_none) {
            continue;
        }
        total += 1;
        *merged.entry(pattern).or_insert(0.0) += 1.0;
    }

    Ok(Patterns {
        nodes: keep.iter().map(|j| columns[*j].1).collect(),
        rows: merged.into_iter().collect(),
        total,
    })
}

/// Weighted family counts when every family is fully observed.
fn count_families(model: &GraphModel, patterns: &Patterns, learned: &[NodeId]) -> Vec<Vec<f64>> {
    learned
        .iter()
        .map(|v| {
            let cards = model.parent_cards(*v);
            let card = model.node(*v).cardinality();
            let mut counts = vec![0.0; configurations(&cards) * card];
            let parent_slots: Vec<Option<usize>> =
                model.parents(*v).iter().map(|p| patterns.slot(*p)).collect();
            let own = patterns.slot(*v);
            for (pattern, weight) in &patterns.rows {
                let states: Option<Vec<usize>> = parent_slots
                    .iter()
                    .map(|s| s.and_then(|s| pattern[s]))
                    .collect();
                let state = own.and_then(|s| pattern[s]);
                if let (Some(states), Some(state)) = (states, state) {
                    counts[config_index(&cards, &states) * card + state] += weight;
                }
            }
            counts
        })
        .collect()
}

/// Normalized expected counts plus the pseudo-count, row by row.
fn m_step(counts: &[f64], card: usize, pseudo: f64) -> Vec<f64> {
    let mut values = Vec::with_capacity(counts.len());
    for row in counts.chunks(card) {
        let total: f64 = row.iter().sum::<f64>() + pseudo * card as f64;
        if total > 0.0 {
            values.extend(row.iter().map(|c| (c + pseudo) / total));
        } else {
            values.extend(std::iter::repeat(1.0 / card as f64).take(card));
        }
    }
    values
}

/// Data log-likelihood under `tables` and expected family counts of `learned`.
fn e_step(
    model: &GraphModel,
    tables: &[Vec<f64>],
    patterns: &Patterns,
    learned: &[NodeId],
) -> (f64, Vec<Vec<f64>>) {
    let tree = model.cluster_tree();
    let mut base: Vec<Potential> = model
        .chance_nodes()
        .into_iter()
        .map(|id| family_factor(model, id, &tables[id.0]))
        .collect();
    for d in model.decision_nodes() {
        base.push(Potential::uniform(d.0, model.node(d).cardinality()));
    }

    let scopes: Vec<Vec<usize>> = learned.iter().map(|v| factor_scope(model, *v)).collect();
    let mut expected: Vec<Vec<f64>> = learned
        .iter()
        .map(|v| vec![0.0; tables[v.0].len()])
        .collect();

    let mut log_likelihood = 0.0;
    let mut impossible = 0;
    for (pattern, weight) in &patterns.rows {
        let mut factors = base.clone();
        for (id, state) in patterns.nodes.iter().zip(pattern) {
            if let Some(s) = state {
                factors.push(Potential::indicator(id.0, model.node(*id).cardinality(), *s));
            }
        }
        let calibration = tree.calibrate(&factors);
        if calibration.is_impossible() {
            impossible += 1;
            continue;
        }
        log_likelihood += weight * calibration.log_evidence();
        for (acc, scope) in expected.iter_mut().zip(&scopes) {
            if let Some(joint) = tree.joint(&calibration, scope) {
                acc.iter_mut()
                    .zip(joint)
                    .for_each(|(a, p)| *a += weight * p);
            }
        }
    }
    if impossible > 0 {
        tracing::debug!(model = %model.name(), patterns = impossible, "Skipped patterns with zero probability");
    }
    (log_likelihood, expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphModelBuilder;

    fn pair() -> GraphModel {
        let mut b = GraphModelBuilder::new("pair");
        b.add_chance("A", &["a0", "a1"]).unwrap();
        b.add_chance("B", &["b0", "b1"]).unwrap();
        b.add_arc("A", "B").unwrap();
        b.set_cpt("A", vec![0.5, 0.5]).unwrap();
        b.set_cpt("B", vec![0.5, 0.5, 0.5, 0.5]).unwrap();
        b.build().unwrap()
    }

    fn mle() -> ParameterLearner {
        ParameterLearner::new(LearningConfig::default())
    }

    fn table(rows: &[(&str, &str)]) -> ObservationTable {
        let mut t = ObservationTable::new(["A", "B"]);
        for (a, b) in rows {
            t.push_row(vec![Some((*a).into()), Some((*b).into())]).unwrap();
        }
        t
    }

    #[test]
    fn test_closed_form_counts() {
        let obs = table(&[("a0", "b0"), ("a0", "b1"), ("a0", "b1"), ("a1", "b1")]);
        let outcome = mle().learn(&obs, &pair(), ScoringMethod::Mle).unwrap();
        let set = outcome.cpts().unwrap();
        assert!(set.report.closed_form);
        assert_eq!(set.report.rows, 4);
        assert_eq!(set.report.patterns, 3);

        let a = set.get("A").unwrap();
        assert!((a[0] - 3.01 / 4.02).abs() < 1e-12);
        let b = set.get("B").unwrap();
        assert!((b[0] - 1.01 / 3.02).abs() < 1e-12);
        assert!((b[3] - 1.01 / 1.02).abs() < 1e-12);
    }

    #[test]
    fn test_no_matching_columns_is_noop() {
        let mut obs = ObservationTable::new(["Price"]);
        obs.push_row(vec![Some("10".into())]).unwrap();
        let outcome = mle().learn(&obs, &pair(), ScoringMethod::Mdl).unwrap();
        assert!(outcome.is_noop());
    }

    #[test]
    fn test_out_of_domain_rows_dropped() {
        let obs = table(&[("sideways", "b9"), ("a1", "b0")]);
        let set = mle()
            .learn(&obs, &pair(), ScoringMethod::Mle)
            .unwrap()
            .cpts()
            .cloned()
            .unwrap();
        assert_eq!(set.report.rows, 1);
    }

    #[test]
    fn test_missing_child_uses_em() {
        let mut obs = table(&[("a0", "b0"), ("a1", "b1")]);
        obs.push_row(vec![Some("a0".into()), None]).unwrap();
        let set = mle()
            .learn(&obs, &pair(), ScoringMethod::Mle)
            .unwrap()
            .cpts()
            .cloned()
            .unwrap();
        assert!(!set.report.closed_form);
        assert!(set.converged());
        assert!(set.report.iterations >= 2);
        let a = set.get("A").unwrap();
        assert!((a[0] - 2.01 / 3.02).abs() < 1e-9);
        // B | a0 converges towards the observed b0 share
        let b = set.get("B").unwrap();
        assert!(b[0] > 0.9, "{b:?}");
    }

    #[test]
    fn test_iteration_cap_returns_marker() {
        let mut config = LearningConfig::default();
        config.max_iterations = 1;
        let mut obs = table(&[("a0", "b0"), ("a1", "b1")]);
        obs.push_row(vec![None, Some("b0".into())]).unwrap();
        let set = ParameterLearner::new(config)
            .learn(&obs, &pair(), ScoringMethod::Mle)
            .unwrap()
            .cpts()
            .cloned()
            .unwrap();
        let marker = set.non_convergence.clone().unwrap();
        assert_eq!(marker.iterations, 1);
        assert_eq!(set.report.iterations, 1);
        // The only evaluated estimate is the prior.
        assert_eq!(set.get("A"), Some(&[0.5, 0.5][..]));
    }

    #[test]
    fn test_penalties_shape_estimate_and_score() {
        let obs = table(&[("a0", "b0"), ("a0", "b0"), ("a1", "b1"), ("a0", "b1")]);
        let learner = mle();
        let model = pair();
        let mle_set = learner.learn(&obs, &model, ScoringMethod::Mle).unwrap();
        let mdl_set = learner.learn(&obs, &model, ScoringMethod::Mdl).unwrap();
        let (mle_set, mdl_set) = (mle_set.cpts().unwrap(), mdl_set.cpts().unwrap());

        // MDL adds log2(4) = 2 pseudo-counts per cell, flattening the estimate
        let a = mdl_set.get("A").unwrap();
        assert!((a[0] - 5.01 / 8.02).abs() < 1e-12);
        assert!(mdl_set.get("A").unwrap()[0] < mle_set.get("A").unwrap()[0]);
        assert_eq!(mdl_set.report.free_parameters, 3);
        let expected = mdl_set.report.log_likelihood - 2.0 * 3.0;
        assert!((mdl_set.report.score - expected).abs() < 1e-9);
        assert!((mle_set.report.score - mle_set.report.log_likelihood).abs() < 1e-12);
    }

    #[test]
    fn test_refresh_installs_tables() {
        let obs = table(&[("a1", "b1"), ("a1", "b1")]);
        let mut model = pair();
        let replaced = mle().refresh(&obs, &mut model, ScoringMethod::Mle).unwrap();
        assert_eq!(replaced, 2);
        assert!(model.cpt_by_name("A").unwrap()[1] > 0.99);
    }
}
