//! Evidence: observed labels and soft likelihoods keyed by node name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::graph::{GraphModel, NodeId, NodeKind};

/// One observation on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    /// The node is known to take this label
    Hard(String),
    /// Relative likelihood of each label, in domain order
    Soft(Vec<f64>),
}

/// Partial mapping from node name to a finding. Unobserved nodes are
/// marginalized during inference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    findings: BTreeMap<String, Finding>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hard finding, builder style.
    pub fn with(mut self, node: impl Into<String>, label: impl Into<String>) -> Self {
        self.set_hard(node, label);
        self
    }

    /// Add a soft finding, builder style.
    pub fn with_soft(mut self, node: impl Into<String>, likelihood: Vec<f64>) -> Self {
        self.findings.insert(node.into(), Finding::Soft(likelihood));
        self
    }

    pub fn set_hard(&mut self, node: impl Into<String>, label: impl Into<String>) {
        self.findings.insert(node.into(), Finding::Hard(label.into()));
    }

    /// Add a hard finding when a label is present.
    pub fn set_opt(&mut self, node: impl Into<String>, label: Option<impl Into<String>>) {
        if let Some(label) = label {
            self.set_hard(node, label);
        }
    }

    pub fn remove(&mut self, node: &str) -> Option<Finding> {
        self.findings.remove(node)
    }

    pub fn get(&self, node: &str) -> Option<&Finding> {
        self.findings.get(node)
    }

    /// Hard label recorded for a node, if any.
    pub fn label(&self, node: &str) -> Option<&str> {
        match self.findings.get(node) {
            Some(Finding::Hard(label)) => Some(label),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Finding)> {
        self.findings.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Evidence {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut evidence = Self::new();
        for (node, label) in iter {
            evidence.set_hard(node, label);
        }
        evidence
    }
}

/// A finding checked against a model.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved {
    Hard(usize),
    Soft(Vec<f64>),
}

/// Validate every finding against the model's nodes and domains.
pub(crate) fn resolve(model: &GraphModel, evidence: &Evidence) -> Result<Vec<(NodeId, Resolved)>> {
    let mut resolved: Vec<(NodeId, Resolved)> = Vec::with_capacity(evidence.len());
    for (name, finding) in evidence.iter() {
        let id = model
            .node_id(name)
            .ok_or_else(|| Error::evidence(format!("unknown node {name} in {}", model.name())))?;
        let node = model.node(id);
        if node.kind() == NodeKind::Utility {
            return Err(Error::evidence(format!("utility node {name} cannot be observed")));
        }
        if resolved.iter().any(|(seen, _)| *seen == id) {
            return Err(Error::evidence(format!(
                "node {} observed more than once",
                node.name()
            )));
        }

        let value = match finding {
            Finding::Hard(label) => {
                let index = node.domain().index_of(label).ok_or_else(|| {
                    Error::evidence(format!(
                        "invalid label '{label}' for {}; valid labels: {}",
                        node.name(),
                        node.domain().labels().join(", ")
                    ))
                })?;
                Resolved::Hard(index)
            }
            Finding::Soft(weights) => {
                if node.kind() == NodeKind::Decision {
                    return Err(Error::evidence(format!(
                        "decision {} only accepts a hard label",
                        node.name()
                    )));
                }
                if weights.len() != node.cardinality() {
                    return Err(Error::evidence(format!(
                        "likelihood for {} has {} entries, expected {}",
                        node.name(),
                        weights.len(),
                        node.cardinality()
                    )));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(Error::evidence(format!(
                        "likelihood for {} has negative or non-finite entries",
                        node.name()
                    )));
                }
                if weights.iter().all(|w| *w == 0.0) {
                    return Err(Error::evidence(format!(
                        "likelihood for {} is all zero",
                        node.name()
                    )));
                }
                Resolved::Soft(weights.clone())
            }
        };
        resolved.push((id, value));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphModelBuilder;

    fn model() -> GraphModel {
        let mut b = GraphModelBuilder::new("tiny");
        b.add_chance("Signal", &["Cheap", "FairValue", "Expensive"]).unwrap();
        b.add_decision("Act", &["No", "Yes"]).unwrap();
        b.add_utility("U").unwrap();
        b.add_arc("Signal", "Act").unwrap();
        b.add_arc("Act", "U").unwrap();
        b.add_alias("Signal", "FairValue", "fair").unwrap();
        b.set_cpt("Signal", vec![0.2, 0.3, 0.5]).unwrap();
        b.set_utility("U", vec![0.0, 1.0]).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_resolves_case_insensitively_with_aliases() {
        let m = model();
        let ev = Evidence::new().with("signal", "FAIR");
        let resolved = resolve(&m, &ev).unwrap();
        assert_eq!(resolved, vec![(m.node_id("Signal").unwrap(), Resolved::Hard(1))]);
    }

    #[test]
    fn test_rejects_bad_findings() {
        let m = model();
        let cases = [
            Evidence::new().with("Nope", "Cheap"),
            Evidence::new().with("Signal", "Pricey"),
            Evidence::new().with("U", "x"),
            Evidence::new().with_soft("Signal", vec![1.0, 1.0]),
            Evidence::new().with_soft("Signal", vec![0.0, 0.0, 0.0]),
            Evidence::new().with_soft("Signal", vec![1.0, -1.0, 0.0]),
            Evidence::new().with_soft("Act", vec![0.5, 0.5]),
            Evidence::new().with("Signal", "Cheap").with("SIGNAL", "Expensive"),
        ];
        for ev in cases {
            assert!(matches!(resolve(&m, &ev), Err(Error::Evidence(_))), "{ev:?}");
        }
    }

    #[test]
    fn test_builders() {
        let mut ev: Evidence = [("A", "x"), ("B", "y")].into_iter().collect();
        ev.set_opt("C", None::<String>);
        ev.set_opt("D", Some("z"));
        assert_eq!(ev.len(), 3);
        assert_eq!(ev.label("D"), Some("z"));
        assert!(ev.remove("A").is_some());
        assert!(ev.get("A").is_none());
    }
}
