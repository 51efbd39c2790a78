//! Node kinds and discrete domains.

use invest_common::util::normalize_token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to a node, equal to its insertion position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Insertion position of the node.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of a node in an influence diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Random variable with a CPT
    Chance,
    /// Variable chosen by the decision maker
    Decision,
    /// Terminal value node with a utility table
    Utility,
}

impl NodeKind {
    /// Whether the node is a variable (has a domain).
    pub const fn is_variable(self) -> bool {
        matches!(self, Self::Chance | Self::Decision)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chance => write!(f, "chance"),
            Self::Decision => write!(f, "decision"),
            Self::Utility => write!(f, "utility"),
        }
    }
}

/// Ordered label set of a node, plus declared alternate spellings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    labels: Vec<String>,
    aliases: Vec<Vec<String>>,
}

impl Domain {
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
            aliases: vec![Vec::new(); labels.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Aliases declared for the label at `index`.
    pub fn aliases(&self, index: usize) -> &[String] {
        self.aliases.get(index).map_or(&[], Vec::as_slice)
    }

    /// Position of a token in the domain, matching labels then aliases
    /// case-insensitively.
    pub fn index_of(&self, token: &str) -> Option<usize> {
        let wanted = normalize_token(token);
        if wanted.is_empty() {
            return None;
        }
        self.labels
            .iter()
            .position(|l| normalize_token(l) == wanted)
            .or_else(|| {
                self.aliases
                    .iter()
                    .position(|alts| alts.iter().any(|a| normalize_token(a) == wanted))
            })
    }

    pub(crate) fn push_alias(&mut self, index: usize, alias: &str) {
        if let Some(alts) = self.aliases.get_mut(index) {
            alts.push(alias.to_string());
        }
    }
}

/// A node of the diagram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) domain: Domain,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Domain of the node; empty for utility nodes.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Number of states; zero for utility nodes.
    pub fn cardinality(&self) -> usize {
        self.domain.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_lookup() {
        let mut domain = Domain::new(&["InflationPlus", "Inflation", "InflationMinus"]);
        domain.push_alias(0, "Above");
        domain.push_alias(1, "EqualTo");
        domain.push_alias(2, "Below");

        assert_eq!(domain.index_of("inflationplus"), Some(0));
        assert_eq!(domain.index_of("Inflation"), Some(1));
        assert_eq!(domain.index_of(" below "), Some(2));
        assert_eq!(domain.index_of("equal_to"), Some(1));
        assert_eq!(domain.index_of("sideways"), None);
        assert_eq!(domain.index_of(""), None);
        assert_eq!(domain.aliases(0), ["Above".to_string()]);
    }

    #[test]
    fn test_labels_win_over_aliases() {
        let mut domain = Domain::new(&["Cheap", "FairValue"]);
        domain.push_alias(1, "cheap");
        assert_eq!(domain.index_of("Cheap"), Some(0));
    }
}
