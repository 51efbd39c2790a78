//! The three fixed INVEST networks and their typed vocabularies.

pub mod labels;
pub mod quality;
pub mod recommendation;
pub mod value;

use std::str::FromStr;

use invest_common::config::NetworkConfig;

use crate::error::{Error, Result};
use crate::graph::GraphModel;
use crate::inference::{evaluate, Evaluation, Evidence};

pub use labels::{
    Comparison, ExpensiveFlag, InflationComparison, Investable, Performance, PriceLevel,
    QualityLevel, SystematicRisk,
};
pub use quality::QualityEvidence;
pub use value::{ValueDecision, ValueEvidence};

/// Evaluate `model` and parse the chosen label into its typed vocabulary.
pub(crate) fn decide_label<L>(model: &GraphModel, evidence: &Evidence) -> Result<(L, Evaluation)>
where
    L: FromStr<Err = Error>,
{
    let evaluation = evaluate(model, evidence)?;
    let label = evaluation.label.parse()?;
    Ok((label, evaluation))
}

/// The Value, Quality and Recommendation models, built once and shared.
#[derive(Debug, Clone)]
pub struct Networks {
    pub value: GraphModel,
    pub quality: GraphModel,
    pub recommendation: GraphModel,
}

impl Networks {
    pub fn build(config: &NetworkConfig) -> Result<Self> {
        let networks = Self {
            value: value::build()?,
            quality: quality::build(config.systematic_risk_extension)?,
            recommendation: recommendation::build()?,
        };
        tracing::debug!(
            extension = config.systematic_risk_extension,
            "Built value, quality and recommendation networks"
        );
        Ok(networks)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphModel> {
        [&self.value, &self.quality, &self.recommendation].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GraphModel> {
        [&mut self.value, &mut self.quality, &mut self.recommendation].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ROW_TOLERANCE;

    #[test]
    fn test_every_installed_row_sums_to_one() {
        let config = NetworkConfig {
            systematic_risk_extension: true,
        };
        let networks = Networks::build(&config).unwrap();
        for model in networks.iter() {
            for id in model.chance_nodes() {
                let card = model.node(id).cardinality();
                let cpt = model.cpt(id).unwrap();
                for row in cpt.chunks(card) {
                    let sum: f64 = row.iter().sum();
                    assert!((sum - 1.0).abs() <= ROW_TOLERANCE, "{}: {sum}", model.node(id).name());
                }
            }
        }
    }

    #[test]
    fn test_names() {
        let networks = Networks::build(&NetworkConfig::default()).unwrap();
        let names: Vec<&str> = networks.iter().map(GraphModel::name).collect();
        assert_eq!(names, vec!["value", "quality", "recommendation"]);
    }
}
