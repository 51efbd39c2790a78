//! Quality network: revenue growth against inflation, ROE against the cost of
//! equity, and relative debt-to-equity, optionally joined by systematic risk.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{GraphModel, GraphModelBuilder};
use crate::inference::Evidence;

use super::decide_label;
use super::labels::{Comparison, InflationComparison, Performance, QualityLevel, SystematicRisk};

pub const NETWORK: &str = "quality";

pub const QUALITY: &str = "Quality";
pub const FUTURE_SHARE_PERFORMANCE: &str = "FutureSharePerformance";
pub const CAGR_VS_INFLATION: &str = "CAGRvsInflation";
pub const ROE_VS_COE: &str = "ROEvsCOE";
pub const REL_DE: &str = "RelDE";
pub const SYSTEMATIC_RISK: &str = "SystematicRisk";
pub const Q_UTILITY: &str = "Q_Utility";

const GROWTH_GIVEN_PERFORMANCE: [f64; 9] = [
    0.80, 0.15, 0.05, //
    0.15, 0.70, 0.15, //
    0.05, 0.15, 0.80,
];

/// Build the Quality network. `extension` adds the `SystematicRisk` signal.
pub fn build(extension: bool) -> Result<GraphModel> {
    let mut b = GraphModelBuilder::new(NETWORK);
    b.add_decision(QUALITY, QualityLevel::LABELS)?;
    b.add_chance(FUTURE_SHARE_PERFORMANCE, Performance::LABELS)?;
    b.add_chance(CAGR_VS_INFLATION, InflationComparison::LABELS)?;
    for level in InflationComparison::ALL {
        for alias in level.aliases() {
            b.add_alias(CAGR_VS_INFLATION, level.as_str(), alias)?;
        }
    }
    b.add_chance(ROE_VS_COE, Comparison::LABELS)?;
    b.add_chance(REL_DE, Comparison::LABELS)?;
    b.add_utility(Q_UTILITY)?;

    for (tail, head) in [
        (FUTURE_SHARE_PERFORMANCE, CAGR_VS_INFLATION),
        (FUTURE_SHARE_PERFORMANCE, ROE_VS_COE),
        (FUTURE_SHARE_PERFORMANCE, REL_DE),
        (FUTURE_SHARE_PERFORMANCE, Q_UTILITY),
        (CAGR_VS_INFLATION, QUALITY),
        (ROE_VS_COE, QUALITY),
        (REL_DE, QUALITY),
        (QUALITY, Q_UTILITY),
    ] {
        b.add_arc(tail, head)?;
    }

    b.set_cpt(FUTURE_SHARE_PERFORMANCE, vec![1.0 / 3.0; 3])?;
    b.set_cpt(CAGR_VS_INFLATION, GROWTH_GIVEN_PERFORMANCE.to_vec())?;
    b.set_cpt(
        ROE_VS_COE,
        vec![
            0.80, 0.15, 0.05, //
            0.20, 0.60, 0.20, //
            0.05, 0.15, 0.80,
        ],
    )?;
    b.set_cpt(
        REL_DE,
        vec![
            0.05, 0.15, 0.80, //
            0.15, 0.70, 0.15, //
            0.80, 0.15, 0.05,
        ],
    )?;
    b.set_utility(
        Q_UTILITY,
        vec![
            100.0, 50.0, 0.0, //
            0.0, 100.0, 50.0, //
            -100.0, -50.0, 100.0,
        ],
    )?;

    if extension {
        b.add_chance(SYSTEMATIC_RISK, SystematicRisk::LABELS)?;
        b.add_arc(FUTURE_SHARE_PERFORMANCE, SYSTEMATIC_RISK)?;
        b.add_arc(SYSTEMATIC_RISK, QUALITY)?;
        b.set_cpt(SYSTEMATIC_RISK, GROWTH_GIVEN_PERFORMANCE.to_vec())?;
    }

    b.set_target_decision(QUALITY)?;
    b.build()
}

/// Discretized signals consumed by the Quality network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityEvidence {
    pub cagr_vs_inflation: Option<InflationComparison>,
    pub roe_vs_coe: Option<Comparison>,
    pub rel_de: Option<Comparison>,
    /// Only read when the model carries the `SystematicRisk` node
    pub systematic_risk: Option<SystematicRisk>,
}

impl QualityEvidence {
    /// Evidence for `model`; the risk signal is dropped when the model has no
    /// `SystematicRisk` node.
    pub fn to_evidence(&self, model: &GraphModel) -> Evidence {
        let mut evidence = Evidence::new();
        evidence.set_opt(ROE_VS_COE, self.roe_vs_coe.map(Comparison::as_str));
        evidence.set_opt(REL_DE, self.rel_de.map(Comparison::as_str));
        evidence.set_opt(
            CAGR_VS_INFLATION,
            self.cagr_vs_inflation.map(InflationComparison::as_str),
        );
        if model.node_id(SYSTEMATIC_RISK).is_some() {
            evidence.set_opt(SYSTEMATIC_RISK, self.systematic_risk.map(SystematicRisk::as_str));
        }
        evidence
    }
}

/// Evaluate the Quality network.
pub fn decide(model: &GraphModel, evidence: &QualityEvidence) -> Result<QualityLevel> {
    let (label, _) = decide_label::<QualityLevel>(model, &evidence.to_evidence(model))?;
    Ok(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::evaluate;

    fn all(
        cagr: InflationComparison,
        roe: Comparison,
        de: Comparison,
        risk: Option<SystematicRisk>,
    ) -> QualityEvidence {
        QualityEvidence {
            cagr_vs_inflation: Some(cagr),
            roe_vs_coe: Some(roe),
            rel_de: Some(de),
            systematic_risk: risk,
        }
    }

    #[test]
    fn test_extension_adds_node() {
        let base = build(false).unwrap();
        let extended = build(true).unwrap();
        assert_eq!(base.len(), 6);
        assert_eq!(extended.len(), 7);
        assert!(base.node_id(SYSTEMATIC_RISK).is_none());
        let quality = extended.node_id(QUALITY).unwrap();
        let last_parent = *extended.parents(quality).last().unwrap();
        assert_eq!(extended.node(last_parent).name(), SYSTEMATIC_RISK);
    }

    #[test]
    fn test_good_and_bad_signals() {
        let model = build(false).unwrap();
        let good = all(
            InflationComparison::InflationPlus,
            Comparison::Above,
            Comparison::Below,
            None,
        );
        assert_eq!(decide(&model, &good).unwrap(), QualityLevel::High);

        let bad = all(
            InflationComparison::InflationMinus,
            Comparison::Below,
            Comparison::Above,
            None,
        );
        assert_eq!(decide(&model, &bad).unwrap(), QualityLevel::Low);
    }

    #[test]
    fn test_growth_alias_accepted() {
        let model = build(false).unwrap();
        let evidence = Evidence::new().with(CAGR_VS_INFLATION, "above");
        let aliased = evaluate(&model, &evidence).unwrap();
        let declared = evaluate(&model, &Evidence::new().with(CAGR_VS_INFLATION, "InflationPlus")).unwrap();
        assert_eq!(aliased, declared);
    }

    #[test]
    fn test_risk_ignored_without_extension() {
        let model = build(false).unwrap();
        let ev = all(
            InflationComparison::Inflation,
            Comparison::EqualTo,
            Comparison::EqualTo,
            Some(SystematicRisk::Greater),
        );
        assert!(ev.to_evidence(&model).get(SYSTEMATIC_RISK).is_none());
        assert_eq!(decide(&model, &ev).unwrap(), QualityLevel::Medium);

        let extended = build(true).unwrap();
        assert_eq!(ev.to_evidence(&extended).label(SYSTEMATIC_RISK), Some("greater"));
        assert!(decide(&extended, &ev).is_ok());
    }
}
