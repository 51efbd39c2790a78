//! Value network: is the share cheap, fairly valued or expensive?
//!
//! Two decisions. `Expensive_E` looks at the PE-relative-to-market and
//! PE-relative-to-sector signals; `ValueRelativeToPrice` (the target) also sees
//! the forward PE signal and the first decision. Both are scored against the
//! latent future share performance.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{GraphModel, GraphModelBuilder};
use crate::inference::Evidence;

use super::decide_label;
use super::labels::{ExpensiveFlag, Performance, PriceLevel};

pub const NETWORK: &str = "value";

pub const EXPENSIVE_E: &str = "Expensive_E";
pub const VALUE_RELATIVE_TO_PRICE: &str = "ValueRelativeToPrice";
pub const FUTURE_SHARE_PERFORMANCE: &str = "FutureSharePerformance";
pub const PE_MARKET: &str = "PERelative_ShareMarket";
pub const PE_SECTOR: &str = "PERelative_ShareSector";
pub const FORWARD_PE: &str = "ForwardPE_CurrentVsHistory";
pub const EXPENSIVE_UTILITY: &str = "Expensive_Utility";
pub const VRP_UTILITY: &str = "VRP_Utility";

/// Prior over future share performance.
pub const PERFORMANCE_PRIOR: [f64; 3] = [0.44444, 0.14815, 0.40741];

/// PE signal given performance (rows Positive, Stagnant, Negative).
const PE_GIVEN_PERFORMANCE: [f64; 9] = [
    0.70, 0.20, 0.10, //
    0.25, 0.50, 0.25, //
    0.10, 0.20, 0.70,
];

/// Build the Value network with its prior tables.
pub fn build() -> Result<GraphModel> {
    let mut b = GraphModelBuilder::new(NETWORK);
    b.add_decision(EXPENSIVE_E, ExpensiveFlag::LABELS)?;
    b.add_decision(VALUE_RELATIVE_TO_PRICE, PriceLevel::LABELS)?;
    b.add_chance(FUTURE_SHARE_PERFORMANCE, Performance::LABELS)?;
    b.add_chance(PE_MARKET, PriceLevel::LABELS)?;
    b.add_chance(PE_SECTOR, PriceLevel::LABELS)?;
    b.add_chance(FORWARD_PE, PriceLevel::LABELS)?;
    b.add_utility(EXPENSIVE_UTILITY)?;
    b.add_utility(VRP_UTILITY)?;

    for (tail, head) in [
        (FUTURE_SHARE_PERFORMANCE, PE_MARKET),
        (FUTURE_SHARE_PERFORMANCE, PE_SECTOR),
        (FUTURE_SHARE_PERFORMANCE, FORWARD_PE),
        (FUTURE_SHARE_PERFORMANCE, EXPENSIVE_UTILITY),
        (FUTURE_SHARE_PERFORMANCE, VRP_UTILITY),
        (PE_MARKET, EXPENSIVE_E),
        (PE_MARKET, VALUE_RELATIVE_TO_PRICE),
        (PE_SECTOR, EXPENSIVE_E),
        (PE_SECTOR, VALUE_RELATIVE_TO_PRICE),
        (FORWARD_PE, VALUE_RELATIVE_TO_PRICE),
        (EXPENSIVE_E, FORWARD_PE),
        (EXPENSIVE_E, VALUE_RELATIVE_TO_PRICE),
        (EXPENSIVE_E, EXPENSIVE_UTILITY),
        (VALUE_RELATIVE_TO_PRICE, VRP_UTILITY),
    ] {
        b.add_arc(tail, head)?;
    }

    b.set_cpt(FUTURE_SHARE_PERFORMANCE, PERFORMANCE_PRIOR.to_vec())?;
    b.set_cpt(PE_MARKET, PE_GIVEN_PERFORMANCE.to_vec())?;
    b.set_cpt(PE_SECTOR, PE_GIVEN_PERFORMANCE.to_vec())?;
    // Rows (performance, Expensive_E) with Expensive_E varying fastest.
    // The Negative/Yes row is recorded as [0.10, 0.17, 0.75] and rescaled.
    b.set_cpt(
        FORWARD_PE,
        vec![
            0.70, 0.20, 0.10, //
            0.20, 0.30, 0.50, //
            0.15, 0.70, 0.15, //
            0.20, 0.50, 0.30, //
            0.20, 0.60, 0.20, //
            0.10 / 1.02, 0.17 / 1.02, 0.75 / 1.02,
        ],
    )?;
    b.set_utility(
        EXPENSIVE_UTILITY,
        vec![350.0, -300.0, -150.0, 150.0, -200.0, 200.0],
    )?;
    b.set_utility(
        VRP_UTILITY,
        vec![
            200.0, 100.0, -100.0, //
            -75.0, 0.0, 100.0, //
            -200.0, -75.0, 150.0,
        ],
    )?;
    b.set_target_decision(VALUE_RELATIVE_TO_PRICE)?;
    b.build()
}

/// Discretized signals consumed by the Value network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueEvidence {
    pub pe_market: Option<PriceLevel>,
    pub pe_sector: Option<PriceLevel>,
    pub forward_pe: Option<PriceLevel>,
    /// Forward-looking performance, when the caller has one
    pub future_performance: Option<Performance>,
}

impl ValueEvidence {
    pub fn to_evidence(&self) -> Evidence {
        let mut evidence = Evidence::new();
        evidence.set_opt(PE_MARKET, self.pe_market.map(PriceLevel::as_str));
        evidence.set_opt(PE_SECTOR, self.pe_sector.map(PriceLevel::as_str));
        evidence.set_opt(FORWARD_PE, self.forward_pe.map(PriceLevel::as_str));
        evidence.set_opt(
            FUTURE_SHARE_PERFORMANCE,
            self.future_performance.map(Performance::as_str),
        );
        evidence
    }
}

/// Value decision after the override rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDecision {
    pub label: PriceLevel,
    /// Label the network itself chose
    pub inferred: PriceLevel,
    /// Expected utility of each `ValueRelativeToPrice` label
    pub utility_by_label: Vec<f64>,
}

impl ValueDecision {
    pub fn overridden(&self) -> bool {
        self.label != self.inferred
    }
}

/// Evaluate the Value network and apply [`override_rule`].
pub fn decide(model: &GraphModel, evidence: &ValueEvidence) -> Result<ValueDecision> {
    let (inferred, evaluation) = decide_label::<PriceLevel>(model, &evidence.to_evidence())?;
    let label = override_rule(inferred, evidence);
    if label != inferred {
        tracing::debug!(inferred = %inferred, label = %label, "Value decision overridden");
    }
    Ok(ValueDecision {
        label,
        inferred,
        utility_by_label: evaluation.utility_by_label,
    })
}

/// Correct an `Expensive` verdict to `FairValue` when the PE signals
/// disagree in direction, or when market, sector and forward PE are all
/// `FairValue`.
pub fn override_rule(inferred: PriceLevel, evidence: &ValueEvidence) -> PriceLevel {
    use PriceLevel::{Cheap, Expensive, FairValue};

    if inferred != Expensive {
        return inferred;
    }
    let disagree = matches!(
        (evidence.pe_market, evidence.pe_sector),
        (Some(Cheap), Some(Expensive)) | (Some(Expensive), Some(Cheap))
    );
    let all_fair = evidence.pe_market == Some(FairValue)
        && evidence.pe_sector == Some(FairValue)
        && evidence.forward_pe == Some(FairValue);
    if disagree || all_fair {
        FairValue
    } else {
        inferred
    }
}
