//! Investment-recommendation network and the ablation rule that can replace it.

use invest_common::config::AblationTarget;

use crate::error::Result;
use crate::graph::{GraphModel, GraphModelBuilder};
use crate::inference::Evidence;

use super::decide_label;
use super::labels::{Investable, Performance, PriceLevel, QualityLevel};

pub const NETWORK: &str = "recommendation";

pub const INVESTABLE: &str = "Investable";
pub const PERFORMANCE: &str = "Performance";
pub const VALUE: &str = "Value";
pub const QUALITY: &str = "Quality";
pub const I_UTILITY: &str = "I_Utility";

const SIGNAL_GIVEN_PERFORMANCE: [f64; 9] = [
    0.85, 0.10, 0.05, //
    0.20, 0.60, 0.20, //
    0.05, 0.10, 0.85,
];

/// Build the Recommendation network with its prior tables.
pub fn build() -> Result<GraphModel> {
    let mut b = GraphModelBuilder::new(NETWORK);
    b.add_decision(INVESTABLE, Investable::LABELS)?;
    b.add_chance(PERFORMANCE, Performance::LABELS)?;
    b.add_chance(VALUE, PriceLevel::LABELS)?;
    b.add_chance(QUALITY, QualityLevel::LABELS)?;
    b.add_utility(I_UTILITY)?;

    for (tail, head) in [
        (PERFORMANCE, QUALITY),
        (PERFORMANCE, VALUE),
        (PERFORMANCE, I_UTILITY),
        (VALUE, INVESTABLE),
        (QUALITY, INVESTABLE),
        (INVESTABLE, I_UTILITY),
    ] {
        b.add_arc(tail, head)?;
    }

    b.set_cpt(PERFORMANCE, vec![1.0 / 3.0; 3])?;
    b.set_cpt(VALUE, SIGNAL_GIVEN_PERFORMANCE.to_vec())?;
    b.set_cpt(QUALITY, SIGNAL_GIVEN_PERFORMANCE.to_vec())?;
    b.set_utility(
        I_UTILITY,
        vec![300.0, -200.0, -100.0, 100.0, -250.0, 200.0],
    )?;
    b.set_target_decision(INVESTABLE)?;
    b.build()
}

/// Evaluate the Recommendation network with both upstream decisions as evidence.
pub fn decide(model: &GraphModel, value: PriceLevel, quality: QualityLevel) -> Result<Investable> {
    let evidence = Evidence::new()
        .with(VALUE, value.as_str())
        .with(QUALITY, quality.as_str());
    let (label, _) = decide_label::<Investable>(model, &evidence)?;
    Ok(label)
}

/// Fixed rule used in place of the network when ablating.
pub fn ablation(target: AblationTarget, value: PriceLevel, quality: QualityLevel) -> Investable {
    match target {
        AblationTarget::Value => {
            Investable::from_bool(matches!(value, PriceLevel::Cheap | PriceLevel::FairValue))
        }
        AblationTarget::Quality => {
            Investable::from_bool(matches!(quality, QualityLevel::High | QualityLevel::Medium))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(PriceLevel::Cheap, QualityLevel::High, Investable::Yes ; "cheap high")]
    #[test_case(PriceLevel::Expensive, QualityLevel::Low, Investable::No ; "expensive low")]
    #[test_case(PriceLevel::FairValue, QualityLevel::Medium, Investable::No ; "fair medium")]
    fn test_recommendation(value: PriceLevel, quality: QualityLevel, expected: Investable) {
        let model = build().unwrap();
        assert_eq!(decide(&model, value, quality).unwrap(), expected);
    }

    #[test]
    fn test_ablation_value_ignores_quality() {
        for quality in QualityLevel::ALL {
            assert_eq!(ablation(AblationTarget::Value, PriceLevel::Cheap, *quality), Investable::Yes);
            assert_eq!(
                ablation(AblationTarget::Value, PriceLevel::FairValue, *quality),
                Investable::Yes
            );
            assert_eq!(
                ablation(AblationTarget::Value, PriceLevel::Expensive, *quality),
                Investable::No
            );
        }
    }

    #[test]
    fn test_ablation_quality_ignores_value() {
        for value in PriceLevel::ALL {
            assert!(ablation(AblationTarget::Quality, *value, QualityLevel::High).is_yes());
            assert!(ablation(AblationTarget::Quality, *value, QualityLevel::Medium).is_yes());
            assert!(!ablation(AblationTarget::Quality, *value, QualityLevel::Low).is_yes());
        }
    }
}
