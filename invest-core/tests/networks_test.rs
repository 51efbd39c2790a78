//! Integration tests for the fixed networks.

use invest_common::config::{AblationTarget, NetworkConfig};
use invest_core::graph::ROW_TOLERANCE;
use invest_core::inference::{evaluate, posterior, Evidence, TIE_EPSILON};
use invest_core::networks::{quality, recommendation, value, QualityEvidence, ValueEvidence};
use invest_core::prelude::*;
use proptest::prelude::*;

fn price() -> impl Strategy<Value = Option<PriceLevel>> {
    prop::option::of(prop::sample::select(PriceLevel::ALL.to_vec()))
}

fn comparison() -> impl Strategy<Value = Option<Comparison>> {
    prop::option::of(prop::sample::select(Comparison::ALL.to_vec()))
}

fn growth() -> impl Strategy<Value = Option<InflationComparison>> {
    prop::option::of(prop::sample::select(InflationComparison::ALL.to_vec()))
}

#[test]
fn test_all_rows_normalized_with_and_without_extension() {
    for extension in [false, true] {
        let networks = Networks::build(&NetworkConfig {
            systematic_risk_extension: extension,
        })
        .unwrap();
        for model in networks.iter() {
            for id in model.chance_nodes() {
                let card = model.node(id).cardinality();
                for row in model.cpt(id).unwrap().chunks(card) {
                    assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
                    assert!((row.iter().sum::<f64>() - 1.0).abs() <= ROW_TOLERANCE);
                }
            }
        }
    }
}

#[test]
fn test_value_prior_marginal() {
    let model = value::build().unwrap();
    let marginal = posterior(&model, &Evidence::new(), value::FUTURE_SHARE_PERFORMANCE).unwrap();
    let expected = [0.44444, 0.14815, 0.40741];
    for (p, q) in marginal.iter().zip(expected) {
        assert!((p - q).abs() < 1e-6, "{marginal:?}");
    }
}

#[test]
fn test_forced_override_market_cheap_sector_expensive() {
    let model = value::build().unwrap();
    let ev = ValueEvidence {
        pe_market: Some(PriceLevel::Cheap),
        pe_sector: Some(PriceLevel::Expensive),
        forward_pe: Some(PriceLevel::FairValue),
        future_performance: None,
    };
    let decision = value::decide(&model, &ev).unwrap();
    assert_ne!(decision.label, PriceLevel::Expensive);
}

#[test]
fn test_ablation_rules() {
    for q in QualityLevel::ALL {
        for v in PriceLevel::ALL {
            let by_value = recommendation::ablation(AblationTarget::Value, *v, *q);
            assert_eq!(by_value.is_yes(), *v != PriceLevel::Expensive);
            let by_quality = recommendation::ablation(AblationTarget::Quality, *v, *q);
            assert_eq!(by_quality.is_yes(), *q != QualityLevel::Low);
        }
    }
}

#[test]
fn test_recommendation_utilities() {
    let model = recommendation::build().unwrap();
    let evidence = Evidence::new()
        .with(recommendation::VALUE, "Cheap")
        .with(recommendation::QUALITY, "High");
    let evaluation = evaluate(&model, &evidence).unwrap();
    assert_eq!(evaluation.label, "Yes");
    assert!((evaluation.utility_by_label[0] - 277.3).abs() < 0.5, "{evaluation:?}");
    assert!((evaluation.utility_by_label[1] + 183.0).abs() < 0.5, "{evaluation:?}");
}

#[test]
fn test_unknown_label_rejected() {
    let model = quality::build(false).unwrap();
    let err = evaluate(&model, &Evidence::new().with(quality::ROE_VS_COE, "Sideways")).unwrap_err();
    assert!(err.is_evidence());
}

proptest! {
    #[test]
    fn test_value_evaluation_is_deterministic(m in price(), s in price(), f in price()) {
        let model = value::build().unwrap();
        let ev = ValueEvidence { pe_market: m, pe_sector: s, forward_pe: f, future_performance: None };
        let first = value::decide(&model, &ev).unwrap();
        let second = value::decide(&model, &ev).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(value::override_rule(first.inferred, &ev), first.label);
    }

    #[test]
    fn test_quality_picks_best_label(c in growth(), r in comparison(), d in comparison()) {
        let model = quality::build(false).unwrap();
        let ev = QualityEvidence { cagr_vs_inflation: c, roe_vs_coe: r, rel_de: d, systematic_risk: None };
        let evaluation = evaluate(&model, &ev.to_evidence(&model)).unwrap();
        let best = evaluation
            .utility_by_label
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(evaluation.expected_utility() >= best - TIE_EPSILON);
        let first_best = evaluation
            .utility_by_label
            .iter()
            .position(|u| *u >= best - TIE_EPSILON)
            .unwrap();
        prop_assert_eq!(evaluation.index, first_best);
    }
}
