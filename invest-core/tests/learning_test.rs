//! Integration tests for CPT learning against the fixed networks.

use invest_common::config::{LearningConfig, ScoringMethod};
use invest_core::graph::ROW_TOLERANCE;
use invest_core::learning::{cpt_kl_divergence, forward_sample, LearnOutcome, ParameterLearner};
use invest_core::networks::{quality, recommendation, value};
use invest_core::GraphModel;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn learner() -> ParameterLearner {
    ParameterLearner::new(LearningConfig::default())
}

fn assert_normalized(model: &GraphModel, name: &str, table: &[f64]) {
    let id = model.node_id(name).unwrap();
    let card = model.node(id).cardinality();
    for row in table.chunks(card) {
        assert!((row.iter().sum::<f64>() - 1.0).abs() <= ROW_TOLERANCE, "{name}: {row:?}");
    }
}

#[test]
fn test_complete_data_matches_smoothed_counts() {
    let model = recommendation::build().unwrap();
    let data = forward_sample(&model, 300, &mut StdRng::seed_from_u64(11)).unwrap();

    let outcome = learner().learn(&data, &model, ScoringMethod::Mle).unwrap();
    let set = outcome.cpts().unwrap();
    assert!(set.report.closed_form);
    assert_eq!(set.report.iterations, 0);
    assert_eq!(set.report.rows, 300);

    let perf = model.node_id(recommendation::PERFORMANCE).unwrap();
    let value_id = model.node_id(recommendation::VALUE).unwrap();
    let mut counts = [[0.0f64; 3]; 3];
    for r in 0..data.len() {
        let p = model
            .node(perf)
            .domain()
            .index_of(data.cell(r, recommendation::PERFORMANCE).unwrap())
            .unwrap();
        let v = model
            .node(value_id)
            .domain()
            .index_of(data.cell(r, recommendation::VALUE).unwrap())
            .unwrap();
        counts[p][v] += 1.0;
    }

    let learned = set.get(recommendation::VALUE).unwrap();
    for (p, row) in counts.iter().enumerate() {
        let total: f64 = row.iter().sum();
        for (v, c) in row.iter().enumerate() {
            let expected = (c + 0.01) / (total + 0.03);
            assert!((learned[p * 3 + v] - expected).abs() < 1e-12);
        }
    }
}

#[test]
fn test_kl_shrinks_with_more_rows() {
    let model = quality::build(false).unwrap();
    let nodes = [
        quality::FUTURE_SHARE_PERFORMANCE,
        quality::CAGR_VS_INFLATION,
        quality::ROE_VS_COE,
        quality::REL_DE,
    ];
    let seeds = 0..5u64;

    let mut divergences = Vec::new();
    for rows in [10, 100, 1_000, 10_000] {
        let mut total = 0.0;
        for seed in seeds.clone() {
            let data = forward_sample(&model, rows, &mut StdRng::seed_from_u64(seed)).unwrap();
            let outcome = learner().learn(&data, &model, ScoringMethod::Mle).unwrap();
            let set = outcome.cpts().unwrap();
            for name in nodes {
                let id = model.node_id(name).unwrap();
                let card = model.node(id).cardinality();
                total += cpt_kl_divergence(model.cpt(id).unwrap(), set.get(name).unwrap(), card);
            }
        }
        divergences.push(total / (5.0 * nodes.len() as f64));
    }

    for pair in divergences.windows(2) {
        assert!(pair[1] < pair[0], "{divergences:?}");
    }
}

#[test]
fn test_latent_performance_uses_em() {
    let model = value::build().unwrap();
    let sample = forward_sample(&model, 1_500, &mut StdRng::seed_from_u64(3)).unwrap();
    let data = sample.select(&[value::PE_MARKET, value::PE_SECTOR, value::FORWARD_PE]);

    let outcome = learner().learn(&data, &model, ScoringMethod::Bic).unwrap();
    let set = outcome.cpts().unwrap();
    assert!(!set.report.closed_form);
    assert!(set.report.iterations >= 1);
    assert!(set.report.iterations <= 100);
    assert_eq!(set.report.learned, vec![value::PE_MARKET, value::PE_SECTOR, value::FORWARD_PE]);
    assert!(set.report.log_likelihood.is_finite() && set.report.log_likelihood < 0.0);
    assert!(set.get(value::FUTURE_SHARE_PERFORMANCE).is_none());
    for (name, table) in set.iter() {
        assert_normalized(&model, name, table);
    }

    let mut refreshed = model.clone();
    assert_eq!(refreshed.apply_cpts(set).unwrap(), 3);
    assert_eq!(
        refreshed.cpt_by_name(value::FUTURE_SHARE_PERFORMANCE),
        model.cpt_by_name(value::FUTURE_SHARE_PERFORMANCE)
    );
}

#[test]
fn test_stronger_penalty_lowers_likelihood() {
    let model = recommendation::build().unwrap();
    let data = forward_sample(&model, 200, &mut StdRng::seed_from_u64(5)).unwrap();
    let run = |scoring| {
        learner()
            .learn(&data, &model, scoring)
            .unwrap()
            .cpts()
            .cloned()
            .unwrap()
            .report
    };
    let (mle, bic, mdl) = (run(ScoringMethod::Mle), run(ScoringMethod::Bic), run(ScoringMethod::Mdl));

    assert!(mle.log_likelihood >= bic.log_likelihood);
    assert!(bic.log_likelihood >= mdl.log_likelihood);
    assert!(mle.score > bic.score && bic.score > mdl.score);
    assert_eq!(mle.free_parameters, 2 + 6 + 6);
}

#[test]
fn test_mdl_penalty_toggle_only_changes_estimate() {
    let model = recommendation::build().unwrap();
    let data = forward_sample(&model, 64, &mut StdRng::seed_from_u64(9)).unwrap();
    let config = LearningConfig {
        mdl_penalty: false,
        ..LearningConfig::default()
    };
    let off = ParameterLearner::new(config)
        .learn(&data, &model, ScoringMethod::Mdl)
        .unwrap();
    let mle = learner().learn(&data, &model, ScoringMethod::Mle).unwrap();
    let (off, mle) = (off.cpts().unwrap(), mle.cpts().unwrap());

    assert_eq!(off.get(recommendation::VALUE), mle.get(recommendation::VALUE));
    assert!((off.report.penalty_per_parameter - 6.0).abs() < 1e-12);
    assert!(off.report.score < mle.report.score);
}

#[test]
fn test_unusable_table_is_noop() {
    let model = quality::build(false).unwrap();
    let before: Vec<Vec<u64>> = model
        .chance_nodes()
        .into_iter()
        .map(|id| model.cpt(id).unwrap().iter().map(|p| p.to_bits()).collect())
        .collect();

    let mut data = invest_core::ObservationTable::new([quality::ROE_VS_COE, quality::REL_DE]);
    data.push_row(vec![Some("n/a".into()), None]).unwrap();
    data.push_row(vec![Some("Sideways".into()), Some("?".into())]).unwrap();

    let mut refreshed = model.clone();
    let replaced = learner()
        .refresh(&data, &mut refreshed, ScoringMethod::Mdl)
        .unwrap();
    assert_eq!(replaced, 0);
    assert!(matches!(
        learner().learn(&data, &model, ScoringMethod::Mdl).unwrap(),
        LearnOutcome::NoOp(_)
    ));

    let after: Vec<Vec<u64>> = refreshed
        .chance_nodes()
        .into_iter()
        .map(|id| refreshed.cpt(id).unwrap().iter().map(|p| p.to_bits()).collect())
        .collect();
    assert_eq!(before, after);
}
