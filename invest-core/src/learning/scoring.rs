//! Complexity penalties for the MLE, BIC and MDL criteria.

use invest_common::config::{LearningConfig, ScoringMethod};

use crate::graph::{configurations, GraphModel, NodeId};

/// Penalty per free parameter for a sample of `n` rows.
pub fn penalty_per_parameter(scoring: ScoringMethod, n: f64) -> f64 {
    if n <= 1.0 {
        return 0.0;
    }
    match scoring {
        ScoringMethod::Mle => 0.0,
        ScoringMethod::Bic => 0.5 * n.ln(),
        ScoringMethod::Mdl => n.log2(),
    }
}

/// Pseudo-count added to every CPT cell: the Laplace constant plus the
/// scoring penalty. MDL's share is dropped when `mdl_penalty` is off.
pub fn pseudo_count(config: &LearningConfig, scoring: ScoringMethod, n: f64) -> f64 {
    let penalty = match scoring {
        ScoringMethod::Mdl if !config.mdl_penalty => 0.0,
        _ => penalty_per_parameter(scoring, n),
    };
    config.laplace_smoothing + penalty
}

/// Free parameters of the CPTs of `nodes`: rows × (labels − 1).
pub fn free_parameters(model: &GraphModel, nodes: &[NodeId]) -> usize {
    nodes
        .iter()
        .map(|id| {
            let rows = configurations(&model.parent_cards(*id));
            rows * model.node(*id).cardinality().saturating_sub(1)
        })
        .sum()
}

/// Mean over rows of KL(p‖q) for two CPTs with `states` labels per row.
pub fn cpt_kl_divergence(p: &[f64], q: &[f64], states: usize) -> f64 {
    let rows = p.len() / states.max(1);
    if rows == 0 {
        return 0.0;
    }
    let total: f64 = p
        .chunks(states)
        .zip(q.chunks(states))
        .map(|(pr, qr)| {
            pr.iter()
                .zip(qr)
                .filter(|(a, _)| **a > 0.0)
                .map(|(a, b)| a * (a / b.max(f64::MIN_POSITIVE)).ln())
                .sum::<f64>()
        })
        .sum();
    total / rows as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ScoringMethod::Mle, 0.0 ; "mle")]
    #[test_case(ScoringMethod::Bic, 0.5 * 1000f64.ln() ; "bic")]
    #[test_case(ScoringMethod::Mdl, 1000f64.log2() ; "mdl")]
    fn test_penalty(scoring: ScoringMethod, expected: f64) {
        assert!((penalty_per_parameter(scoring, 1000.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_pseudo_count_toggle() {
        let mut config = LearningConfig::default();
        let on = pseudo_count(&config, ScoringMethod::Mdl, 8.0);
        assert!((on - (0.01 + 3.0)).abs() < 1e-12);
        config.mdl_penalty = false;
        assert!((pseudo_count(&config, ScoringMethod::Mdl, 8.0) - 0.01).abs() < 1e-12);
        assert!(pseudo_count(&config, ScoringMethod::Bic, 8.0) > 0.01);
        assert!((pseudo_count(&config, ScoringMethod::Mle, 8.0) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_kl() {
        let p = [0.5, 0.5, 1.0, 0.0];
        assert_eq!(cpt_kl_divergence(&p, &p, 2), 0.0);
        let q = [0.9, 0.1, 0.5, 0.5];
        let expected = (0.5 * (0.5f64 / 0.9).ln() + 0.5 * 5f64.ln() + 2f64.ln()) / 2.0;
        assert!((cpt_kl_divergence(&p, &q, 2) - expected).abs() < 1e-12);
    }
}
