//! Decision pipeline: Value and Quality networks feed the Recommendation
//! network (or the ablation rule) for each (company, year).
//!
//! # Usage
//!
//! ```ignore
//! use invest_core::pipeline::{DecisionPipeline, StaticProjector};
//!
//! let config = invest_common::Config::load()?;
//! let mut pipeline = DecisionPipeline::from_config(&config)?;
//! pipeline.refresh(&history)?;
//! let report = pipeline.screen(&projector, &companies, 2017)?;
//! ```

pub mod projector;
pub mod report;

use rayon::prelude::*;

use invest_common::config::{AblationTarget, Config, ScoringMethod};

use crate::error::Result;
use crate::learning::{LearnOutcome, ObservationTable, ParameterLearner};
use crate::networks::{quality, recommendation, value, Investable, Networks};

pub use projector::{observations, CompanyEvidence, EvidenceProjector, StaticProjector};
pub use report::{NetworkRefresh, PipelineDecision, Route, ScreeningReport, SkippedRecord};

/// Per-company outcome inside a batch.
enum Screened {
    Decided(PipelineDecision),
    Skipped(SkippedRecord),
}

/// Value → Quality → Recommendation composition.
#[derive(Debug, Clone)]
pub struct DecisionPipeline {
    networks: Networks,
    ablation: Option<AblationTarget>,
    parallel: bool,
    learner: ParameterLearner,
    scoring: ScoringMethod,
    learning_enabled: bool,
}

impl DecisionPipeline {
    /// Pipeline over prebuilt networks with default settings.
    pub fn new(networks: Networks) -> Self {
        Self {
            networks,
            ablation: None,
            parallel: true,
            learner: ParameterLearner::default(),
            scoring: ScoringMethod::default(),
            learning_enabled: true,
        }
    }

    /// Build the networks and settings from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let networks = Networks::build(&config.networks)?;
        Ok(Self {
            networks,
            ablation: config.pipeline.ablation,
            parallel: config.pipeline.parallel,
            learner: ParameterLearner::new(config.learning.clone()),
            scoring: config.learning.scoring,
            learning_enabled: config.learning.enabled,
        })
    }

    pub fn with_ablation(mut self, ablation: Option<AblationTarget>) -> Self {
        self.ablation = ablation;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringMethod) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn networks(&self) -> &Networks {
        &self.networks
    }

    pub fn ablation(&self) -> Option<AblationTarget> {
        self.ablation
    }

    /// Recommendation for one projected record.
    pub fn decide(&self, evidence: &CompanyEvidence) -> Result<PipelineDecision> {
        let span = invest_common::decision_span!("decide", evidence.company, evidence.year);
        let _enter = span.enter();

        if !evidence.acceptable {
            tracing::debug!("Screened out before evaluation");
            return Ok(PipelineDecision {
                company: evidence.company.clone(),
                year: evidence.year,
                value: None,
                quality: None,
                investable: Investable::No,
                route: Route::Screened,
            });
        }

        let value = value::decide(&self.networks.value, &evidence.value_evidence())?.label;
        let quality = quality::decide(&self.networks.quality, &evidence.quality_evidence())?;
        let (investable, route) = match self.ablation {
            Some(target) => (
                recommendation::ablation(target, value, quality),
                Route::Ablation(target),
            ),
            None => (
                recommendation::decide(&self.networks.recommendation, value, quality)?,
                Route::Network,
            ),
        };

        tracing::debug!(value = %value, quality = %quality, investable = %investable, "Decided");
        Ok(PipelineDecision {
            company: evidence.company.clone(),
            year: evidence.year,
            value: Some(value),
            quality: Some(quality),
            investable,
            route,
        })
    }

    /// Project and decide one company. `None` when the projector has no record.
    pub fn decide_for<P>(&self, projector: &P, company: &str, year: i32) -> Result<Option<PipelineDecision>>
    where
        P: EvidenceProjector + ?Sized,
    {
        projector
            .project(company, year)
            .map(|evidence| self.decide(&evidence))
            .transpose()
    }

    /// Decide every company for one year. Records with no projection or with
    /// rejected evidence are skipped; other errors abort the batch.
    pub fn screen<P, S>(&self, projector: &P, companies: &[S], year: i32) -> Result<ScreeningReport>
    where
        P: EvidenceProjector + ?Sized,
        S: AsRef<str> + Sync,
    {
        let screen_one = |company: &S| -> Result<Screened> {
            let company = company.as_ref();
            let skip = |reason: String| {
                Screened::Skipped(SkippedRecord {
                    company: company.to_string(),
                    year,
                    reason,
                })
            };
            match self.decide_for(projector, company, year) {
                Ok(Some(decision)) => Ok(Screened::Decided(decision)),
                Ok(None) => Ok(skip("no projected evidence".into())),
                Err(e) if e.is_evidence() => Ok(skip(e.to_string())),
                Err(e) => Err(e),
            }
        };

        let outcomes: Vec<Result<Screened>> = if self.parallel {
            companies.par_iter().map(screen_one).collect()
        } else {
            companies.iter().map(screen_one).collect()
        };

        let mut report = ScreeningReport {
            year,
            ..ScreeningReport::default()
        };
        for outcome in outcomes {
            match outcome? {
                Screened::Decided(decision) => report.decisions.push(decision),
                Screened::Skipped(record) => {
                    tracing::warn!(company = %record.company, year, reason = %record.reason, "Skipped record");
                    report.skipped.push(record);
                }
            }
        }

        tracing::info!("{}", report.summary());
        Ok(report)
    }

    /// Re-learn CPTs of all three networks from historical observations and
    /// install whatever was learned. Call between batches.
    pub fn refresh(&mut self, observations: &ObservationTable) -> Result<Vec<NetworkRefresh>> {
        if !self.learning_enabled {
            tracing::info!("Learning disabled, keeping prior CPTs");
            return Ok(Vec::new());
        }

        let mut refreshed = Vec::new();
        for model in self.networks.iter_mut() {
            let outcome = self.learner.learn(observations, model, self.scoring)?;
            let replaced = match &outcome {
                LearnOutcome::Learned(set) => model.apply_cpts(set)?,
                LearnOutcome::NoOp(_) => 0,
            };
            refreshed.push(NetworkRefresh {
                network: model.name().to_string(),
                outcome,
                replaced,
            });
        }
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::{Comparison, InflationComparison, PriceLevel, QualityLevel};
    use invest_common::config::NetworkConfig;

    fn pipeline() -> DecisionPipeline {
        DecisionPipeline::new(Networks::build(&NetworkConfig::default()).unwrap())
    }

    fn strong(company: &str) -> CompanyEvidence {
        let mut e = CompanyEvidence::new(company, 2016);
        e.pe_market = Some(PriceLevel::Cheap);
        e.pe_sector = Some(PriceLevel::Cheap);
        e.forward_pe = Some(PriceLevel::Cheap);
        e.roe_vs_coe = Some(Comparison::Above);
        e.rel_de = Some(Comparison::Below);
        e.cagr_vs_inflation = Some(InflationComparison::InflationPlus);
        e
    }

    #[test]
    fn test_strong_company_is_investable() {
        let decision = pipeline().decide(&strong("ACME")).unwrap();
        assert_eq!(decision.value, Some(PriceLevel::Cheap));
        assert_eq!(decision.quality, Some(QualityLevel::High));
        assert_eq!(decision.investable, Investable::Yes);
        assert_eq!(decision.route, Route::Network);
    }

    #[test]
    fn test_unacceptable_company_is_screened() {
        let mut e = strong("ACME");
        e.acceptable = false;
        let decision = pipeline().decide(&e).unwrap();
        assert_eq!(decision.investable, Investable::No);
        assert_eq!(decision.route, Route::Screened);
        assert!(decision.value.is_none());
    }

    #[test]
    fn test_ablation_route() {
        let p = pipeline().with_ablation(Some(AblationTarget::Quality));
        let decision = p.decide(&strong("ACME")).unwrap();
        assert_eq!(decision.route, Route::Ablation(AblationTarget::Quality));
        assert_eq!(decision.investable, Investable::Yes);
    }

    #[test]
    fn test_screen_skips_missing_records() {
        let projector: StaticProjector = [strong("ACME")].into_iter().collect();
        let report = pipeline()
            .with_parallel(false)
            .screen(&projector, &["ACME", "GHOST"], 2016)
            .unwrap();
        assert_eq!(report.decisions.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].company, "GHOST");
    }

    #[test]
    fn test_refresh_disabled() {
        let mut p = pipeline();
        p.learning_enabled = false;
        let table = observations([&strong("ACME")]);
        assert!(p.refresh(&table).unwrap().is_empty());
    }
}
