//! Pipeline outputs.

use invest_common::config::AblationTarget;
use serde::{Deserialize, Serialize};

use crate::learning::LearnOutcome;
use crate::networks::{Investable, PriceLevel, QualityLevel};

/// How the final recommendation was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Failed the acceptability screen; no network was evaluated
    Screened,
    /// Recommendation network
    Network,
    /// Fixed ablation rule
    Ablation(AblationTarget),
}

/// Recommendation for one (company, year).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDecision {
    pub company: String,
    pub year: i32,
    /// Value decision after the override rule
    pub value: Option<PriceLevel>,
    pub quality: Option<QualityLevel>,
    pub investable: Investable,
    pub route: Route,
}

/// A record left out of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub company: String,
    pub year: i32,
    pub reason: String,
}

/// Outcome of screening many companies for one year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub year: i32,
    /// Decisions in input order
    pub decisions: Vec<PipelineDecision>,
    pub skipped: Vec<SkippedRecord>,
}

impl ScreeningReport {
    /// Companies recommended for investment.
    pub fn investable(&self) -> Vec<&str> {
        self.decisions
            .iter()
            .filter(|d| d.investable.is_yes())
            .map(|d| d.company.as_str())
            .collect()
    }

    pub fn get(&self, company: &str) -> Option<&PipelineDecision> {
        self.decisions.iter().find(|d| d.company == company)
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        let total = self.decisions.len();
        let yes = self.investable().len();
        format!(
            "Screened {} companies for {}: {} investable ({:.1}%), {} skipped",
            total,
            self.year,
            yes,
            if total > 0 {
                (yes as f64 / total as f64) * 100.0
            } else {
                0.0
            },
            self.skipped.len()
        )
    }
}

/// Learning result for one network during a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRefresh {
    pub network: String,
    pub outcome: LearnOutcome,
    /// CPTs installed in the model
    pub replaced: usize,
}
