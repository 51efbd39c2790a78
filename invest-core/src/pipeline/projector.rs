//! Evidence Projector interface: per-company discretized signals.
//!
//! Ratio arithmetic and data cleaning live outside this crate. Callers plug
//! their own projector in; [`StaticProjector`] serves precomputed records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::learning::ObservationTable;
use crate::networks::{quality, value};
use crate::networks::{
    Comparison, InflationComparison, Performance, PriceLevel, QualityEvidence, SystematicRisk,
    ValueEvidence,
};

/// Discretized signals for one (company, year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyEvidence {
    pub company: String,
    pub year: i32,
    /// False when the share fails the earnings, equity or beta screen
    #[serde(default = "default_acceptable")]
    pub acceptable: bool,
    #[serde(default)]
    pub pe_market: Option<PriceLevel>,
    #[serde(default)]
    pub pe_sector: Option<PriceLevel>,
    #[serde(default)]
    pub forward_pe: Option<PriceLevel>,
    #[serde(default)]
    pub roe_vs_coe: Option<Comparison>,
    #[serde(default)]
    pub rel_de: Option<Comparison>,
    #[serde(default)]
    pub cagr_vs_inflation: Option<InflationComparison>,
    #[serde(default)]
    pub systematic_risk: Option<SystematicRisk>,
    #[serde(default)]
    pub future_performance: Option<Performance>,
}

fn default_acceptable() -> bool {
    true
}

impl CompanyEvidence {
    /// An acceptable company with no signals yet.
    pub fn new(company: impl Into<String>, year: i32) -> Self {
        Self {
            company: company.into(),
            year,
            acceptable: true,
            pe_market: None,
            pe_sector: None,
            forward_pe: None,
            roe_vs_coe: None,
            rel_de: None,
            cagr_vs_inflation: None,
            systematic_risk: None,
            future_performance: None,
        }
    }

    pub fn value_evidence(&self) -> ValueEvidence {
        ValueEvidence {
            pe_market: self.pe_market,
            pe_sector: self.pe_sector,
            forward_pe: self.forward_pe,
            future_performance: self.future_performance,
        }
    }

    pub fn quality_evidence(&self) -> QualityEvidence {
        QualityEvidence {
            cagr_vs_inflation: self.cagr_vs_inflation,
            roe_vs_coe: self.roe_vs_coe,
            rel_de: self.rel_de,
            systematic_risk: self.systematic_risk,
        }
    }

    /// Signals as (chance node, label) pairs, for observation tables.
    pub fn to_record(&self) -> Vec<(&'static str, Option<&'static str>)> {
        vec![
            (value::PE_MARKET, self.pe_market.map(PriceLevel::as_str)),
            (value::PE_SECTOR, self.pe_sector.map(PriceLevel::as_str)),
            (value::FORWARD_PE, self.forward_pe.map(PriceLevel::as_str)),
            (
                value::FUTURE_SHARE_PERFORMANCE,
                self.future_performance.map(Performance::as_str),
            ),
            (quality::ROE_VS_COE, self.roe_vs_coe.map(Comparison::as_str)),
            (quality::REL_DE, self.rel_de.map(Comparison::as_str)),
            (
                quality::CAGR_VS_INFLATION,
                self.cagr_vs_inflation.map(InflationComparison::as_str),
            ),
            (
                quality::SYSTEMATIC_RISK,
                self.systematic_risk.map(SystematicRisk::as_str),
            ),
        ]
    }
}

/// Observation table with one row per record.
pub fn observations<'a>(records: impl IntoIterator<Item = &'a CompanyEvidence>) -> ObservationTable {
    let mut table = ObservationTable::default();
    for record in records {
        table.push_record(record.to_record());
    }
    table
}

/// Source of projected evidence.
pub trait EvidenceProjector: Send + Sync {
    /// Signals for `company` in `year`, or `None` when there is no data.
    fn project(&self, company: &str, year: i32) -> Option<CompanyEvidence>;

    /// Companies with data in `year`.
    fn companies(&self, year: i32) -> Vec<String>;
}

/// In-memory projector keyed by (company, year).
#[derive(Debug, Clone, Default)]
pub struct StaticProjector {
    records: BTreeMap<(String, i32), CompanyEvidence>,
}

impl StaticProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record.
    pub fn insert(&mut self, record: CompanyEvidence) {
        self.records
            .insert((record.company.clone(), record.year), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &CompanyEvidence> {
        self.records.values()
    }
}

impl FromIterator<CompanyEvidence> for StaticProjector {
    fn from_iter<I: IntoIterator<Item = CompanyEvidence>>(iter: I) -> Self {
        let mut projector = Self::new();
        for record in iter {
            projector.insert(record);
        }
        projector
    }
}

impl EvidenceProjector for StaticProjector {
    fn project(&self, company: &str, year: i32) -> Option<CompanyEvidence> {
        self.records.get(&(company.to_string(), year)).cloned()
    }

    fn companies(&self, year: i32) -> Vec<String> {
        self.records
            .keys()
            .filter(|(_, y)| *y == year)
            .map(|(c, _)| c.clone())
            .collect()
    }
}
