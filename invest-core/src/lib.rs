//! INVEST Core - Decision-network engine for share screening.
//!
//! This crate provides:
//! - Influence-diagram construction with CPT and utility validation
//! - Exact inference over a cluster tree with backward induction for decisions
//! - CPT learning with MLE, BIC and MDL scoring and EM for missing data
//! - The Value, Quality and Recommendation networks
//! - The decision pipeline that chains them for each company

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod error;
pub mod graph;
pub mod inference;
pub mod learning;
pub mod networks;
pub mod pipeline;

pub use error::{Error, InferenceNonConvergence, LearningDataError, Result};
pub use graph::{GraphModel, GraphModelBuilder, NodeId, NodeKind};
pub use inference::{evaluate, posterior, Evaluation, Evidence, Finding};
pub use learning::{CptSet, LearnOutcome, LearningReport, ObservationTable, ParameterLearner};
pub use networks::Networks;
pub use pipeline::{CompanyEvidence, DecisionPipeline, EvidenceProjector, PipelineDecision};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::graph::{GraphModel, GraphModelBuilder};
    pub use crate::inference::{evaluate, Evidence};
    pub use crate::learning::{LearnOutcome, ObservationTable, ParameterLearner};
    pub use crate::networks::{
        Comparison, InflationComparison, Investable, Networks, Performance, PriceLevel,
        QualityLevel, SystematicRisk,
    };
    pub use crate::pipeline::{CompanyEvidence, DecisionPipeline, StaticProjector};
}
