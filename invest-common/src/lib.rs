//! INVEST Common - Shared configuration, errors, and logging for the INVEST
//! decision networks.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and span helpers
//! - Label token utilities

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    AblationTarget, Config, LearningConfig, NetworkConfig, ObservabilityConfig, PipelineConfig,
    ScoringMethod,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{AblationTarget, Config, LearningConfig, ScoringMethod};
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
