//! Attribute sensitivity classification and anonymization-engine gateway.
//!
//! Values of a data source are labelled by nearest-neighbor vote against
//! reference label sets, mapped to sensitivity levels through a policy
//! table, and handed with a predicted requester trust score to an external
//! anonymization engine whose results are paired back per value.

pub mod api;
pub mod config;
pub mod data_classifier;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod level;
pub mod sensitivity;
pub mod services;
pub mod source;
pub mod trust;
pub mod utils;

pub use error::{PipelineError, Result};
pub use level::{Level, SensitivityLevel, TrustScore};
pub use services::Services;
