use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::oneshot;

use crate::engine::protocol::AnonymizedCell;
use crate::engine::EngineMetrics;
use crate::error::PipelineError;
use crate::level::{SensitivityLevel, TrustScore};
use crate::sensitivity::ComplianceRecord;
use crate::source::SourceMetadata;

/// Who is asking, for what, and which attributes of which source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub requester_email: String,
    pub requested_domain: String,
    pub purpose: String,
    #[serde(rename = "source")]
    pub source_identifier: String,
    #[serde(rename = "attributes")]
    pub selected_attributes: Vec<String>,
}

impl RequestContext {
    /// Rejects requests that cannot be processed at all
    pub fn validate(&self) -> Result<(), String> {
        if self.requester_email.trim().is_empty() {
            return Err("requester_email must not be empty".to_string());
        }
        if self.source_identifier.trim().is_empty() {
            return Err("source must not be empty".to_string());
        }
        if self.selected_attributes.iter().all(|a| a.trim().is_empty()) {
            return Err("at least one attribute must be selected".to_string());
        }
        Ok(())
    }
}

/// Internal job structure for the worker queue
#[derive(Debug)]
pub struct PipelineJob {
    pub request: RequestContext,
    pub response_tx: oneshot::Sender<Result<RequestReport, PipelineError>>,
}

/// One distinct value with its labels, sensitivity and engine result
#[derive(Debug, Clone, Serialize)]
pub struct ValueReport {
    pub attribute: String,
    pub value: String,
    pub domain_label: String,
    pub domain_neighbors: Vec<String>,
    pub owner_label: String,
    pub owner_neighbors: Vec<String>,
    pub sensitivity: SensitivityLevel,
    /// `None` when the engine produced no usable output
    pub anonymized: Option<AnonymizedCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Success,
    /// Nothing to anonymize; the engine was not invoked
    Skipped,
    Timeout,
    Failed,
    ProtocolMismatch,
}

impl EngineStatus {
    pub fn from_error(error: &PipelineError) -> Self {
        match error {
            PipelineError::SubprocessTimeout(_) => EngineStatus::Timeout,
            PipelineError::ProtocolMismatch(_) => EngineStatus::ProtocolMismatch,
            _ => EngineStatus::Failed,
        }
    }
}

/// What happened at the engine boundary
#[derive(Debug, Clone, Serialize)]
pub struct EngineSummary {
    pub status: EngineStatus,
    pub protocol_version: u32,
    pub error_kind: Option<&'static str>,
    pub message: Option<String>,
    #[serde(flatten)]
    pub metrics: EngineMetrics,
    pub retained_output: Option<PathBuf>,
    pub elapsed_ms: Option<u64>,
}

impl EngineSummary {
    pub fn skipped() -> Self {
        Self {
            status: EngineStatus::Skipped,
            protocol_version: crate::engine::PROTOCOL_VERSION,
            error_kind: None,
            message: Some("no values to anonymize".to_string()),
            metrics: EngineMetrics::default(),
            retained_output: None,
            elapsed_ms: None,
        }
    }
}

/// Everything rendered back for one request
#[derive(Debug, Clone, Serialize)]
pub struct RequestReport {
    /// Correlates the report with log lines
    pub request_id: String,
    pub requester_email: String,
    pub source: String,
    pub source_metadata: SourceMetadata,
    /// Policy notes for the source's declared (domain, owner) pair
    pub compliance: ComplianceRecord,
    pub trust_score: TrustScore,
    pub overall_sensitivity: SensitivityLevel,
    pub values: Vec<ValueReport>,
    pub engine: EngineSummary,
    pub warnings: Vec<String>,
}

impl RequestReport {
    /// True when the engine anonymized every value it was given
    pub fn is_complete(&self) -> bool {
        self.engine.status == EngineStatus::Success
            && self
                .values
                .iter()
                .all(|v| matches!(&v.anonymized, Some(cell) if !cell.is_missing()))
    }
}

/// Health status response for the /health endpoint
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// healthy, degraded or unhealthy
    pub status: String,
    pub workers: usize,
    pub queue_capacity: usize,
    pub queue_available: usize,
    pub uptime_secs: u64,
}

/// Column names of a data source
#[derive(Debug, Serialize)]
pub struct SourceAttributes {
    pub source: String,
    pub attributes: Vec<String>,
}

/// Error response for API endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always "error"
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
