//! Crate-wide error type.
//!
//! One flat enum covers every error kind named in the pipeline design,
//! mirroring the teacher's `CostOpsError`: a single `thiserror` enum with
//! `#[from]` conversions for the transport/serialization boundary, plus
//! string-carrying variants for domain-specific failures.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CostPilotError>;

#[derive(Error, Debug)]
pub enum CostPilotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("configuration error: {0}")]
    Config(String),

    /// Phase1 — fatal. The planner could not produce a valid plan within
    /// the bounded number of repair attempts.
    #[error("planner failed after {attempts} attempt(s): {errors:?}")]
    Planner {
        attempts: u32,
        errors: Vec<String>,
    },

    /// Phase2 — fatal. The plan did not pass schema validation even after
    /// repair.
    #[error("plan validation failed: {0:?}")]
    Validation(Vec<String>),

    /// Phase2 — recoverable. A repair patch attempted to touch a field
    /// outside the whitelist, or proposed a service_name outside the
    /// knowledge pack's candidate list.
    #[error("repair patch rejected for resource {resource_id}: {reason}")]
    RepairRejected { resource_id: String, reason: String },

    /// Phase3 — per-shard. Transport failure surviving all retries.
    #[error("catalog fetch failed for shard {shard}: {reason}")]
    CatalogFetch { shard: String, reason: String },

    /// Phase4 — per-resource. No candidate survived the hard service
    /// prefilter; maps to `pricing_status = missing`.
    #[error("no scoring candidates for resource {resource_id}")]
    ScoringEmpty { resource_id: String },

    /// Phase6 — per-resource. The selected row's unit of measure could
    /// not be mapped to the category's quantity formula; maps to
    /// `pricing_status = sku_mismatch`.
    #[error("unit mismatch for resource {resource_id}: {reason}")]
    UnitMismatch { resource_id: String, reason: String },

    /// Phase5 — per-resource, recoverable. The adjudicator's LLM call
    /// failed or returned an out-of-range index; caller falls back to
    /// `candidates[0]`.
    #[error("adjudicator error for resource {resource_id}: {reason}")]
    Adjudicator { resource_id: String, reason: String },

    /// Best-effort. The run continues; a terminal warning is logged.
    #[error("trace write error: {0}")]
    TraceWrite(String),

    #[error("LLM call failed: {0}")]
    LlmCall(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl CostPilotError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        CostPilotError::Config(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        CostPilotError::Internal(msg.into())
    }

    /// Whether the underlying condition is worth retrying (used by
    /// `RetryPolicy`). Validation/config/internal errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CostPilotError::Http(_) | CostPilotError::Io(_) | CostPilotError::LlmCall(_)
        )
    }
}
