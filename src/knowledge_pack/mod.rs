//! Read-only provider of per-category candidate service names and compact
//! per-service metadata (§4.2). Contract only in the original system; we
//! implement the contract plus one file-backed provider and one in-memory
//! provider so the pipeline is runnable end to end without a real dataset.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CostPilotError, Result};

pub const UNKNOWN_SENTINEL: &str = "UNKNOWN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMetadata {
    #[serde(default)]
    pub top_tokens: Vec<String>,
    #[serde(default)]
    pub sample_products: Vec<String>,
    #[serde(default)]
    pub sample_skus: Vec<String>,
    #[serde(default)]
    pub sample_meters: Vec<String>,
    #[serde(default)]
    pub sample_arm_skus: Vec<String>,
}

const MAX_METADATA_SERVICES: usize = 25;
const MAX_SAMPLES_PER_AXIS: usize = 8;

pub trait KnowledgePack: Send + Sync {
    /// Ordered, unique candidate service names for a category. Never
    /// contains the sentinel `"UNKNOWN"` (§4.2).
    fn candidates_for_category(&self, category: &str) -> Vec<String>;

    /// Compact per-service metadata, capped to ≤25 services with ≤8
    /// samples per axis (§4.2).
    fn compact_metadata(&self) -> HashMap<String, ServiceMetadata>;

    fn hash(&self) -> String;
}

/// On-disk JSON document: `{category: [serviceName, ...], metadata:
/// {service: ServiceMetadata}}`, loaded once at construction.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct PackDocument {
    #[serde(default)]
    categories: HashMap<String, Vec<String>>,
    #[serde(default)]
    metadata: HashMap<String, ServiceMetadata>,
}

pub struct JsonKnowledgePack {
    document: PackDocument,
    hash: String,
}

impl JsonKnowledgePack {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let document: PackDocument = serde_json::from_str(&raw)?;
        let hash = format!("{:x}", {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(raw.as_bytes());
            hasher.finalize()
        });
        Ok(Self { document, hash })
    }
}

impl KnowledgePack for JsonKnowledgePack {
    fn candidates_for_category(&self, category: &str) -> Vec<String> {
        self.document
            .categories
            .get(category)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|s| s != UNKNOWN_SENTINEL)
            .collect()
    }

    fn compact_metadata(&self) -> HashMap<String, ServiceMetadata> {
        cap_metadata(&self.document.metadata)
    }

    fn hash(&self) -> String {
        self.hash.clone()
    }
}

/// In-memory knowledge pack built from a `HashMap`, used by tests and to
/// embed small built-in defaults without touching the filesystem.
#[derive(Default)]
pub struct StaticKnowledgePack {
    categories: HashMap<String, Vec<String>>,
    metadata: HashMap<String, ServiceMetadata>,
}

impl StaticKnowledgePack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>, services: Vec<String>) -> Self {
        self.categories.insert(category.into(), services);
        self
    }

    pub fn with_metadata(mut self, service: impl Into<String>, metadata: ServiceMetadata) -> Self {
        self.metadata.insert(service.into(), metadata);
        self
    }
}

impl KnowledgePack for StaticKnowledgePack {
    fn candidates_for_category(&self, category: &str) -> Vec<String> {
        self.categories
            .get(category)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|s| s != UNKNOWN_SENTINEL)
            .collect()
    }

    fn compact_metadata(&self) -> HashMap<String, ServiceMetadata> {
        cap_metadata(&self.metadata)
    }

    fn hash(&self) -> String {
        "static-in-memory".to_string()
    }
}

fn cap_metadata(source: &HashMap<String, ServiceMetadata>) -> HashMap<String, ServiceMetadata> {
    source
        .iter()
        .take(MAX_METADATA_SERVICES)
        .map(|(service, meta)| {
            let capped = ServiceMetadata {
                top_tokens: cap_vec(&meta.top_tokens),
                sample_products: cap_vec(&meta.sample_products),
                sample_skus: cap_vec(&meta.sample_skus),
                sample_meters: cap_vec(&meta.sample_meters),
                sample_arm_skus: cap_vec(&meta.sample_arm_skus),
            };
            (service.clone(), capped)
        })
        .collect()
}

fn cap_vec(values: &[String]) -> Vec<String> {
    values.iter().take(MAX_SAMPLES_PER_AXIS).cloned().collect()
}

/// Used by `Planner`/`Repairer` to fail loudly if a category has no
/// configured candidates at all, rather than silently proceeding with an
/// empty hint list (caller decides whether that's fatal).
pub fn require_non_empty_candidates(pack: &dyn KnowledgePack, category: &str) -> Result<Vec<String>> {
    let candidates = pack.candidates_for_category(category);
    if candidates.is_empty() {
        return Err(CostPilotError::config(format!(
            "knowledge pack has no candidate services for category {category}"
        )));
    }
    Ok(candidates)
}
