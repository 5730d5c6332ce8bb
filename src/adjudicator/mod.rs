//! Phase 5 — Adjudicator. An optional LLM pass that picks one candidate
//! from the Scorer's top-K, honoring an exact requested SKU when one
//! exists.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Candidate, Resource};
use crate::error::Result;
use crate::llm::{ChatMessage, ChatRequest, LlmClient};

#[derive(Debug, Clone)]
pub enum AdjudicationPolicy {
    /// Pick `candidates[0]` if any; no LLM call.
    Off,
    /// If any candidate's `sku_name` equals the resource's requested
    /// `arm_sku_name`, pick the cheapest such candidate and skip the LLM
    /// entirely. Skipping the LLM this way is unconditional within this
    /// variant — it never falls through to the `Llm` policy, even when no
    /// exact match exists.
    ForceExact,
    /// Send the top `top_k` candidates (≤5) to the LLM with minimal
    /// fields; it must return the index of one. Out-of-range or
    /// unparseable responses fall back to `candidates[0]`.
    Llm { top_k: usize },
}

#[derive(Debug, Serialize)]
struct CandidateSummary<'a> {
    index: usize,
    service_name: &'a str,
    product_name: &'a str,
    sku_name: &'a str,
    meter_name: &'a str,
    unit_of_measure: &'a str,
    retail_price: String,
}

#[derive(Debug, Deserialize)]
struct AdjudicationResponse {
    index: i64,
    #[serde(default)]
    #[allow(dead_code)]
    reason: String,
}

pub struct Adjudicator {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl Adjudicator {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// `adjudicate(resource, top_k_candidates, policy) -> selected_candidate
    /// | None`. `candidates` is assumed already sorted by the Scorer
    /// (score desc, price asc, meter name asc); `None` in, `None` out.
    pub async fn adjudicate<'a>(
        &self,
        resource: &Resource,
        candidates: &'a [Candidate],
        policy: &AdjudicationPolicy,
    ) -> Option<&'a Candidate> {
        if candidates.is_empty() {
            return None;
        }

        match policy {
            AdjudicationPolicy::Off => candidates.first(),
            AdjudicationPolicy::ForceExact => {
                if let Some(exact) = Self::cheapest_exact_sku(resource, candidates) {
                    return Some(exact);
                }
                candidates.first()
            }
            AdjudicationPolicy::Llm { top_k } => self.adjudicate_via_llm(resource, candidates, *top_k).await,
        }
    }

    /// Tie-breakers within `force_exact`: lower unit price, then
    /// earlier `effectiveStartDate`, then lexicographic `meterName`.
    fn cheapest_exact_sku<'a>(resource: &Resource, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        let requested = resource.arm_sku_name.as_deref()?;
        if requested.is_empty() {
            return None;
        }
        candidates
            .iter()
            .filter(|c| c.row.sku_name == requested)
            .min_by(|a, b| {
                a.row
                    .retail_price
                    .cmp(&b.row.retail_price)
                    .then(a.row.effective_start_date.cmp(&b.row.effective_start_date))
                    .then(a.row.meter_name.cmp(&b.row.meter_name))
            })
    }

    async fn adjudicate_via_llm<'a>(
        &self,
        resource: &Resource,
        candidates: &'a [Candidate],
        top_k: usize,
    ) -> Option<&'a Candidate> {
        let k = top_k.min(candidates.len()).min(5);
        let slice = &candidates[..k];

        let summaries: Vec<CandidateSummary> = slice
            .iter()
            .enumerate()
            .map(|(index, c)| CandidateSummary {
                index,
                service_name: &c.row.service_name,
                product_name: &c.row.product_name,
                sku_name: &c.row.sku_name,
                meter_name: &c.row.meter_name,
                unit_of_measure: &c.row.unit_of_measure,
                retail_price: c.row.retail_price.to_string(),
            })
            .collect();

        let system = "You select exactly one Azure Retail Prices candidate by index. \
                      Respond with a single JSON object {\"index\": <int>, \"reason\": \"<one line>\"}. \
                      Never invent fields or candidates outside the list."
            .to_string();
        let user = format!(
            "Resource id={} category={} requested_sku={:?}. Candidates: {}",
            resource.id,
            resource.category,
            resource.arm_sku_name,
            serde_json::to_string(&summaries).unwrap_or_default()
        );

        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)], self.model.clone());

        match self.llm.complete(request).await {
            Ok(raw) => match serde_json::from_str::<AdjudicationResponse>(&raw) {
                Ok(parsed) if parsed.index >= 0 && (parsed.index as usize) < slice.len() => {
                    Some(&slice[parsed.index as usize])
                }
                Ok(parsed) => {
                    warn!(resource_id = %resource.id, index = parsed.index, "adjudicator returned out-of-range index, falling back to candidates[0]");
                    candidates.first()
                }
                Err(err) => {
                    warn!(resource_id = %resource.id, error = %err, "adjudicator response was not valid JSON, falling back to candidates[0]");
                    candidates.first()
                }
            },
            Err(err) => {
                warn!(resource_id = %resource.id, error = %err, "adjudicator LLM call failed, falling back to candidates[0]");
                candidates.first()
            }
        }
    }
}
