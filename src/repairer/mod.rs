//! Phase 2 — Repairer. Identifies resources whose pricing-identification
//! fields are unresolved, asks an LLM for a bounded, whitelisted patch,
//! and applies only the allowed field changes (§4.5).

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::domain::plan::UNKNOWN_SERVICE;
use crate::domain::{Plan, Resource};
use crate::error::{CostPilotError, Result};
use crate::knowledge_pack::KnowledgePack;
use crate::llm::{ChatMessage, ChatRequest, LlmClient};
use crate::schema::{self, FieldChange};

const MAX_HINT_TOKENS: usize = 3;
const MAX_SERVICE_SUGGESTIONS: usize = 3;

/// One resource's proposed patch, as parsed from the LLM's JSON response.
/// Only fields present in `schema::mutable_hint_fields()` are accepted;
/// anything else is rejected wholesale for that resource (§4.5: "Any
/// attempt to change other fields yields a rejected patch").
#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ProposedPatch {
    #[serde(default)]
    service_name: Option<String>,
    #[serde(default)]
    arm_sku_name: Option<String>,
    #[serde(default)]
    product_name_contains: Option<Vec<String>>,
    #[serde(default)]
    sku_name_contains: Option<Vec<String>>,
    #[serde(default)]
    meter_name_contains: Option<Vec<String>>,
    #[serde(default)]
    arm_sku_name_contains: Option<Vec<String>>,
    #[serde(default)]
    service_name_suggestions: Option<Vec<String>>,
    /// Anything else the LLM included, captured so `apply_patch` can
    /// reject the whole patch when extraneous keys are present.
    #[serde(flatten)]
    extra: std::collections::HashMap<String, Value>,
}

pub struct Repairer {
    llm: Arc<dyn LlmClient>,
    pack: Arc<dyn KnowledgePack>,
    model: String,
}

impl Repairer {
    pub fn new(llm: Arc<dyn LlmClient>, pack: Arc<dyn KnowledgePack>, model: impl Into<String>) -> Self {
        Self {
            llm,
            pack,
            model: model.into(),
        }
    }

    /// §4.5 trigger rule.
    fn is_repair_target(resource: &Resource) -> bool {
        resource.is_unknown_service() || (resource.category_in_repair_scope() && resource.hints_all_empty())
    }

    /// `repair(plan) -> plan', applied_patches[]`. Increments
    /// `plan.metadata.repair_iterations` by one per invocation (not per
    /// resource). Re-runs `PlanSchema::validate` after applying accepted
    /// patches; new errors abort the run (§4.5).
    pub async fn repair(&self, mut plan: Plan) -> Result<(Plan, Vec<FieldChange>)> {
        let before = plan.clone_for_diff();
        plan.metadata.repair_iterations += 1;

        let targets: Vec<(String, String)> = plan
            .scenarios
            .iter()
            .flat_map(|s| s.resources.iter().map(move |r| (s.id.clone(), r.id.clone())))
            .filter(|(scenario_id, resource_id)| {
                plan.scenarios
                    .iter()
                    .find(|s| &s.id == scenario_id)
                    .and_then(|s| s.resources.iter().find(|r| &r.id == resource_id))
                    .map(Self::is_repair_target)
                    .unwrap_or(false)
            })
            .collect();

        for (scenario_id, resource_id) in targets {
            let prompt_snapshot = {
                let scenario = plan.scenarios.iter().find(|s| s.id == scenario_id).expect("scenario exists");
                scenario.resources.iter().find(|r| r.id == resource_id).expect("resource exists").clone()
            };

            let candidates = self.pack.candidates_for_category(prompt_snapshot.category.as_str());
            let raw = match self.call_llm(&prompt_snapshot, &candidates).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(resource_id, error = %err, "repair LLM call failed, resource left unchanged");
                    continue;
                }
            };

            let parsed: ProposedPatch = match serde_json::from_str(&raw) {
                Ok(p) => p,
                Err(err) => {
                    warn!(resource_id, error = %err, "repair response was not valid JSON, resource left unchanged");
                    continue;
                }
            };

            let scenario = plan.scenarios.iter_mut().find(|s| s.id == scenario_id).expect("scenario exists");
            let resource = scenario.resources.iter_mut().find(|r| r.id == resource_id).expect("resource exists");

            if let Err(err) = apply_patch(resource, parsed, &candidates) {
                warn!(resource_id, error = %err, "repair patch rejected");
            }
        }

        let (ok, errors) = schema::validate(&plan, self.pack.as_ref());
        if !ok {
            return Err(CostPilotError::Validation(errors));
        }

        let applied_patches = schema::diff(&before, &plan);
        Ok((plan, applied_patches))
    }

    async fn call_llm(&self, resource: &Resource, candidates: &[String]) -> Result<String> {
        let system = format!(
            "You repair Azure pricing-identification fields. You may only set: service_name, \
             arm_sku_name, product_name_contains, sku_name_contains, meter_name_contains, \
             arm_sku_name_contains, service_name_suggestions. service_name must be one of: {} \
             or the literal UNKNOWN_SERVICE. Respond with a single JSON object with only those keys.",
            candidates.join(", ")
        );
        let user = format!(
            "Resource id={} category={} current service_name={}. Propose a patch.",
            resource.id, resource.category, resource.service_name
        );
        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)], self.model.clone());
        self.llm.complete(request).await
    }
}

/// Applies a proposed patch to `resource` in place. Rejects the whole
/// patch (no partial application) if it contains any non-whitelisted key,
/// an unrecognized `service_name`, or more than `MAX_HINT_TOKENS` tokens
/// in a hint array beyond what gets silently clipped per §4.5 ("clipped
/// to at most 3 tokens" — so clipping, not rejection, for over-long hints).
fn apply_patch(resource: &mut Resource, patch: ProposedPatch, candidates: &[String]) -> Result<()> {
    if !patch.extra.is_empty() {
        let keys: Vec<String> = patch.extra.keys().cloned().collect();
        return Err(CostPilotError::RepairRejected {
            resource_id: resource.id.clone(),
            reason: format!("patch attempted to set non-whitelisted fields: {}", keys.join(", ")),
        });
    }

    if let Some(service_name) = &patch.service_name {
        let is_allowed = service_name == UNKNOWN_SERVICE || candidates.iter().any(|c| c == service_name);
        if !is_allowed {
            return Err(CostPilotError::RepairRejected {
                resource_id: resource.id.clone(),
                reason: format!("service_name '{service_name}' is not a known candidate"),
            });
        }
        // Monotonicity rule (§4.3): never regress a resolved service_name
        // back to UNKNOWN_SERVICE.
        if service_name == UNKNOWN_SERVICE && resource.service_name != UNKNOWN_SERVICE {
            return Err(CostPilotError::RepairRejected {
                resource_id: resource.id.clone(),
                reason: "cannot regress a resolved service_name to UNKNOWN_SERVICE".to_string(),
            });
        }
        resource.service_name = service_name.clone();
    }

    if let Some(arm_sku_name) = patch.arm_sku_name {
        resource.arm_sku_name = Some(arm_sku_name);
    }
    if let Some(tokens) = patch.product_name_contains {
        resource.product_name_contains = clip_tokens(tokens);
    }
    if let Some(tokens) = patch.sku_name_contains {
        resource.sku_name_contains = clip_tokens(tokens);
    }
    if let Some(tokens) = patch.meter_name_contains {
        resource.meter_name_contains = clip_tokens(tokens);
    }
    if let Some(tokens) = patch.arm_sku_name_contains {
        resource.arm_sku_name_contains = clip_tokens(tokens);
    }
    if let Some(suggestions) = patch.service_name_suggestions {
        resource.service_name_suggestions = suggestions.into_iter().take(MAX_SERVICE_SUGGESTIONS).collect();
    }

    Ok(())
}

fn clip_tokens(tokens: Vec<String>) -> Vec<String> {
    tokens.into_iter().take(MAX_HINT_TOKENS).collect()
}

impl Plan {
    /// Cheap deep copy used to diff before/after repair snapshots.
    fn clone_for_diff(&self) -> Plan {
        self.clone()
    }
}
