//! `PlanSchema`: validation, normalization, and diffing of a `Plan`.
//! Grounded on the teacher's `domain::usage::UsageRecord::validate` style
//! (plain functions over the domain struct, collecting all errors rather
//! than short-circuiting on the first one).

use std::collections::HashSet;

use crate::domain::{Plan, Resource};
use crate::error::{CostPilotError, Result};
use crate::knowledge_pack::{KnowledgePack, UNKNOWN_SENTINEL};

pub const UNKNOWN_SERVICE: &str = crate::domain::plan::UNKNOWN_SERVICE;

const MUTABLE_HINT_FIELDS: &[&str] = &[
    "service_name",
    "arm_sku_name",
    "product_name_contains",
    "sku_name_contains",
    "meter_name_contains",
    "arm_sku_name_contains",
    "service_name_suggestions",
];

/// A single field-level change between two snapshots of the same resource,
/// restricted to the pricing-identification fields. Used by the Repairer
/// to report `applied_patches[]` and by tests asserting the repair
/// whitelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub scenario_id: String,
    pub resource_id: String,
    pub field: String,
    pub before: String,
    pub after: String,
}

/// `validate(plan) -> (ok, errors[])`. Collects every violation instead of
/// stopping at the first, matching the teacher's `validate()` idiom of
/// returning a `Vec<String>` of accumulated problems.
pub fn validate(plan: &Plan, pack: &dyn KnowledgePack) -> (bool, Vec<String>) {
    let mut errors = Vec::new();

    if let Err(CostPilotError::Validation(id_errors)) = plan.check_id_uniqueness() {
        errors.extend(id_errors);
    }

    for scenario in &plan.scenarios {
        for resource in &scenario.resources {
            if let Err(msg) = validate_canonical_service(resource, pack) {
                errors.push(format!("{}/{}: {}", scenario.id, resource.id, msg));
            }
        }
    }

    (errors.is_empty(), errors)
}

/// Canonical-service rule: `service_name` must equal either a
/// candidate for the resource's category, or the literal
/// `"UNKNOWN_SERVICE"`.
fn validate_canonical_service(resource: &Resource, pack: &dyn KnowledgePack) -> std::result::Result<(), String> {
    if resource.service_name == UNKNOWN_SERVICE {
        return Ok(());
    }
    if resource.service_name == UNKNOWN_SENTINEL {
        return Err(format!(
            "service_name must not be the bare sentinel '{UNKNOWN_SENTINEL}'; use '{UNKNOWN_SERVICE}'"
        ));
    }
    let candidates = pack.candidates_for_category(resource.category.as_str());
    if candidates.iter().any(|c| c == &resource.service_name) {
        Ok(())
    } else {
        Err(format!(
            "service_name '{}' is not a known candidate for category {}",
            resource.service_name, resource.category
        ))
    }
}

/// `normalize(plan) -> plan'`: strips unreachable state and coerces null
/// hint arrays to empty vectors. Since `Resource`'s hint fields already
/// deserialize with `#[serde(default)]`, normalization here is limited to
/// clamping malformed string content (blank tokens, duplicate tokens).
pub fn normalize(mut plan: Plan) -> Plan {
    for scenario in &mut plan.scenarios {
        for resource in &mut scenario.resources {
            dedupe_and_trim(&mut resource.product_name_contains);
            dedupe_and_trim(&mut resource.sku_name_contains);
            dedupe_and_trim(&mut resource.meter_name_contains);
            dedupe_and_trim(&mut resource.arm_sku_name_contains);
            dedupe_and_trim(&mut resource.service_name_suggestions);
        }
    }
    plan
}

fn dedupe_and_trim(tokens: &mut Vec<String>) {
    let mut seen = HashSet::new();
    tokens.retain_mut(|t| {
        *t = t.trim().to_string();
        !t.is_empty() && seen.insert(t.clone())
    });
}

/// Diffs the pricing-identification fields of two snapshots of the same
/// plan, restricted to `MUTABLE_HINT_FIELDS`. Resource ids are only unique
/// *within* a scenario (§3) — the same id commonly appears in every
/// scenario describing the same logical resource at a different SKU — so
/// prior snapshots are keyed on `(scenario_id, resource_id)`, never on
/// resource id alone. Anything outside `MUTABLE_HINT_FIELDS` is never
/// reported since validate_patch already rejects attempts to change it
/// before this runs.
pub fn diff(before: &Plan, after: &Plan) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    let before_resources: std::collections::HashMap<(&str, &str), &Resource> = before
        .scenarios
        .iter()
        .flat_map(|s| s.resources.iter().map(move |r| ((s.id.as_str(), r.id.as_str()), r)))
        .collect();

    for scenario in &after.scenarios {
        for resource in &scenario.resources {
            let Some(prior) = before_resources.get(&(scenario.id.as_str(), resource.id.as_str())) else {
                continue;
            };
            push_if_changed(&mut changes, &scenario.id, &resource.id, "service_name", &prior.service_name, &resource.service_name);
            push_if_changed(
                &mut changes,
                &scenario.id,
                &resource.id,
                "arm_sku_name",
                &prior.arm_sku_name.clone().unwrap_or_default(),
                &resource.arm_sku_name.clone().unwrap_or_default(),
            );
            push_vec_if_changed(&mut changes, &scenario.id, &resource.id, "product_name_contains", &prior.product_name_contains, &resource.product_name_contains);
            push_vec_if_changed(&mut changes, &scenario.id, &resource.id, "sku_name_contains", &prior.sku_name_contains, &resource.sku_name_contains);
            push_vec_if_changed(&mut changes, &scenario.id, &resource.id, "meter_name_contains", &prior.meter_name_contains, &resource.meter_name_contains);
            push_vec_if_changed(&mut changes, &scenario.id, &resource.id, "arm_sku_name_contains", &prior.arm_sku_name_contains, &resource.arm_sku_name_contains);
            push_vec_if_changed(&mut changes, &scenario.id, &resource.id, "service_name_suggestions", &prior.service_name_suggestions, &resource.service_name_suggestions);
        }
    }

    changes
}

fn push_if_changed(changes: &mut Vec<FieldChange>, scenario_id: &str, resource_id: &str, field: &str, before: &str, after: &str) {
    if before != after {
        changes.push(FieldChange {
            scenario_id: scenario_id.to_string(),
            resource_id: resource_id.to_string(),
            field: field.to_string(),
            before: before.to_string(),
            after: after.to_string(),
        });
    }
}

fn push_vec_if_changed(changes: &mut Vec<FieldChange>, scenario_id: &str, resource_id: &str, field: &str, before: &[String], after: &[String]) {
    if before != after {
        changes.push(FieldChange {
            scenario_id: scenario_id.to_string(),
            resource_id: resource_id.to_string(),
            field: field.to_string(),
            before: before.join(","),
            after: after.join(","),
        });
    }
}

pub fn mutable_hint_fields() -> &'static [&'static str] {
    MUTABLE_HINT_FIELDS
}
