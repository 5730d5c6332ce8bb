//! Phase 4 — deterministic scoring of catalog rows against a resource's
//! hints (§4.6). The hard service-name prefilter discards everything
//! outside an exact match; the remainder is a weighted sum of token and
//! billing-model features, ties broken by price then meter name.

use std::collections::HashSet;

use crate::domain::catalog::{CatalogRow, CatalogRowType};
use crate::domain::plan::BillingModel;
use crate::domain::{Candidate, CatalogShard, Resource};

const PENALTY_TOKENS_DEFAULT: &[&str] = &["Backup", "Vaulted", "LTR"];
const PENALTY_TOKENS_ALWAYS: &[&str] = &["Promo"];

pub struct Scorer;

impl Scorer {
    /// `score(resource, shard) -> ordered candidates[]`. Empty when no row
    /// survives the hard `serviceName` prefilter (§4.6).
    pub fn score(resource: &Resource, shard: &CatalogShard) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = shard
            .rows
            .iter()
            .filter(|row| row.service_name == resource.service_name)
            .map(|row| {
                let (score, reasons) = score_row(resource, row);
                Candidate {
                    row: row.clone(),
                    score,
                    reasons,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.row.retail_price.cmp(&b.row.retail_price))
                .then(a.row.meter_name.cmp(&b.row.meter_name))
        });

        candidates
    }
}

fn score_row(resource: &Resource, row: &CatalogRow) -> (i64, Vec<String>) {
    let mut score: i64 = 0;
    let mut reasons = Vec::new();

    // w2
    if let Some(arm_sku) = &resource.arm_sku_name {
        if !arm_sku.is_empty() && row.arm_sku_name == *arm_sku {
            score += 10;
            reasons.push("exact arm_sku_name match".to_string());
        }
    }

    // w3..w6: token-contains axes, each token counted at most once.
    score += token_axis_score(&resource.arm_sku_name_contains, &row.arm_sku_name, 3, "arm_sku_name_contains", &mut reasons);
    score += token_axis_score(&resource.sku_name_contains, &row.sku_name, 2, "sku_name_contains", &mut reasons);
    score += token_axis_score(&resource.product_name_contains, &row.product_name, 2, "product_name_contains", &mut reasons);
    score += token_axis_score(&resource.meter_name_contains, &row.meter_name, 2, "meter_name_contains", &mut reasons);

    // w7
    if billing_model_matches(resource.billing_model, row) {
        score += 1;
        reasons.push("billing model family match".to_string());
    }

    // w8
    let haystack = format!("{} {}", row.product_name, row.meter_name);
    let penalty_tokens = penalty_tokens_for(resource);
    if penalty_tokens.iter().any(|t| haystack.to_lowercase().contains(&t.to_lowercase())) {
        score -= 5;
        reasons.push("penalty token present".to_string());
    }

    // w9
    if !row.reservation_term.is_empty() && resource.billing_model != BillingModel::Reserved {
        score -= 3;
        reasons.push("reservation term present but billing_model != reserved".to_string());
    }

    // w10
    if row.is_low_priority() && resource.billing_model != BillingModel::Spot {
        score -= 2;
        reasons.push("low priority/spot row but billing_model != spot".to_string());
    }

    (score, reasons)
}

fn token_axis_score(tokens: &[String], field: &str, weight: i64, axis_name: &str, reasons: &mut Vec<String>) -> i64 {
    let field_lower = field.to_lowercase();
    let mut seen = HashSet::new();
    let mut total = 0;
    for token in tokens {
        let token_lower = token.to_lowercase();
        if token_lower.is_empty() || !seen.insert(token_lower.clone()) {
            continue;
        }
        if field_lower.contains(&token_lower) {
            total += weight;
            reasons.push(format!("{axis_name} token '{token}' matched"));
        }
    }
    total
}

fn billing_model_matches(billing_model: BillingModel, row: &CatalogRow) -> bool {
    match billing_model {
        BillingModel::Payg => row.row_type == CatalogRowType::Consumption && !row.is_low_priority(),
        BillingModel::Reserved => row.row_type == CatalogRowType::Reservation,
        BillingModel::DevTest => row.row_type == CatalogRowType::DevTestConsumption,
        BillingModel::Spot => row.row_type == CatalogRowType::Consumption && row.is_low_priority(),
    }
}

fn penalty_tokens_for(resource: &Resource) -> Vec<&'static str> {
    let mut tokens: Vec<&'static str> = PENALTY_TOKENS_ALWAYS.to_vec();
    if resource.category.family() != "backup" {
        tokens.extend(PENALTY_TOKENS_DEFAULT);
    }
    tokens
}
