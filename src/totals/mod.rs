//! Phase 7 (partial) — TotalsEngine. Aggregates per-scenario totals,
//! by-category rollups, and the baseline comparability verdict (§4.9).

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::plan::ResourceCategory;
use crate::domain::{CategoryPlaceholder, PricedLine, PricingStatus, Resource};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub monthly: Decimal,
    pub priced: Decimal,
    pub estimated: Decimal,
    pub missing: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioTotals {
    pub scenario_id: String,
    pub monthly_priced: Decimal,
    pub monthly_estimated: Decimal,
    pub monthly_missing: Decimal,
    pub monthly_with_estimates: Decimal,
    pub yearly_priced: Decimal,
    pub yearly_estimated: Decimal,
    pub yearly_missing: Decimal,
    pub yearly_with_estimates: Decimal,
    pub by_category: HashMap<String, CategoryTotals>,
    pub placeholders: Vec<CategoryPlaceholder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparabilityStatus {
    Comparable,
    NotComparable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaVsBaseline {
    pub status: ComparabilityStatus,
    pub reasons: Vec<String>,
    pub monthly_delta: Option<Decimal>,
    pub yearly_delta: Option<Decimal>,
}

pub struct TotalsEngine;

impl TotalsEngine {
    /// Per-scenario rollup (§4.9). `missing_category_placeholder` is the
    /// flat per-category amount substituted for each *distinct* category
    /// that has at least one `missing` line (§9 open question: flat, not
    /// weighted).
    pub fn compute(scenario_id: &str, lines: &[PricedLine], resources: &[Resource], missing_category_placeholder: Decimal) -> ScenarioTotals {
        let category_by_resource: HashMap<&str, ResourceCategory> =
            resources.iter().map(|r| (r.id.as_str(), r.category)).collect();

        let mut by_category: HashMap<String, CategoryTotals> = HashMap::new();
        let mut monthly_priced = Decimal::ZERO;
        let mut monthly_estimated = Decimal::ZERO;
        let mut missing_categories: HashSet<&'static str> = HashSet::new();

        for line in lines {
            let Some(category) = category_by_resource.get(line.resource_id.as_str()) else {
                continue;
            };
            let entry = by_category.entry(category.as_str().to_string()).or_default();

            match line.pricing_status {
                PricingStatus::Priced => {
                    let amount = line.monthly_cost.unwrap_or(Decimal::ZERO);
                    monthly_priced += amount;
                    entry.priced += amount;
                    entry.monthly += amount;
                }
                PricingStatus::Estimated => {
                    let amount = line.monthly_cost.unwrap_or(Decimal::ZERO);
                    monthly_estimated += amount;
                    entry.estimated += amount;
                    entry.monthly += amount;
                }
                PricingStatus::SkuMismatch => {
                    // A resolved-but-mismatched row still carries a placeholder
                    // monthly_cost (§4.8); it rolls up like an estimate for
                    // totals purposes but never counts toward comparability.
                    let amount = line.monthly_cost.unwrap_or(Decimal::ZERO);
                    monthly_estimated += amount;
                    entry.estimated += amount;
                    entry.monthly += amount;
                }
                PricingStatus::Missing => {
                    missing_categories.insert(category.as_str());
                }
            }
        }

        let mut placeholders = Vec::new();
        let mut monthly_missing = Decimal::ZERO;
        for category in &missing_categories {
            let entry = by_category.entry(category.to_string()).or_default();
            entry.missing += missing_category_placeholder;
            entry.monthly += missing_category_placeholder;
            monthly_missing += missing_category_placeholder;
            placeholders.push(CategoryPlaceholder {
                category: category.to_string(),
                amount: missing_category_placeholder,
                reason: "no pricing candidate survived scoring for this category".to_string(),
            });
        }

        let monthly_with_estimates = monthly_priced + monthly_estimated + monthly_missing;
        let twelve = Decimal::from(12);

        ScenarioTotals {
            scenario_id: scenario_id.to_string(),
            monthly_priced,
            monthly_estimated,
            monthly_missing,
            monthly_with_estimates,
            yearly_priced: monthly_priced * twelve,
            yearly_estimated: monthly_estimated * twelve,
            yearly_missing: monthly_missing * twelve,
            yearly_with_estimates: monthly_with_estimates * twelve,
            by_category,
            placeholders,
        }
    }

    /// Comparability verdict (§4.9): every "required" category resource
    /// must be `priced`/`estimated` (never `missing`) and never
    /// `sku_mismatch`, in both the candidate scenario and baseline.
    pub fn comparability(
        scenario_lines: &[PricedLine],
        scenario_resources: &[Resource],
        baseline_lines: &[PricedLine],
        baseline_resources: &[Resource],
    ) -> DeltaVsBaseline {
        let mut reasons = Vec::new();

        if !required_categories_clean(scenario_lines, scenario_resources, &mut reasons, "scenario")
            || !required_categories_clean(baseline_lines, baseline_resources, &mut reasons, "baseline")
        {
            return DeltaVsBaseline {
                status: ComparabilityStatus::NotComparable,
                reasons,
                monthly_delta: None,
                yearly_delta: None,
            };
        }

        DeltaVsBaseline {
            status: ComparabilityStatus::Comparable,
            reasons,
            monthly_delta: None,
            yearly_delta: None,
        }
    }

    /// Attaches a monthly/yearly delta to an already-computed comparability
    /// verdict, given both scenarios' `monthly_with_estimates` totals.
    /// Deltas may still be reported on a `not_comparable` verdict (§4.9:
    /// "deltas may still be computed but flagged").
    pub fn with_delta(mut verdict: DeltaVsBaseline, scenario: &ScenarioTotals, baseline: &ScenarioTotals) -> DeltaVsBaseline {
        verdict.monthly_delta = Some(scenario.monthly_with_estimates - baseline.monthly_with_estimates);
        verdict.yearly_delta = Some(scenario.yearly_with_estimates - baseline.yearly_with_estimates);
        verdict
    }
}

fn required_categories_clean(lines: &[PricedLine], resources: &[Resource], reasons: &mut Vec<String>, label: &str) -> bool {
    let category_by_resource: HashMap<&str, ResourceCategory> =
        resources.iter().map(|r| (r.id.as_str(), r.category)).collect();

    let mut clean = true;
    for line in lines {
        let Some(category) = category_by_resource.get(line.resource_id.as_str()) else {
            continue;
        };
        if !category.is_required_for_comparability() {
            continue;
        }
        match line.pricing_status {
            PricingStatus::Priced | PricingStatus::Estimated => {}
            PricingStatus::SkuMismatch => {
                clean = false;
                reasons.push(format!("{label} resource {} has a sku_mismatch in required category {category}", line.resource_id));
            }
            PricingStatus::Missing => {
                clean = false;
                reasons.push(format!("{label} resource {} is missing pricing in required category {category}", line.resource_id));
            }
        }
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::plan::BillingModel;
    use rust_decimal_macros::dec;
    use std::collections::HashMap as StdHashMap;

    fn resource(id: &str, category: ResourceCategory) -> Resource {
        Resource {
            id: id.to_string(),
            category,
            service_name: "Azure App Service".to_string(),
            arm_sku_name: None,
            product_name_contains: vec![],
            sku_name_contains: vec![],
            meter_name_contains: vec![],
            arm_sku_name_contains: vec![],
            service_name_suggestions: vec![],
            quantity: 1.0,
            hours_per_month: None,
            billing_model: BillingModel::Payg,
            workload_type: None,
            criticality: None,
            os_type: None,
            metrics: StdHashMap::new(),
            notes: vec![],
            source: None,
        }
    }

    fn priced_line(resource_id: &str, status: PricingStatus, monthly: Option<Decimal>) -> PricedLine {
        PricedLine {
            resource_id: resource_id.to_string(),
            scenario_id: "baseline".to_string(),
            resolved_row: None,
            unit_price: None,
            unit: None,
            units: None,
            monthly_cost: monthly,
            yearly_cost: monthly.map(|m| m * Decimal::from(12)),
            pricing_status: status,
            notes: vec![],
            requested_sku: None,
            resolved_sku: None,
        }
    }

    #[test]
    fn scenario_f_totals_rollup() {
        let resources = vec![
            resource("r1", ResourceCategory::AppService),
            resource("r2", ResourceCategory::AppService),
            resource("r3", ResourceCategory::CacheRedis),
            resource("r4", ResourceCategory::DbSql),
        ];
        let lines = vec![
            priced_line("r1", PricingStatus::Priced, Some(dec!(50.00))),
            priced_line("r2", PricingStatus::Priced, Some(dec!(30.00))),
            priced_line("r3", PricingStatus::Estimated, Some(dec!(5.00))),
            priced_line("r4", PricingStatus::Missing, None),
        ];

        let totals = TotalsEngine::compute("baseline", &lines, &resources, dec!(100.00));
        assert_eq!(totals.monthly_with_estimates, dec!(185.00));
        assert_eq!(totals.yearly_with_estimates, dec!(2220.00));
        assert_eq!(totals.by_category["db.sql"].missing, dec!(100.00));
    }

    #[test]
    fn zero_resources_totals_to_zero() {
        let totals = TotalsEngine::compute("baseline", &[], &[], dec!(100.00));
        assert_eq!(totals.monthly_with_estimates, Decimal::ZERO);
    }

    #[test]
    fn missing_required_category_makes_scenario_not_comparable() {
        let scenario_resources = vec![resource("r1", ResourceCategory::ComputeVm)];
        let scenario_lines = vec![priced_line("r1", PricingStatus::Missing, None)];
        let baseline_resources = vec![resource("b1", ResourceCategory::ComputeVm)];
        let baseline_lines = vec![priced_line("b1", PricingStatus::Priced, Some(dec!(10.0)))];

        let verdict = TotalsEngine::comparability(&scenario_lines, &scenario_resources, &baseline_lines, &baseline_resources);
        assert_eq!(verdict.status, ComparabilityStatus::NotComparable);
        assert!(!verdict.reasons.is_empty());
    }

    #[test]
    fn sku_mismatch_in_required_category_blocks_comparability() {
        let resources = vec![resource("r1", ResourceCategory::DbSql)];
        let lines = vec![priced_line("r1", PricingStatus::SkuMismatch, Some(dec!(100.0)))];
        let verdict = TotalsEngine::comparability(&lines, &resources, &lines, &resources);
        assert_eq!(verdict.status, ComparabilityStatus::NotComparable);
    }

    #[test]
    fn all_priced_required_categories_are_comparable() {
        let resources = vec![resource("r1", ResourceCategory::ComputeVm)];
        let lines = vec![priced_line("r1", PricingStatus::Priced, Some(dec!(10.0)))];
        let verdict = TotalsEngine::comparability(&lines, &resources, &lines, &resources);
        assert_eq!(verdict.status, ComparabilityStatus::Comparable);
    }

    #[test]
    fn network_vnet_is_not_a_required_category() {
        let resources = vec![resource("r1", ResourceCategory::NetworkVnet)];
        let lines = vec![priced_line("r1", PricingStatus::Missing, None)];
        let verdict = TotalsEngine::comparability(&lines, &resources, &lines, &resources);
        assert_eq!(verdict.status, ComparabilityStatus::Comparable);
    }

    #[test]
    fn delta_is_attached_even_when_not_comparable() {
        let scenario_resources = vec![resource("r1", ResourceCategory::ComputeVm)];
        let scenario_lines = vec![priced_line("r1", PricingStatus::Missing, None)];
        let baseline_resources = vec![resource("b1", ResourceCategory::ComputeVm)];
        let baseline_lines = vec![priced_line("b1", PricingStatus::Priced, Some(dec!(10.0)))];

        let scenario_totals = TotalsEngine::compute("candidate", &scenario_lines, &scenario_resources, dec!(100.0));
        let baseline_totals = TotalsEngine::compute("baseline", &baseline_lines, &baseline_resources, dec!(100.0));

        let verdict = TotalsEngine::comparability(&scenario_lines, &scenario_resources, &baseline_lines, &baseline_resources);
        let verdict = TotalsEngine::with_delta(verdict, &scenario_totals, &baseline_totals);

        assert_eq!(verdict.status, ComparabilityStatus::NotComparable);
        assert!(verdict.monthly_delta.is_some());
    }
}
