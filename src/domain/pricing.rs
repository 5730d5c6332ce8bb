//! Scoring candidates, priced line items, and the missing-category
//! placeholder value. Money fields use `rust_decimal::Decimal` throughout,
//! matching the teacher's `domain::pricing::PricingStructure` convention.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::CatalogRow;

/// Produced by the Scorer (§4.6), ordered descending by `score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub row: CatalogRow,
    pub score: i64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStatus {
    Priced,
    Estimated,
    SkuMismatch,
    Missing,
}

/// One costed line item for a single resource in a single scenario (§3,
/// §4.8). `monthly_cost` is `None` iff `pricing_status == Missing` — this
/// invariant is enforced by `QuantityModel::cost`, not re-checked here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedLine {
    pub resource_id: String,
    pub scenario_id: String,
    pub resolved_row: Option<CatalogRow>,
    pub unit_price: Option<Decimal>,
    pub unit: Option<String>,
    pub units: Option<Decimal>,
    pub monthly_cost: Option<Decimal>,
    pub yearly_cost: Option<Decimal>,
    pub pricing_status: PricingStatus,
    pub notes: Vec<String>,
    pub requested_sku: Option<String>,
    pub resolved_sku: Option<String>,
}

impl PricedLine {
    pub fn missing(resource_id: impl Into<String>, scenario_id: impl Into<String>, requested_sku: Option<String>, note: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            scenario_id: scenario_id.into(),
            resolved_row: None,
            unit_price: None,
            unit: None,
            units: None,
            monthly_cost: None,
            yearly_cost: None,
            pricing_status: PricingStatus::Missing,
            notes: vec![note.into()],
            requested_sku,
            resolved_sku: None,
        }
    }
}

/// A synthetic per-category monthly amount substituted for a missing
/// category's prices in "with estimates" totals. Kept structurally
/// separate from `PricedLine` (§9 design note) so TotalsEngine cannot
/// silently fold a placeholder into a priced sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPlaceholder {
    pub category: String,
    pub amount: Decimal,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn missing_priced_line_has_no_monthly_cost() {
        let line = PricedLine::missing("r1", "baseline", Some("P1v3".into()), "no candidates survived scoring");
        assert_eq!(line.pricing_status, PricingStatus::Missing);
        assert!(line.monthly_cost.is_none());
    }

    #[test]
    fn placeholder_carries_reason() {
        let placeholder = CategoryPlaceholder {
            category: "db.sql".to_string(),
            amount: dec!(100.00),
            reason: "no pricing candidates survived scoring".to_string(),
        };
        assert_eq!(placeholder.amount, dec!(100.00));
    }
}
