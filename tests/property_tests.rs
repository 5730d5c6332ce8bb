// Property-based tests for invariants that should hold across the whole
// input space of the scoring and costing phases, not just the worked
// examples covered by unit tests.

use chrono::{TimeZone, Utc};
use costpilot::domain::catalog::{CatalogRow, CatalogRowType, ShardKey};
use costpilot::domain::plan::{BillingModel, ResourceCategory};
use costpilot::domain::{Candidate, CatalogShard, Resource};
use costpilot::quantity::QuantityModel;
use costpilot::scorer::Scorer;
use proptest::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

fn base_resource() -> Resource {
    Resource {
        id: "r1".to_string(),
        category: ResourceCategory::AppService,
        service_name: "Azure App Service".to_string(),
        arm_sku_name: Some("P1v3".to_string()),
        product_name_contains: vec![],
        sku_name_contains: vec![],
        meter_name_contains: vec![],
        arm_sku_name_contains: vec![],
        service_name_suggestions: vec![],
        quantity: 1.0,
        hours_per_month: Some(730.0),
        billing_model: BillingModel::Payg,
        workload_type: None,
        criticality: None,
        os_type: None,
        metrics: HashMap::new(),
        notes: vec![],
        source: None,
    }
}

fn row_with_price(price: Decimal) -> CatalogRow {
    CatalogRow {
        service_name: "Azure App Service".to_string(),
        product_name: "Azure App Service".to_string(),
        sku_name: "P1v3".to_string(),
        meter_name: "P1v3 Meter".to_string(),
        arm_sku_name: "P1v3".to_string(),
        arm_region_name: "eastus".to_string(),
        currency_code: "USD".to_string(),
        unit_of_measure: "1 Hour".to_string(),
        retail_price: price,
        row_type: CatalogRowType::Consumption,
        reservation_term: String::new(),
        effective_start_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

proptest! {
    // Scoring never panics and candidates come back sorted by descending score.
    #[test]
    fn scoring_candidates_are_sorted_descending_by_score(
        n in 0usize..50,
        exact_sku in prop::bool::ANY,
    ) {
        let mut resource = base_resource();
        if !exact_sku {
            resource.arm_sku_name = Some("UnrelatedSku".to_string());
        }
        let rows: Vec<CatalogRow> = (0..n)
            .map(|i| {
                let mut row = row_with_price(Decimal::from(i as i64 + 1));
                if i % 3 == 0 {
                    row.row_type = CatalogRowType::Reservation;
                    row.reservation_term = "1 Year".to_string();
                }
                row
            })
            .collect();
        let shard = CatalogShard {
            key: ShardKey::new("appservice", "eastus", "USD"),
            rows,
            manifest: None,
        };

        let candidates = Scorer::score(&resource, &shard);
        prop_assert_eq!(candidates.len(), n);
        for pair in candidates.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    // A resource whose service_name does not appear in the shard at all
    // never yields a candidate, regardless of how the rest of the row data
    // varies (the hard prefilter is unconditional).
    #[test]
    fn service_name_prefilter_is_never_bypassed(
        n in 0usize..20,
        other_service in "[a-zA-Z ]{1,20}",
    ) {
        prop_assume!(other_service != "Azure App Service");
        let resource = base_resource();
        let rows: Vec<CatalogRow> = (0..n)
            .map(|_| {
                let mut row = row_with_price(Decimal::ONE);
                row.service_name = other_service.clone();
                row
            })
            .collect();
        let shard = CatalogShard {
            key: ShardKey::new("appservice", "eastus", "USD"),
            rows,
            manifest: None,
        };

        let candidates = Scorer::score(&resource, &shard);
        prop_assert!(candidates.is_empty());
    }

    // Monthly cost for an hourly-priced AppService resource is never
    // negative, and a higher unit price never yields a cheaper total for
    // an otherwise identical resource.
    #[test]
    fn hourly_monthly_cost_is_non_negative_and_monotonic_in_price(
        lower_cents in 0u32..50_000,
        delta_cents in 0u32..50_000,
        quantity in 1u32..20,
    ) {
        let lower = Decimal::from_f64(lower_cents as f64 / 100.0).unwrap();
        let higher = Decimal::from_f64((lower_cents + delta_cents) as f64 / 100.0).unwrap();
        let mut resource = base_resource();
        resource.quantity = quantity as f64;
        let model = QuantityModel::new(100.0, 50.0);

        let cheap = Candidate { row: row_with_price(lower), score: 10, reasons: vec![] };
        let expensive = Candidate { row: row_with_price(higher), score: 10, reasons: vec![] };

        let cheap_line = model.cost(&resource, "baseline", Some(&cheap), 730.0);
        let expensive_line = model.cost(&resource, "baseline", Some(&expensive), 730.0);

        prop_assert!(cheap_line.monthly_cost.unwrap() >= Decimal::ZERO);
        prop_assert!(expensive_line.monthly_cost.unwrap() >= cheap_line.monthly_cost.unwrap());
    }

    // Yearly cost is always exactly twelve times monthly cost, whatever the
    // selected candidate and resource category.
    #[test]
    fn yearly_cost_is_always_twelve_times_monthly(
        price_cents in 0u32..50_000,
    ) {
        let price = Decimal::from_f64(price_cents as f64 / 100.0).unwrap();
        let resource = base_resource();
        let model = QuantityModel::new(100.0, 50.0);
        let candidate = Candidate {
            row: row_with_price(price),
            score: 10,
            reasons: vec![],
        };
        let line = model.cost(&resource, "baseline", Some(&candidate), 730.0);
        prop_assert_eq!(line.yearly_cost.unwrap(), line.monthly_cost.unwrap() * Decimal::from(12));
    }
}
