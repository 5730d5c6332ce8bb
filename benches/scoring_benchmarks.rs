// Performance benchmarks for the scoring phase (§4.6).
// Validates that scoring a shard stays cheap as shard size grows.

use chrono::{TimeZone, Utc};
use costpilot::domain::catalog::{CatalogRow, CatalogRowType, ShardKey};
use costpilot::domain::plan::{BillingModel, ResourceCategory};
use costpilot::domain::{CatalogShard, Resource};
use costpilot::scorer::Scorer;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

fn test_resource() -> Resource {
    Resource {
        id: "appsvc-bench".to_string(),
        category: ResourceCategory::AppService,
        service_name: "Azure App Service".to_string(),
        arm_sku_name: Some("P1v3".to_string()),
        product_name_contains: vec!["Premium".to_string()],
        sku_name_contains: vec!["P1v3".to_string()],
        meter_name_contains: vec![],
        arm_sku_name_contains: vec!["P1v3".to_string()],
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

fn test_row(sku: &str, price: &str) -> CatalogRow {
    CatalogRow {
        service_name: "Azure App Service".to_string(),
        product_name: "Azure App Service Premium".to_string(),
        sku_name: sku.to_string(),
        meter_name: format!("{sku} Meter"),
        arm_sku_name: sku.to_string(),
        arm_region_name: "eastus".to_string(),
        currency_code: "USD".to_string(),
        unit_of_measure: "1 Hour".to_string(),
        retail_price: Decimal::from_str(price).unwrap(),
        row_type: CatalogRowType::Consumption,
        reservation_term: String::new(),
        effective_start_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn shard_of_size(n: usize) -> CatalogShard {
    let rows = (0..n)
        .map(|i| test_row(&format!("P{}v3", i % 8), "0.29"))
        .collect();
    CatalogShard {
        key: ShardKey::new("appservice", "eastus", "USD"),
        rows,
        manifest: None,
    }
}

fn bench_score_single_resource(c: &mut Criterion) {
    let resource = test_resource();
    let mut group = c.benchmark_group("score_single_resource");

    for size in [10, 100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        let shard = shard_of_size(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let candidates = Scorer::score(black_box(&resource), black_box(&shard));
                black_box(candidates)
            })
        });
    }

    group.finish();
}

fn bench_score_prefilter_miss(c: &mut Criterion) {
    let mut resource = test_resource();
    resource.service_name = "Some Other Service".to_string();
    let shard = shard_of_size(10_000);

    c.bench_function("score_prefilter_discards_all_rows", |b| {
        b.iter(|| {
            let candidates = Scorer::score(black_box(&resource), black_box(&shard));
            black_box(candidates)
        })
    });
}

criterion_group!(benches, bench_score_single_resource, bench_score_prefilter_miss);
criterion_main!(benches);
