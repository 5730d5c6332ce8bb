//! Azure Retail Prices row and shard types. A shard is the unit of cache
//! identity: one (category, region, currency) tuple maps to one
//! append-only JSONL file plus a sidecar manifest (§3, §6).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One priced row from the Azure Retail Prices API. Deliberately permissive
/// (§9 design note: "strict parser that tolerates unknown extras") — extra
/// JSON fields the API sends are dropped via `#[serde(deny_unknown_fields)]`
/// being *absent*, not present. Rows that fail to convert (unmodeled `type`,
/// missing price, bad date) are the caller's problem, not this type's: the
/// fetch loop converts one row at a time and skips the ones that don't fit
/// rather than failing the whole page (§9: "conversion errors skip the row
/// but do not abort the fetch").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRow {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(rename = "productName")]
    pub product_name: String,
    #[serde(rename = "skuName")]
    pub sku_name: String,
    #[serde(rename = "meterName")]
    pub meter_name: String,
    #[serde(rename = "armSkuName", default)]
    pub arm_sku_name: String,
    #[serde(rename = "armRegionName")]
    pub arm_region_name: String,
    #[serde(rename = "currencyCode")]
    pub currency_code: String,
    #[serde(rename = "unitOfMeasure")]
    pub unit_of_measure: String,
    #[serde(rename = "retailPrice")]
    pub retail_price: Decimal,
    #[serde(rename = "type")]
    pub row_type: CatalogRowType,
    #[serde(rename = "reservationTerm", default)]
    pub reservation_term: String,
    #[serde(rename = "effectiveStartDate")]
    pub effective_start_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogRowType {
    Consumption,
    Reservation,
    DevTestConsumption,
}

impl CatalogRow {
    /// Case-insensitive substring search against the concatenation of the
    /// fields the Scorer matches tokens against (§4.6).
    pub fn haystack_lower(&self) -> String {
        format!(
            "{} {} {} {}",
            self.product_name.to_lowercase(),
            self.sku_name.to_lowercase(),
            self.meter_name.to_lowercase(),
            self.arm_sku_name.to_lowercase()
        )
    }

    pub fn is_low_priority(&self) -> bool {
        let haystack = self.haystack_lower();
        haystack.contains("low priority") || haystack.contains("spot")
    }
}

/// Identity of a cache shard: a category paired with region/currency.
/// The category is stored as its canonical string form since a shard's
/// candidate-service-set is resolved via `KnowledgePack`, not re-derived
/// from `ResourceCategory` here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardKey {
    pub category: String,
    pub region: String,
    pub currency: String,
}

impl ShardKey {
    pub fn new(category: impl Into<String>, region: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            region: region.into(),
            currency: currency.into(),
        }
    }

    /// `<category>__<region>__<currency>` filename stem (§6 path layout).
    pub fn file_stem(&self) -> String {
        format!("{}__{}__{}", self.category, self.region, self.currency)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardManifest {
    pub fetched_at: DateTime<Utc>,
    pub row_count: usize,
    pub next_page_cursor: Option<String>,
    pub hash: String,
}

/// In-memory view of a materialized shard: all rows currently readable
/// from its cache file, plus the manifest describing how it got there.
#[derive(Debug, Clone)]
pub struct CatalogShard {
    pub key: ShardKey,
    pub rows: Vec<CatalogRow>,
    pub manifest: Option<ShardManifest>,
}

impl CatalogShard {
    pub fn empty(key: ShardKey) -> Self {
        Self {
            key,
            rows: Vec::new(),
            manifest: None,
        }
    }

    /// Simple field equality / substring predicate query (§4.1 `query`).
    /// Predicates are applied as an AND of closures so callers compose
    /// their own filters (e.g. scorer's hard service prefilter).
    pub fn query<'a>(&'a self, predicate: impl Fn(&CatalogRow) -> bool + 'a) -> impl Iterator<Item = &'a CatalogRow> {
        self.rows.iter().filter(move |row| predicate(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn row(service: &str, price: Decimal) -> CatalogRow {
        CatalogRow {
            service_name: service.to_string(),
            product_name: "Azure App Service".to_string(),
            sku_name: "P1v3".to_string(),
            meter_name: "P1 v3".to_string(),
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

    #[test]
    fn shard_key_file_stem_matches_layout() {
        let key = ShardKey::new("compute.vm", "eastus", "USD");
        assert_eq!(key.file_stem(), "compute.vm__eastus__USD");
    }

    #[test]
    fn query_filters_rows() {
        let mut shard = CatalogShard::empty(ShardKey::new("appservice", "eastus", "USD"));
        shard.rows.push(row("Azure App Service", dec!(0.29)));
        shard.rows.push(row("Other Service", dec!(1.0)));

        let matched: Vec<_> = shard
            .query(|r| r.service_name == "Azure App Service")
            .collect();
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn low_priority_detection_is_case_insensitive() {
        let mut r = row("Azure Virtual Machines", dec!(0.01));
        r.meter_name = "D2s v3 Low Priority".to_string();
        assert!(r.is_low_priority());
    }
}
