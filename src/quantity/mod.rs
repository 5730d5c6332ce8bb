//! Phase 6 — QuantityModel. Maps a resource plus its selected catalog row
//! to a `PricedLine`: derives `units` from the category's quantity formula
//! (§4.8 table), normalizes the row's unit of measure, computes
//! monthly/yearly cost, and classifies `pricing_status`.
//!
//! Dispatch is a `match` over `ResourceCategory` rather than a runtime
//! closure table (documented deviation, see DESIGN.md): the category set
//! is closed, so exhaustiveness checking catches a missing formula at
//! compile time instead of at the quantity table's construction site.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::domain::catalog::{CatalogRow, CatalogRowType};
use crate::domain::plan::ResourceCategory;
use crate::domain::{Candidate, PricedLine, PricingStatus, Resource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOfMeasure {
    Hour,
    GbMonth,
    TenKOperations,
    PerMonth,
    Unknown,
}

fn parse_uom(raw: &str) -> UnitOfMeasure {
    let normalized = raw.trim();
    if normalized.eq_ignore_ascii_case("1 Hour") {
        UnitOfMeasure::Hour
    } else if normalized.eq_ignore_ascii_case("10K operations") || normalized.eq_ignore_ascii_case("10K") {
        UnitOfMeasure::TenKOperations
    } else if normalized.eq_ignore_ascii_case("1 GB/Month") || normalized.eq_ignore_ascii_case("1 GB") {
        UnitOfMeasure::GbMonth
    } else if normalized.eq_ignore_ascii_case("1/Month") {
        UnitOfMeasure::PerMonth
    } else {
        UnitOfMeasure::Unknown
    }
}

fn dec(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Pulls a per-instance vCore count out of an ARM SKU token like
/// `GP_Gen5_4`, falling back to `None` when no trailing numeric token
/// exists.
fn vcores_from_sku_token(sku: Option<&str>) -> Option<f64> {
    let sku = sku?;
    sku.split(['_', '-']).rev().find_map(|token| token.parse::<f64>().ok())
}

pub struct QuantityModel {
    missing_category_placeholder: Decimal,
    reservation_hourly_implausible_threshold: Decimal,
}

impl QuantityModel {
    pub fn new(missing_category_placeholder: f64, reservation_hourly_implausible_threshold: f64) -> Self {
        Self {
            missing_category_placeholder: dec(missing_category_placeholder),
            reservation_hourly_implausible_threshold: dec(reservation_hourly_implausible_threshold),
        }
    }

    /// `cost(resource, selected_row, hours_per_month) -> PricedLine` (§4.8).
    /// `selected` is the Adjudicator's chosen candidate, if any survived
    /// scoring and adjudication.
    pub fn cost(
        &self,
        resource: &Resource,
        scenario_id: &str,
        selected: Option<&Candidate>,
        hours_per_month: f64,
    ) -> PricedLine {
        let requested_sku = resource.arm_sku_name.clone();

        let Some(candidate) = selected else {
            return PricedLine::missing(
                resource.id.clone(),
                scenario_id.to_string(),
                requested_sku,
                "no candidate survived scoring",
            );
        };

        let row = &candidate.row;
        let resolved_sku = Some(row.sku_name.clone());

        // Reservation/hour unit-of-measure ambiguity (scenario E / §9 open
        // question resolution): an hourly UoM with a reservation type and
        // an implausibly high hourly price is almost certainly an annual
        // prepay mislabeled as per-hour.
        if row.row_type == CatalogRowType::Reservation
            && parse_uom(&row.unit_of_measure) == UnitOfMeasure::Hour
            && row.retail_price > self.reservation_hourly_implausible_threshold
        {
            return self.placeholder_line(
                resource,
                scenario_id,
                row,
                requested_sku,
                resolved_sku,
                "reservation row carries an hourly unit of measure but a retail price implausible \
                 for an hourly rate; treating as an annual-prepay/UoM ambiguity"
                    .to_string(),
            );
        }

        let units = match units_for(resource, row, hours_per_month) {
            Ok(units) => units,
            Err(reason) => {
                return self.placeholder_line(resource, scenario_id, row, requested_sku, resolved_sku, reason);
            }
        };

        let unit_price = row.retail_price;
        let monthly_cost = (unit_price * units).round_dp(4);
        let yearly_cost = (monthly_cost * Decimal::from(12)).round_dp(4);

        let mut notes = Vec::new();
        let mut status = PricingStatus::Priced;

        if let Some(requested) = requested_sku.as_deref() {
            if !requested.is_empty() && !sku_compatible(requested, row) {
                status = PricingStatus::SkuMismatch;
                notes.push(format!(
                    "requested sku '{requested}' does not match resolved sku '{}' (product '{}')",
                    row.sku_name, row.product_name
                ));
            }
        }

        if status == PricingStatus::Priced && is_proxy_meter(resource, row) {
            status = PricingStatus::Estimated;
            notes.push("priced via a proxy meter, not the authoritative tier for this category".to_string());
        }

        PricedLine {
            resource_id: resource.id.clone(),
            scenario_id: scenario_id.to_string(),
            resolved_row: Some(row.clone()),
            unit_price: Some(unit_price),
            unit: Some(row.unit_of_measure.clone()),
            units: Some(units),
            monthly_cost: Some(monthly_cost),
            yearly_cost: Some(yearly_cost),
            pricing_status: status,
            notes,
            requested_sku,
            resolved_sku,
        }
    }

    /// §4.8 failure semantics: a category-specific placeholder substitutes
    /// for `monthly_cost` when the row's UoM cannot be mapped, or the
    /// reservation ambiguity above fires. Classified `sku_mismatch` rather
    /// than `missing` since a candidate did resolve, just not cleanly.
    fn placeholder_line(
        &self,
        resource: &Resource,
        scenario_id: &str,
        row: &CatalogRow,
        requested_sku: Option<String>,
        resolved_sku: Option<String>,
        reason: String,
    ) -> PricedLine {
        let monthly_cost = self.missing_category_placeholder;
        let yearly_cost = (monthly_cost * Decimal::from(12)).round_dp(4);
        PricedLine {
            resource_id: resource.id.clone(),
            scenario_id: scenario_id.to_string(),
            resolved_row: Some(row.clone()),
            unit_price: Some(row.retail_price),
            unit: Some(row.unit_of_measure.clone()),
            units: None,
            monthly_cost: Some(monthly_cost),
            yearly_cost: Some(yearly_cost),
            pricing_status: PricingStatus::SkuMismatch,
            notes: vec![
                reason,
                format!("monthly cost replaced with category placeholder {monthly_cost}"),
            ],
            requested_sku,
            resolved_sku,
        }
    }
}

fn sku_compatible(requested: &str, row: &CatalogRow) -> bool {
    let requested_lower = requested.to_lowercase();
    let sku_lower = row.sku_name.to_lowercase();
    let product_lower = row.product_name.to_lowercase();
    sku_lower == requested_lower
        || row.arm_sku_name.eq_ignore_ascii_case(requested)
        || sku_lower.contains(&requested_lower)
        || product_lower.contains(&requested_lower)
}

fn is_proxy_meter(resource: &Resource, row: &CatalogRow) -> bool {
    resource.category == ResourceCategory::StorageBlob && row.product_name.to_lowercase().contains("data lake")
}

/// §4.8's per-category-family units table, dispatched on `ResourceCategory`
/// (closed set, exhaustive match). Returns `Err(reason)` when the row's
/// UoM cannot be reconciled with the category's formula.
fn units_for(resource: &Resource, row: &CatalogRow, hours_per_month: f64) -> Result<Decimal, String> {
    use ResourceCategory::*;
    let uom = parse_uom(&row.unit_of_measure);

    match resource.category {
        ComputeVm | AppService => match uom {
            UnitOfMeasure::Hour => Ok(dec(hours_per_month) * dec(resource.quantity)),
            _ => Err(uom_mismatch(resource, row)),
        },
        ComputeVmss | ComputeAks => match uom {
            UnitOfMeasure::Hour => {
                let nodes = resource.metrics.get("node_count").copied().unwrap_or(resource.quantity);
                Ok(dec(hours_per_month) * dec(nodes))
            }
            _ => Err(uom_mismatch(resource, row)),
        },
        DbSql => match uom {
            UnitOfMeasure::Hour => {
                let vcores = resource
                    .metrics
                    .get("vcores")
                    .copied()
                    .or_else(|| vcores_from_sku_token(resource.arm_sku_name.as_deref()))
                    .unwrap_or(resource.quantity);
                Ok(dec(hours_per_month) * dec(vcores))
            }
            _ => Err(uom_mismatch(resource, row)),
        },
        CacheRedis => match uom {
            UnitOfMeasure::Hour => Ok(dec(hours_per_month)),
            _ => Err(uom_mismatch(resource, row)),
        },
        StorageDisk => match uom {
            UnitOfMeasure::GbMonth | UnitOfMeasure::PerMonth => resource
                .metrics
                .get("capacity_gb")
                .copied()
                .map(dec)
                .ok_or_else(|| "storage.disk requires metrics.capacity_gb".to_string()),
            _ => Err(uom_mismatch(resource, row)),
        },
        StorageBlob => match uom {
            UnitOfMeasure::TenKOperations => resource
                .metrics
                .get("operations_10k")
                .copied()
                .map(dec)
                .ok_or_else(|| "blob operations meter selected but metrics.operations_10k is absent".to_string()),
            UnitOfMeasure::GbMonth => {
                let gb: f64 = resource.metrics.iter().filter(|(k, _)| k.ends_with("_gb")).map(|(_, v)| *v).sum();
                if gb <= 0.0 {
                    Err("storage.blob GB meter selected but no *_gb metrics are present".to_string())
                } else {
                    Ok(dec(gb))
                }
            }
            _ => Err(uom_mismatch(resource, row)),
        },
        NetworkEgress | NetworkNat => match uom {
            UnitOfMeasure::GbMonth => resource
                .metrics
                .get("egress_gb")
                .copied()
                .map(dec)
                .ok_or_else(|| "network egress/nat requires metrics.egress_gb".to_string()),
            _ => Err(uom_mismatch(resource, row)),
        },
        NetworkPublicIp | NetworkBastion => match uom {
            UnitOfMeasure::Hour => Ok(dec(hours_per_month) * dec(resource.quantity)),
            _ => Err(uom_mismatch(resource, row)),
        },
        MonitoringLogAnalytics => match uom {
            UnitOfMeasure::GbMonth => {
                let ingestion = resource.metrics.get("ingestion_gb").copied().unwrap_or(0.0);
                let retention = resource.metrics.get("retention_gb").copied().unwrap_or(0.0);
                if ingestion <= 0.0 && retention <= 0.0 {
                    Err("monitoring.loganalytics requires metrics.ingestion_gb or metrics.retention_gb".to_string())
                } else {
                    Ok(dec(ingestion + retention))
                }
            }
            _ => Err(uom_mismatch(resource, row)),
        },
        SecurityKeyvault => match uom {
            UnitOfMeasure::TenKOperations => resource
                .metrics
                .get("operations_10k")
                .copied()
                .map(dec)
                .ok_or_else(|| "security.keyvault requires metrics.operations_10k".to_string()),
            _ => Err(uom_mismatch(resource, row)),
        },
        BackupVault => match uom {
            UnitOfMeasure::TenKOperations => {
                Ok(dec(resource.metrics.get("operations_10k").copied().unwrap_or(0.0)))
            }
            UnitOfMeasure::GbMonth => resource
                .metrics
                .get("backup_gb")
                .copied()
                .map(dec)
                .ok_or_else(|| "backup.vault GB meter selected but metrics.backup_gb is absent".to_string()),
            _ => Err(uom_mismatch(resource, row)),
        },
        DrAsr => {
            let instances = resource.metrics.get("protected_instances").copied().unwrap_or(resource.quantity);
            match uom {
                UnitOfMeasure::Hour => Ok(dec(instances) * dec(hours_per_month)),
                UnitOfMeasure::PerMonth => Ok(dec(instances)),
                _ => Err(uom_mismatch(resource, row)),
            }
        }
        // Categories outside the explicit §4.8 table (vnet/appgw/gateway,
        // analytics.*, other): a generic fallback keyed purely off UoM,
        // so an exhaustive match still resolves rather than requiring a
        // bespoke formula for every category the knowledge pack might add.
        NetworkVnet | NetworkAppgw | NetworkGateway | AnalyticsDatabricks | AnalyticsDataFactory | AnalyticsFabric
        | Other => match uom {
            UnitOfMeasure::Hour => Ok(dec(hours_per_month) * dec(resource.quantity)),
            UnitOfMeasure::PerMonth => Ok(dec(resource.quantity)),
            UnitOfMeasure::GbMonth => {
                let gb: f64 = resource.metrics.values().sum();
                if gb <= 0.0 {
                    Err(format!("category {} has no metric to price a GB meter against", resource.category))
                } else {
                    Ok(dec(gb))
                }
            }
            UnitOfMeasure::TenKOperations => resource
                .metrics
                .get("operations_10k")
                .copied()
                .map(dec)
                .ok_or_else(|| format!("category {} has no metrics.operations_10k to price against", resource.category)),
            UnitOfMeasure::Unknown => Err(uom_mismatch(resource, row)),
        },
    }
}

fn uom_mismatch(resource: &Resource, row: &CatalogRow) -> String {
    format!(
        "unit of measure '{}' cannot be mapped to the quantity formula for category {}",
        row.unit_of_measure, resource.category
    )
}
