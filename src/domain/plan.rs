//! The canonical `Plan` entity: `Plan` → `Scenario` → `Resource`, plus the
//! category and billing-model enums that drive every downstream phase.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CostPilotError, Result};

pub const UNKNOWN_SERVICE: &str = "UNKNOWN_SERVICE";

/// Every category a `Resource` may carry. Unlike a free-form string, this
/// closes the set so the Scorer's `w7` billing-model match and the
/// QuantityModel's per-family dispatch can be exhaustive `match`es.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    #[serde(rename = "compute.vm")]
    ComputeVm,
    #[serde(rename = "compute.vmss")]
    ComputeVmss,
    #[serde(rename = "compute.aks")]
    ComputeAks,
    #[serde(rename = "db.sql")]
    DbSql,
    #[serde(rename = "cache.redis")]
    CacheRedis,
    #[serde(rename = "storage.blob")]
    StorageBlob,
    #[serde(rename = "storage.disk")]
    StorageDisk,
    #[serde(rename = "network.vnet")]
    NetworkVnet,
    #[serde(rename = "network.appgw")]
    NetworkAppgw,
    #[serde(rename = "network.nat")]
    NetworkNat,
    #[serde(rename = "network.egress")]
    NetworkEgress,
    #[serde(rename = "network.public_ip")]
    NetworkPublicIp,
    #[serde(rename = "network.bastion")]
    NetworkBastion,
    #[serde(rename = "network.gateway")]
    NetworkGateway,
    #[serde(rename = "security.keyvault")]
    SecurityKeyvault,
    #[serde(rename = "monitoring.loganalytics")]
    MonitoringLogAnalytics,
    #[serde(rename = "backup.vault")]
    BackupVault,
    #[serde(rename = "dr.asr")]
    DrAsr,
    #[serde(rename = "appservice")]
    AppService,
    #[serde(rename = "analytics.databricks")]
    AnalyticsDatabricks,
    #[serde(rename = "analytics.datafactory")]
    AnalyticsDataFactory,
    #[serde(rename = "analytics.fabric")]
    AnalyticsFabric,
    #[serde(rename = "other")]
    Other,
}

impl ResourceCategory {
    /// The wire/catalog-filename form, e.g. `"compute.vm"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::ComputeVm => "compute.vm",
            ResourceCategory::ComputeVmss => "compute.vmss",
            ResourceCategory::ComputeAks => "compute.aks",
            ResourceCategory::DbSql => "db.sql",
            ResourceCategory::CacheRedis => "cache.redis",
            ResourceCategory::StorageBlob => "storage.blob",
            ResourceCategory::StorageDisk => "storage.disk",
            ResourceCategory::NetworkVnet => "network.vnet",
            ResourceCategory::NetworkAppgw => "network.appgw",
            ResourceCategory::NetworkNat => "network.nat",
            ResourceCategory::NetworkEgress => "network.egress",
            ResourceCategory::NetworkPublicIp => "network.public_ip",
            ResourceCategory::NetworkBastion => "network.bastion",
            ResourceCategory::NetworkGateway => "network.gateway",
            ResourceCategory::SecurityKeyvault => "security.keyvault",
            ResourceCategory::MonitoringLogAnalytics => "monitoring.loganalytics",
            ResourceCategory::BackupVault => "backup.vault",
            ResourceCategory::DrAsr => "dr.asr",
            ResourceCategory::AppService => "appservice",
            ResourceCategory::AnalyticsDatabricks => "analytics.databricks",
            ResourceCategory::AnalyticsDataFactory => "analytics.datafactory",
            ResourceCategory::AnalyticsFabric => "analytics.fabric",
            ResourceCategory::Other => "other",
        }
    }

    /// Coarse family grouping used by the Repairer trigger rule (§4.5:
    /// "category ∈ {compute, db, cache, storage, network.*}") and by the
    /// comparability "required category" rule (§4.9/§9).
    pub fn family(&self) -> &'static str {
        match self {
            ResourceCategory::ComputeVm
            | ResourceCategory::ComputeVmss
            | ResourceCategory::ComputeAks
            | ResourceCategory::AppService => "compute",
            ResourceCategory::DbSql => "db",
            ResourceCategory::CacheRedis => "cache",
            ResourceCategory::StorageBlob | ResourceCategory::StorageDisk => "storage",
            ResourceCategory::NetworkVnet
            | ResourceCategory::NetworkAppgw
            | ResourceCategory::NetworkNat
            | ResourceCategory::NetworkEgress
            | ResourceCategory::NetworkPublicIp
            | ResourceCategory::NetworkBastion
            | ResourceCategory::NetworkGateway => "network",
            ResourceCategory::SecurityKeyvault => "security",
            ResourceCategory::MonitoringLogAnalytics => "monitoring",
            ResourceCategory::BackupVault => "backup",
            ResourceCategory::DrAsr => "dr",
            ResourceCategory::AnalyticsDatabricks
            | ResourceCategory::AnalyticsDataFactory
            | ResourceCategory::AnalyticsFabric => "analytics",
            ResourceCategory::Other => "other",
        }
    }

    /// Required-for-comparability categories per SPEC_FULL.md §9: every
    /// compute/db/cache/storage/network category except `network.vnet`.
    pub fn is_required_for_comparability(&self) -> bool {
        match self.family() {
            "compute" | "db" | "cache" | "storage" => true,
            "network" => !matches!(self, ResourceCategory::NetworkVnet),
            _ => false,
        }
    }
}

impl std::fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingModel {
    Payg,
    Reserved,
    DevTest,
    Spot,
}

impl Default for BillingModel {
    fn default() -> Self {
        BillingModel::Payg
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub region: String,
    pub currency: String,
    pub hours_per_month: f64,
    #[serde(default)]
    pub repair_iterations: u32,
    #[serde(default)]
    pub knowledge_pack_hash: String,
    #[serde(default)]
    pub tool_version: String,
}

/// Pricing-identification and quantity fields for one architecture
/// resource. Only the `*_contains` hint arrays, `service_name`,
/// `arm_sku_name`, and `service_name_suggestions` may be mutated by the
/// Repairer (phase2); everything else is frozen after phase2 (§3 invariants).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub category: ResourceCategory,

    // Pricing-identification fields (Repairer-mutable).
    #[serde(default = "default_unknown_service")]
    pub service_name: String,
    #[serde(default)]
    pub arm_sku_name: Option<String>,
    #[serde(default)]
    pub product_name_contains: Vec<String>,
    #[serde(default)]
    pub sku_name_contains: Vec<String>,
    #[serde(default)]
    pub meter_name_contains: Vec<String>,
    #[serde(default)]
    pub arm_sku_name_contains: Vec<String>,
    #[serde(default)]
    pub service_name_suggestions: Vec<String>,

    // Quantity fields (read-only after validation).
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub hours_per_month: Option<f64>,
    #[serde(default)]
    pub billing_model: BillingModel,
    #[serde(default)]
    pub workload_type: Option<String>,
    #[serde(default)]
    pub criticality: Option<String>,
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

fn default_unknown_service() -> String {
    UNKNOWN_SERVICE.to_string()
}

fn default_quantity() -> f64 {
    1.0
}

impl Resource {
    /// The four Repairer-writable hint arrays, per §4.5's trigger rule
    /// ("every hint array ... is empty").
    pub fn hints_all_empty(&self) -> bool {
        self.product_name_contains.is_empty()
            && self.sku_name_contains.is_empty()
            && self.meter_name_contains.is_empty()
            && self.arm_sku_name_contains.is_empty()
    }

    pub fn is_unknown_service(&self) -> bool {
        self.service_name == UNKNOWN_SERVICE
    }

    /// §4.5(b): repair trigger category scope excludes security/monitoring/
    /// backup/dr/analytics/appservice/other — only compute/db/cache/storage/
    /// network families are in scope for the hint-emptiness trigger.
    pub fn category_in_repair_scope(&self) -> bool {
        matches!(
            self.category.family(),
            "compute" | "db" | "cache" | "storage" | "network"
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub resources: Vec<Resource>,
}

pub const BASELINE_SCENARIO_NAME: &str = "baseline";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub metadata: Metadata,
    pub scenarios: Vec<Scenario>,
}

impl Plan {
    pub fn baseline(&self) -> Option<&Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.name == BASELINE_SCENARIO_NAME)
    }

    /// Structural invariant check used by `PlanSchema::validate` and by
    /// tests: resource ids unique within their scenario, scenario ids
    /// unique within the plan (§3 invariants).
    pub fn check_id_uniqueness(&self) -> Result<()> {
        let mut scenario_ids = std::collections::HashSet::new();
        for scenario in &self.scenarios {
            if !scenario_ids.insert(&scenario.id) {
                return Err(CostPilotError::Validation(vec![format!(
                    "duplicate scenario id: {}",
                    scenario.id
                )]));
            }
            let mut resource_ids = std::collections::HashSet::new();
            for resource in &scenario.resources {
                if !resource_ids.insert(&resource.id) {
                    return Err(CostPilotError::Validation(vec![format!(
                        "duplicate resource id {} in scenario {}",
                        resource.id, scenario.id
                    )]));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_resource(id: &str) -> Resource {
        Resource {
            id: id.to_string(),
            category: ResourceCategory::ComputeVm,
            service_name: UNKNOWN_SERVICE.to_string(),
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
            metrics: HashMap::new(),
            notes: vec![],
            source: None,
        }
    }

    #[test]
    fn category_round_trips_through_json() {
        let json = serde_json::to_string(&ResourceCategory::ComputeVm).unwrap();
        assert_eq!(json, "\"compute.vm\"");
        let back: ResourceCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ResourceCategory::ComputeVm);
    }

    #[test]
    fn network_vnet_excluded_from_required_categories() {
        assert!(!ResourceCategory::NetworkVnet.is_required_for_comparability());
        assert!(ResourceCategory::NetworkEgress.is_required_for_comparability());
        assert!(ResourceCategory::ComputeVm.is_required_for_comparability());
        assert!(!ResourceCategory::Other.is_required_for_comparability());
    }

    #[test]
    fn resource_hints_all_empty_detects_trigger_condition() {
        let r = sample_resource("vm-1");
        assert!(r.hints_all_empty());
        assert!(r.category_in_repair_scope());
    }

    #[test]
    fn duplicate_resource_ids_rejected() {
        let plan = Plan {
            metadata: Metadata {
                region: "eastus".into(),
                currency: "USD".into(),
                hours_per_month: 730.0,
                repair_iterations: 0,
                knowledge_pack_hash: String::new(),
                tool_version: String::new(),
            },
            scenarios: vec![Scenario {
                id: "s1".into(),
                name: "baseline".into(),
                resources: vec![sample_resource("r1"), sample_resource("r1")],
            }],
        };
        assert!(plan.check_id_uniqueness().is_err());
    }
}
