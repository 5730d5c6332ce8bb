//! Drives phase0 through phase7 in order and enforces the gating rules of
//! §4.11: planner/validation failures abort the run; catalog, scoring,
//! and costing failures are per-resource/per-shard and never abort.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adjudicator::{Adjudicator, AdjudicationPolicy};
use crate::domain::catalog::ShardKey;
use crate::domain::plan::ResourceCategory;
use crate::domain::trace::Phase;
use crate::domain::{Plan, PricedLine, TraceEvent};
use crate::error::{CostPilotError, Result};
use crate::knowledge_pack::KnowledgePack;
use crate::llm::LlmClient;
use crate::planner::Planner;
use crate::quantity::QuantityModel;
use crate::repairer::Repairer;
use crate::report::{self, ScenarioReportInput};
use crate::retail::RetailCatalog;
use crate::artifacts::RunArtifacts;
use crate::schema;
use crate::scorer::Scorer;
use crate::totals::{DeltaVsBaseline, ScenarioTotals, TotalsEngine};
use crate::tracer::Tracer;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

pub struct RunOutcome {
    pub run_id: String,
    pub plan: Plan,
    pub priced_lines: HashMap<String, Vec<PricedLine>>,
    pub scenario_totals: HashMap<String, ScenarioTotals>,
    pub comparability: HashMap<String, DeltaVsBaseline>,
    pub report_markdown: String,
}

pub struct Orchestrator {
    region: String,
    currency: String,
    hours_per_month: f64,
    runs_dir: PathBuf,
    max_parallel_fetch: usize,
    missing_category_placeholder: f64,
    reservation_hourly_implausible_threshold: f64,
    adjudication_policy: AdjudicationPolicy,
    pack: Arc<dyn KnowledgePack>,
    catalog: Arc<RetailCatalog>,
    planner: Planner,
    repairer: Repairer,
    adjudicator: Adjudicator,
    cancel: Arc<AtomicBool>,
}

#[allow(clippy::too_many_arguments)]
impl Orchestrator {
    pub fn new(
        region: impl Into<String>,
        currency: impl Into<String>,
        hours_per_month: f64,
        runs_dir: PathBuf,
        max_parallel_fetch: usize,
        missing_category_placeholder: f64,
        reservation_hourly_implausible_threshold: f64,
        adjudication_policy: AdjudicationPolicy,
        pack: Arc<dyn KnowledgePack>,
        catalog: Arc<RetailCatalog>,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        max_planner_attempts: u32,
    ) -> Self {
        let model = model.into();
        Self {
            region: region.into(),
            currency: currency.into(),
            hours_per_month,
            runs_dir,
            max_parallel_fetch,
            missing_category_placeholder,
            reservation_hourly_implausible_threshold,
            adjudication_policy,
            pack: pack.clone(),
            catalog,
            planner: Planner::new(llm.clone(), pack.clone(), model.clone(), max_planner_attempts),
            repairer: Repairer::new(llm.clone(), pack, model.clone()),
            adjudicator: Adjudicator::new(llm, model),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Drives the full pipeline for one workload description. Returns
    /// `Err` only for phase1/phase2 fatal failures (§4.11); every other
    /// failure mode degrades the affected resource's `pricing_status`
    /// and the run completes with a report.
    pub async fn run(&self, description: &str, categories: &[&str]) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let tracer = Tracer::create(&self.runs_dir, &run_id)?;
        let artifacts = RunArtifacts::create(&self.runs_dir, &run_id).await?;

        tracer.emit(TraceEvent::new(&run_id, Phase::Phase0Setup, json!({"region": self.region, "currency": self.currency})))?;

        // Phase 1 — Planner. Fatal on failure.
        let plan = match self.planner.plan(description, categories).await {
            Ok(plan) => plan,
            Err(err) => {
                tracer.emit_best_effort(TraceEvent::new(&run_id, Phase::Phase1Planner, json!({"error": err.to_string()})));
                tracer.close().ok();
                return Err(err);
            }
        };
        tracer.emit(TraceEvent::new(&run_id, Phase::Phase1Planner, json!({"scenarios": plan.scenarios.len()})))?;

        if self.is_cancelled() {
            return Err(CostPilotError::Cancelled);
        }

        // Phase 2 — Repair + validation. Fatal on failure after repair.
        artifacts.write_debug_repair_input(&plan).await?;
        let (plan, patches) = match self.repairer.repair(plan).await {
            Ok(result) => result,
            Err(err) => {
                tracer.emit_best_effort(TraceEvent::new(&run_id, Phase::Phase1PlannerRepair, json!({"error": err.to_string()})));
                tracer.close().ok();
                return Err(err);
            }
        };
        artifacts.write_debug_repair_output(&plan).await?;
        tracer.emit(TraceEvent::new(&run_id, Phase::Phase2Validation, json!({"applied_patches": patches.len()})))?;
        artifacts.write_plan_validated(&plan).await?;

        // Phase 3 — Retail catalog acquisition, bounded parallel fetch per
        // distinct (category, region, currency) tuple.
        let shard_keys: Vec<(ShardKey, ResourceCategory)> = {
            let mut seen = std::collections::HashSet::new();
            let mut keys = Vec::new();
            for scenario in &plan.scenarios {
                for resource in &scenario.resources {
                    let key = ShardKey::new(resource.category.as_str(), &self.region, &self.currency);
                    if seen.insert(key.clone()) {
                        keys.push((key, resource.category));
                    }
                }
            }
            keys
        };

        let fetch_results: Vec<(ShardKey, Result<crate::domain::CatalogShard>)> = stream::iter(shard_keys.into_iter())
            .map(|(key, category)| {
                let catalog = self.catalog.clone();
                let pack = self.pack.clone();
                let region = self.region.clone();
                let currency = self.currency.clone();
                async move {
                    let candidates = pack.candidates_for_category(category.as_str());
                    let result = catalog.get_or_fetch(key.clone(), &candidates, &region, &currency, false).await;
                    (key, result)
                }
            })
            .buffer_unordered(self.max_parallel_fetch.max(1))
            .collect()
            .await;

        let mut shards: HashMap<ShardKey, crate::domain::CatalogShard> = HashMap::new();
        for (key, result) in fetch_results {
            match result {
                Ok(shard) => {
                    tracer.emit_best_effort(TraceEvent::new(&run_id, Phase::Phase3RetailApi, json!({"shard": key.file_stem(), "rows": shard.rows.len()})));
                    shards.insert(key, shard);
                }
                Err(err) => {
                    warn!(shard = %key.file_stem(), error = %err, "shard fetch failed, resources in this shard classified missing");
                    tracer.emit_best_effort(TraceEvent::new(&run_id, Phase::Phase3RetailApi, json!({"shard": key.file_stem(), "error": err.to_string()})));
                    shards.insert(key.clone(), crate::domain::CatalogShard::empty(key));
                }
            }
        }

        if self.is_cancelled() {
            return Err(CostPilotError::Cancelled);
        }

        // Phases 4-6: score, adjudicate, cost — per resource, per scenario.
        let mut priced_lines: HashMap<String, Vec<PricedLine>> = HashMap::new();
        let quantity_model = QuantityModel::new(self.missing_category_placeholder, self.reservation_hourly_implausible_threshold);

        for scenario in &plan.scenarios {
            let mut lines = Vec::with_capacity(scenario.resources.len());
            for resource in &scenario.resources {
                let key = ShardKey::new(resource.category.as_str(), &self.region, &self.currency);
                let empty_shard = crate::domain::CatalogShard::empty(key.clone());
                let shard = shards.get(&key).unwrap_or(&empty_shard);

                let candidates = Scorer::score(resource, shard);
                tracer.emit_best_effort(
                    TraceEvent::new(&run_id, Phase::Phase4Scoring, json!({"candidates": candidates.len()}))
                        .with_scenario(&scenario.id)
                        .with_resource(&resource.id),
                );

                let top_k: Vec<_> = candidates.iter().take(5).cloned().collect();
                let selected = self.adjudicator.adjudicate(resource, &top_k, &self.adjudication_policy).await;
                tracer.emit_best_effort(
                    TraceEvent::new(&run_id, Phase::Phase5Adjudication, json!({"selected": selected.is_some()}))
                        .with_scenario(&scenario.id)
                        .with_resource(&resource.id),
                );

                let hours = resource.hours_per_month.unwrap_or(self.hours_per_month);
                let line = quantity_model.cost(resource, &scenario.id, selected, hours);
                tracer.emit_best_effort(
                    TraceEvent::new(&run_id, Phase::Phase6Costing, json!({"pricing_status": line.pricing_status}))
                        .with_scenario(&scenario.id)
                        .with_resource(&resource.id),
                );

                lines.push(line);

                if self.is_cancelled() {
                    return Err(CostPilotError::Cancelled);
                }
            }
            priced_lines.insert(scenario.id.clone(), lines);
        }

        // Phase 7 — totals, comparability, report. Always runs.
        let placeholder = Decimal::from_f64(self.missing_category_placeholder).unwrap_or(Decimal::ZERO);
        let mut scenario_totals = HashMap::new();
        for scenario in &plan.scenarios {
            let lines = priced_lines.get(&scenario.id).cloned().unwrap_or_default();
            let totals = TotalsEngine::compute(&scenario.id, &lines, &scenario.resources, placeholder);
            scenario_totals.insert(scenario.id.clone(), totals);
        }

        let baseline = plan.baseline();
        let mut comparability = HashMap::new();
        if let Some(baseline_scenario) = baseline {
            let baseline_lines = priced_lines.get(&baseline_scenario.id).cloned().unwrap_or_default();
            for scenario in &plan.scenarios {
                if scenario.id == baseline_scenario.id {
                    continue;
                }
                let scenario_lines = priced_lines.get(&scenario.id).cloned().unwrap_or_default();
                let verdict = TotalsEngine::comparability(&scenario_lines, &scenario.resources, &baseline_lines, &baseline_scenario.resources);
                let verdict = TotalsEngine::with_delta(verdict, &scenario_totals[&scenario.id], &scenario_totals[&baseline_scenario.id]);
                comparability.insert(scenario.id.clone(), verdict);
            }
        }

        let report_inputs: Vec<ScenarioReportInput> = plan
            .scenarios
            .iter()
            .map(|scenario| {
                let totals = &scenario_totals[&scenario.id];
                let comparability_input = comparability
                    .get(&scenario.id)
                    .map(|v| (v.status, v.reasons.as_slice(), v.monthly_delta));
                ScenarioReportInput {
                    name: scenario.name.clone(),
                    totals,
                    comparability: comparability_input,
                }
            })
            .collect();

        let report_markdown = report::render(&run_id, &self.region, &self.currency, &report_inputs)?;
        artifacts.write_report(&report_markdown).await?;
        artifacts.write_plan_enriched(&priced_lines).await?;

        tracer.emit(TraceEvent::new(&run_id, Phase::Phase7Reporting, json!({"scenarios": plan.scenarios.len()})))?;
        tracer.close()?;

        info!(run_id = %run_id, "pipeline run complete");

        Ok(RunOutcome {
            run_id,
            plan,
            priced_lines,
            scenario_totals,
            comparability,
            report_markdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_pack::StaticKnowledgePack;
    use crate::llm::FixtureLlmClient;

    fn valid_plan_json() -> String {
        serde_json::json!({
            "metadata": {
                "region": "eastus",
                "currency": "USD",
                "hours_per_month": 730.0,
                "repair_iterations": 0,
                "knowledge_pack_hash": "",
                "tool_version": ""
            },
            "scenarios": [{
                "id": "baseline",
                "name": "baseline",
                "resources": [{
                    "id": "appsvc-1",
                    "category": "appservice",
                    "service_name": "Azure App Service",
                    "arm_sku_name": "P1v3",
                    "quantity": 1.0,
                    "hours_per_month": 730.0
                }]
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn planner_failure_aborts_before_later_phases() {
        let dir = tempfile::tempdir().unwrap();
        let pack: Arc<dyn KnowledgePack> = Arc::new(StaticKnowledgePack::new().with_category("appservice", vec!["Azure App Service".to_string()]));
        let catalog = Arc::new(RetailCatalog::new(dir.path().join("cache"), 5, 1).unwrap());
        let llm: Arc<dyn LlmClient> = Arc::new(FixtureLlmClient::new(vec!["not json".to_string(); 3]));

        let orchestrator = Orchestrator::new(
            "eastus",
            "USD",
            730.0,
            dir.path().join("runs"),
            4,
            100.0,
            50.0,
            AdjudicationPolicy::Off,
            pack,
            catalog,
            llm,
            "test-model",
            3,
        );

        let result = orchestrator.run("one app service", &["appservice"]).await;
        assert!(matches!(result, Err(CostPilotError::Planner { .. })));
    }

    #[tokio::test]
    async fn zero_resources_scenario_still_produces_a_report() {
        let dir = tempfile::tempdir().unwrap();
        let pack: Arc<dyn KnowledgePack> = Arc::new(StaticKnowledgePack::new());
        let catalog = Arc::new(RetailCatalog::new(dir.path().join("cache"), 5, 1).unwrap());

        let empty_plan = serde_json::json!({
            "metadata": {
                "region": "eastus", "currency": "USD", "hours_per_month": 730.0,
                "repair_iterations": 0, "knowledge_pack_hash": "", "tool_version": ""
            },
            "scenarios": [{"id": "baseline", "name": "baseline", "resources": []}]
        })
        .to_string();

        let llm: Arc<dyn LlmClient> = Arc::new(FixtureLlmClient::new(vec![empty_plan]));
        let orchestrator = Orchestrator::new(
            "eastus", "USD", 730.0, dir.path().join("runs"), 4, 100.0, 50.0,
            AdjudicationPolicy::Off, pack, catalog, llm, "test-model", 3,
        );

        let outcome = orchestrator.run("nothing", &[]).await.unwrap();
        assert_eq!(outcome.scenario_totals["baseline"].monthly_with_estimates, Decimal::ZERO);
        assert!(outcome.report_markdown.contains("baseline"));
    }

    #[tokio::test]
    async fn app_service_resource_is_priced_when_catalog_has_exact_match() {
        let dir = tempfile::tempdir().unwrap();
        let pack: Arc<dyn KnowledgePack> = Arc::new(StaticKnowledgePack::new().with_category("appservice", vec!["Azure App Service".to_string()]));
        let cache_dir = dir.path().join("cache");
        std::fs::create_dir_all(&cache_dir).unwrap();

        // Pre-seed the shard cache so the pipeline costs without a live HTTP fetch.
        let key = ShardKey::new("appservice", "eastus", "USD");
        let row = crate::domain::CatalogRow {
            service_name: "Azure App Service".to_string(),
            product_name: "Azure App Service".to_string(),
            sku_name: "P1v3".to_string(),
            meter_name: "P1 v3".to_string(),
            arm_sku_name: "P1v3".to_string(),
            arm_region_name: "eastus".to_string(),
            currency_code: "USD".to_string(),
            unit_of_measure: "1 Hour".to_string(),
            retail_price: rust_decimal_macros::dec!(0.29),
            row_type: crate::domain::catalog::CatalogRowType::Consumption,
            reservation_term: String::new(),
            effective_start_date: chrono::Utc::now(),
        };
        let shard_path = cache_dir.join(format!("{}.jsonl", key.file_stem()));
        let mut file = std::fs::File::create(&shard_path).unwrap();
        serde_json::to_writer(&mut file, &row).unwrap();
        use std::io::Write;
        file.write_all(b"\n").unwrap();

        let catalog = Arc::new(RetailCatalog::new(cache_dir, 5, 1).unwrap());
        let llm: Arc<dyn LlmClient> = Arc::new(FixtureLlmClient::new(vec![valid_plan_json()]));

        let orchestrator = Orchestrator::new(
            "eastus", "USD", 730.0, dir.path().join("runs"), 4, 100.0, 50.0,
            AdjudicationPolicy::ForceExact, pack, catalog, llm, "test-model", 3,
        );

        let outcome = orchestrator.run("one app service plan", &["appservice"]).await.unwrap();
        let line = &outcome.priced_lines["baseline"][0];
        assert_eq!(line.pricing_status, crate::domain::PricingStatus::Priced);
        assert_eq!(line.monthly_cost, Some(rust_decimal_macros::dec!(211.70)));
    }
}
