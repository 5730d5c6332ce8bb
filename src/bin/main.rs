//! Minimal runnable entry point. A full CLI flag surface (commands,
//! subcommands, output formats) is explicitly out of scope (§1) — this
//! binary exists so the pipeline can be invoked end to end: read a
//! workload description from argv or stdin, run it, print where the
//! artifacts landed.

use std::path::PathBuf;
use std::sync::Arc;

use costpilot::adjudicator::AdjudicationPolicy;
use costpilot::knowledge_pack::{JsonKnowledgePack, KnowledgePack, StaticKnowledgePack};
use costpilot::llm::http::{HttpLlmClient, HttpLlmConfig};
use costpilot::llm::LlmClient;
use costpilot::orchestrator::Orchestrator;
use costpilot::retail::RetailCatalog;
use costpilot::{observability, CostPilotError, Result, RunConfig};
use tracing::info;

const DEFAULT_CATEGORIES: &[&str] = &[
    "compute.vm",
    "compute.vmss",
    "compute.aks",
    "db.sql",
    "cache.redis",
    "storage.blob",
    "storage.disk",
    "network.vnet",
    "network.appgw",
    "network.nat",
    "network.egress",
    "network.public_ip",
    "network.bastion",
    "network.gateway",
    "security.keyvault",
    "monitoring.loganalytics",
    "backup.vault",
    "dr.asr",
    "appservice",
    "analytics.databricks",
    "analytics.datafactory",
    "analytics.fabric",
];

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let description = std::env::args()
        .nth(1)
        .ok_or_else(|| CostPilotError::config("usage: costpilot <workload description>"))?;

    let config_path = std::env::var("COSTPILOT_CONFIG").ok().map(PathBuf::from);
    let config = RunConfig::load(config_path.as_deref())?;
    config.validate()?;

    info!(region = %config.region, currency = %config.currency, "starting run");

    let pack: Arc<dyn KnowledgePack> = match &config.knowledge_pack_path {
        Some(path) => Arc::new(JsonKnowledgePack::load(path)?),
        None => Arc::new(StaticKnowledgePack::new()),
    };

    let catalog = Arc::new(RetailCatalog::new(
        &config.cache_dir,
        config.http_timeout_secs,
        config.max_retries,
    )?);

    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(HttpLlmConfig {
        endpoint: std::env::var("COSTPILOT_LLM_ENDPOINT")
            .map_err(|_| CostPilotError::config("COSTPILOT_LLM_ENDPOINT must be set"))?,
        api_key: std::env::var("COSTPILOT_LLM_API_KEY").unwrap_or_default(),
        timeout_secs: config.llm_timeout_secs,
        max_retries: config.max_retries,
    }));
    let model = std::env::var("COSTPILOT_LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

    let orchestrator = Orchestrator::new(
        config.region.clone(),
        config.currency.clone(),
        config.hours_per_month,
        config.runs_dir.clone(),
        config.max_parallel_fetch,
        config.missing_category_placeholder,
        config.reservation_hourly_implausible_threshold,
        AdjudicationPolicy::Llm {
            top_k: config.adjudicator_top_k,
        },
        pack,
        catalog,
        llm,
        model,
        config.max_planner_attempts,
    );

    let outcome = orchestrator.run(&description, DEFAULT_CATEGORIES).await?;

    println!("run {} complete", outcome.run_id);
    for (scenario_id, totals) in &outcome.scenario_totals {
        println!(
            "  {scenario_id}: monthly (with estimates) = {}",
            totals.monthly_with_estimates
        );
    }
    println!("report and artifacts written under {}/{}", config.runs_dir.display(), outcome.run_id);

    Ok(())
}
