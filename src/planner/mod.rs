//! Phase 1 — Planner. Turns a natural-language workload description into
//! a validated `Plan` by prompting an `LlmClient`, re-prompting with the
//! accumulated errors on failure, up to a bounded attempt count.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::Plan;
use crate::error::{CostPilotError, Result};
use crate::knowledge_pack::KnowledgePack;
use crate::llm::{ChatMessage, ChatRequest, LlmClient};
use crate::schema;

pub struct Planner {
    llm: Arc<dyn LlmClient>,
    pack: Arc<dyn KnowledgePack>,
    model: String,
    max_attempts: u32,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, pack: Arc<dyn KnowledgePack>, model: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            llm,
            pack,
            model: model.into(),
            max_attempts,
        }
    }

    /// `plan(description, hints) -> Plan`. Fails with `CostPilotError::Planner`
    /// carrying every attempt's errors if no attempt within
    /// `max_attempts` yields a valid plan — planner failure is fatal and
    /// aborts the run.
    pub async fn plan(&self, description: &str, categories: &[&str]) -> Result<Plan> {
        let system_prompt = self.build_system_prompt(categories);
        let mut last_raw: Option<String> = None;
        let mut all_errors: Vec<String> = Vec::new();

        for attempt in 1..=self.max_attempts {
            let user_prompt = self.build_user_prompt(description, last_raw.as_deref(), &all_errors);
            let request = ChatRequest::new(
                vec![ChatMessage::system(system_prompt.clone()), ChatMessage::user(user_prompt)],
                self.model.clone(),
            );

            let raw = match self.llm.complete(request).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(attempt, error = %err, "planner LLM call failed");
                    all_errors.push(format!("attempt {attempt}: LLM call failed: {err}"));
                    continue;
                }
            };

            match serde_json::from_str::<Plan>(&raw) {
                Ok(plan) => {
                    let (ok, errors) = schema::validate(&plan, self.pack.as_ref());
                    if ok {
                        info!(attempt, "planner produced a valid plan");
                        return Ok(schema::normalize(plan));
                    }
                    all_errors.extend(errors.iter().map(|e| format!("attempt {attempt}: {e}")));
                    last_raw = Some(raw);
                }
                Err(parse_err) => {
                    all_errors.push(format!("attempt {attempt}: JSON parse error: {parse_err}"));
                    last_raw = Some(raw);
                }
            }
        }

        Err(CostPilotError::Planner {
            attempts: self.max_attempts,
            errors: all_errors,
        })
    }

    fn build_system_prompt(&self, categories: &[&str]) -> String {
        let metadata = self.pack.compact_metadata();
        format!(
            "You are an Azure architecture planner. Allowed categories: {}. \
             Known services and samples: {}. Respond with a single JSON object \
             matching the Plan schema and nothing else.",
            categories.join(", "),
            serde_json::to_string(&metadata).unwrap_or_default()
        )
    }

    fn build_user_prompt(&self, description: &str, prior_raw: Option<&str>, errors: &[String]) -> String {
        if let Some(raw) = prior_raw {
            format!(
                "Workload description: {description}\n\nYour previous response was invalid:\n{raw}\n\n\
                 Errors:\n{}\n\nReturn a corrected JSON plan.",
                errors.join("\n")
            )
        } else {
            format!("Workload description: {description}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_pack::StaticKnowledgePack;
    use crate::llm::FixtureLlmClient;

    fn pack() -> Arc<dyn KnowledgePack> {
        Arc::new(StaticKnowledgePack::new().with_category("appservice", vec!["Azure App Service".to_string()]))
    }

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
                    "quantity": 1.0
                }]
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn succeeds_on_first_valid_response() {
        let llm = Arc::new(FixtureLlmClient::new(vec![valid_plan_json()]));
        let planner = Planner::new(llm, pack(), "test-model", 3);
        let plan = planner.plan("one app service", &["appservice"]).await.unwrap();
        assert_eq!(plan.scenarios.len(), 1);
    }

    #[tokio::test]
    async fn retries_after_invalid_json_then_succeeds() {
        let llm = Arc::new(FixtureLlmClient::new(vec!["not json".to_string(), valid_plan_json()]));
        let planner = Planner::new(llm.clone(), pack(), "test-model", 3);
        let plan = planner.plan("one app service", &["appservice"]).await.unwrap();
        assert_eq!(plan.scenarios.len(), 1);
        assert_eq!(llm.request_count(), 2);
    }

    #[tokio::test]
    async fn fails_after_exhausting_attempts() {
        let llm = Arc::new(FixtureLlmClient::new(vec![
            "not json".to_string(),
            "still not json".to_string(),
            "nope".to_string(),
        ]));
        let planner = Planner::new(llm, pack(), "test-model", 3);
        let result = planner.plan("one app service", &["appservice"]).await;
        match result {
            Err(CostPilotError::Planner { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Planner error, got {other:?}"),
        }
    }
}
