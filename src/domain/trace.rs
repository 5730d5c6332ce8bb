//! Execution trace event — one structured record per notable thing that
//! happens during a run, written append-only by the Tracer (§3, §4.10).
//! Grounded on the teacher's `agents::contracts::decision_event::DecisionEvent`
//! (a similarly flat, serde-tagged, timestamped event struct).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Phase0Setup,
    Phase1Planner,
    Phase1PlannerRepair,
    Phase2Validation,
    Phase3RetailApi,
    Phase4Scoring,
    Phase5Adjudication,
    Phase6Costing,
    Phase7Reporting,
}

impl Phase {
    /// Strict phase ordinal used to assert the phase partial order (§5:
    /// "phase_k events precede phase_{k+1}").
    pub fn ordinal(&self) -> u8 {
        match self {
            Phase::Phase0Setup => 0,
            Phase::Phase1Planner => 1,
            Phase::Phase1PlannerRepair => 1,
            Phase::Phase2Validation => 2,
            Phase::Phase3RetailApi => 3,
            Phase::Phase4Scoring => 4,
            Phase::Phase5Adjudication => 5,
            Phase::Phase6Costing => 6,
            Phase::Phase7Reporting => 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub payload: Value,
}

impl TraceEvent {
    pub fn new(run_id: impl Into<String>, phase: Phase, payload: Value) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: Utc::now(),
            phase,
            scenario_id: None,
            resource_id: None,
            payload,
        }
    }

    pub fn with_scenario(mut self, scenario_id: impl Into<String>) -> Self {
        self.scenario_id = Some(scenario_id.into());
        self
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn phase_ordinals_are_monotonic() {
        assert!(Phase::Phase1Planner.ordinal() < Phase::Phase2Validation.ordinal());
        assert!(Phase::Phase2Validation.ordinal() < Phase::Phase3RetailApi.ordinal());
        assert!(Phase::Phase6Costing.ordinal() < Phase::Phase7Reporting.ordinal());
    }

    #[test]
    fn planner_and_repair_share_an_ordinal() {
        assert_eq!(Phase::Phase1Planner.ordinal(), Phase::Phase1PlannerRepair.ordinal());
    }

    #[test]
    fn builder_attaches_ids() {
        let event = TraceEvent::new("run-1", Phase::Phase4Scoring, json!({"candidates": 3}))
            .with_scenario("baseline")
            .with_resource("vm-1");
        assert_eq!(event.scenario_id.as_deref(), Some("baseline"));
        assert_eq!(event.resource_id.as_deref(), Some("vm-1"));
    }

    #[test]
    fn event_serializes_without_null_ids() {
        let event = TraceEvent::new("run-1", Phase::Phase0Setup, json!({}));
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("scenario_id"));
        assert!(!json.contains("resource_id"));
    }
}
