//! Renders `report.md` (§6 run artifact). This crate owns only a minimal
//! rendering of the `TotalsEngine` output and comparability verdicts
//! through one `handlebars` template — the FinOps report's visual design
//! is explicitly an external collaborator's concern (§1 scope note); this
//! module exists so "every run yields a report" (§7) holds even without
//! that collaborator wired in.

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::Result;
use crate::totals::{ComparabilityStatus, ScenarioTotals};

const TEMPLATE: &str = r#"# CostPilot FinOps Report

Run `{{run_id}}` — region `{{region}}`, currency `{{currency}}`.

{{#each scenarios}}
## Scenario: {{this.name}}

| | Monthly | Yearly |
|---|---:|---:|
| Priced | {{this.monthly_priced}} | {{this.yearly_priced}} |
| Estimated | {{this.monthly_estimated}} | {{this.yearly_estimated}} |
| Missing (placeholder) | {{this.monthly_missing}} | {{this.yearly_missing}} |
| **With estimates** | **{{this.monthly_with_estimates}}** | **{{this.yearly_with_estimates}}** |

{{#if this.comparable}}
Comparable to baseline: **{{this.comparability_status}}**{{#if this.monthly_delta}} (Δ monthly {{this.monthly_delta}}){{/if}}
{{#if this.comparability_reasons}}
Reasons:
{{#each this.comparability_reasons}}
- {{this}}
{{/each}}
{{/if}}
{{/if}}

{{/each}}
"#;

#[derive(Debug, Serialize)]
struct ScenarioReportRow {
    name: String,
    monthly_priced: String,
    yearly_priced: String,
    monthly_estimated: String,
    yearly_estimated: String,
    monthly_missing: String,
    yearly_missing: String,
    monthly_with_estimates: String,
    yearly_with_estimates: String,
    comparable: bool,
    comparability_status: String,
    comparability_reasons: Vec<String>,
    monthly_delta: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReportContext {
    run_id: String,
    region: String,
    currency: String,
    scenarios: Vec<ScenarioReportRow>,
}

/// One scenario's totals, plus its comparability verdict when it isn't
/// the baseline (baseline has no verdict against itself).
pub struct ScenarioReportInput<'a> {
    pub name: String,
    pub totals: &'a ScenarioTotals,
    pub comparability: Option<(ComparabilityStatus, &'a [String], Option<rust_decimal::Decimal>)>,
}

pub fn render(run_id: &str, region: &str, currency: &str, scenarios: &[ScenarioReportInput]) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    handlebars
        .register_template_string("report", TEMPLATE)
        .map_err(|err| crate::error::CostPilotError::internal(format!("invalid report template: {err}")))?;

    let rows: Vec<ScenarioReportRow> = scenarios
        .iter()
        .map(|s| {
            let (comparable, status, reasons, delta) = match &s.comparability {
                Some((status, reasons, delta)) => (
                    true,
                    match status {
                        ComparabilityStatus::Comparable => "comparable".to_string(),
                        ComparabilityStatus::NotComparable => "not_comparable".to_string(),
                    },
                    reasons.to_vec(),
                    delta.map(|d| d.to_string()),
                ),
                None => (false, String::new(), Vec::new(), None),
            };
            ScenarioReportRow {
                name: s.name.clone(),
                monthly_priced: s.totals.monthly_priced.to_string(),
                yearly_priced: s.totals.yearly_priced.to_string(),
                monthly_estimated: s.totals.monthly_estimated.to_string(),
                yearly_estimated: s.totals.yearly_estimated.to_string(),
                monthly_missing: s.totals.monthly_missing.to_string(),
                yearly_missing: s.totals.yearly_missing.to_string(),
                monthly_with_estimates: s.totals.monthly_with_estimates.to_string(),
                yearly_with_estimates: s.totals.yearly_with_estimates.to_string(),
                comparable,
                comparability_status: status,
                comparability_reasons: reasons,
                monthly_delta: delta,
            }
        })
        .collect();

    let context = ReportContext {
        run_id: run_id.to_string(),
        region: region.to_string(),
        currency: currency.to_string(),
        scenarios: rows,
    };

    Ok(handlebars.render("report", &context)?)
}
