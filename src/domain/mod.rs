//! Core data model: `Plan`, `Scenario`, `Resource`, the Retail Prices
//! catalog types, scoring candidates, priced lines, and the execution
//! trace event. Mirrors the teacher's `domain::usage`/`domain::pricing`
//! split — one file per entity family, a shared `error` import, and a
//! `#[cfg(test)] mod tests` at the bottom of each.

pub mod catalog;
pub mod plan;
pub mod pricing;
pub mod trace;

pub use catalog::{CatalogRow, CatalogShard, CatalogRowType, ShardKey};
pub use plan::{BillingModel, Metadata, Plan, Resource, ResourceCategory, Scenario};
pub use pricing::{Candidate, CategoryPlaceholder, PricedLine, PricingStatus};
pub use trace::{Phase, TraceEvent};
