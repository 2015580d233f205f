//! Scenario analysis.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Scenario Engine                  │
//! ├──────────────────────────────────────────────┤
//! │  Scenario           - Named set of shifts    │
//! │  PresetScenarioType - Standard stress ladder │
//! │  ScenarioEngine     - Parallel revaluation   │
//! └──────────────────────────────────────────────┘
//! ```

mod engine;
mod presets;
mod shifts;

pub use engine::{ScenarioEngine, ScenarioResult};
pub use presets::{standard_scenarios, PresetScenarioType};
pub use shifts::Scenario;
