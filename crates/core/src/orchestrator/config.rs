use serde::{Deserialize, Serialize};

/// Orchestrator tuning knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Upper bound on events processed in one cycle (0 = unlimited).
    #[serde(default)]
    pub max_events_per_cycle: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_events_per_cycle: 0,
        }
    }
}
