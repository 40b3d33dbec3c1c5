use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a runner is in its `setup -> start -> teardown` lifecycle.
///
/// ```text
/// Uninitialized --setup--> Resolving --candidate--> Resolved --start--> Running --exit--> Completed
///                              |
///                              +--fatal--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Uninitialized,
    Resolving,
    Resolved,
    Running,
    Completed,
    Failed,
}

impl LifecyclePhase {
    pub fn can_transition_to(self, next: LifecyclePhase) -> bool {
        use LifecyclePhase::*;
        matches!(
            (self, next),
            (Uninitialized, Resolving)
                | (Resolving, Resolving)
                | (Resolving, Resolved)
                | (Resolving, Failed)
                | (Resolved, Running)
                | (Running, Completed)
                | (Running, Failed)
        )
    }

    /// Phases from which no further work happens.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecyclePhase::Completed | LifecyclePhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecyclePhase::Uninitialized => "uninitialized",
            LifecyclePhase::Resolving => "resolving",
            LifecyclePhase::Resolved => "resolved",
            LifecyclePhase::Running => "running",
            LifecyclePhase::Completed => "completed",
            LifecyclePhase::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
