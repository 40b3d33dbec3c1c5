use super::{persist, LifecycleError, LifecyclePhase};
use crate::launch::ExitOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Last settled phase of a runner, recorded so a later `teardown` in another
/// process reports what actually happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub phase: LifecyclePhase,
    pub outcome: Option<ExitOutcome>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(phase: LifecyclePhase, outcome: Option<ExitOutcome>) -> Self {
        Self {
            phase,
            outcome,
            updated_at: Utc::now(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), LifecycleError> {
        persist::save_json(self, path)
    }

    pub fn load(path: &Path) -> Result<Option<Self>, LifecycleError> {
        persist::load_json(path)
    }
}
