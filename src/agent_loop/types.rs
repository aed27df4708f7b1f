//! Run identity and outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Context, Usage};

/// Unique run identifier.
pub type RunId = Uuid;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Canceled,
}

/// What a finished run produced.
///
/// `context` is the conversation as appended up to the moment the run ended,
/// including synthetic tool-result turns. `usage` is the merged total across
/// every provider round-trip. A completed run can still carry an `error`
/// string when it was stopped gracefully (the iteration ceiling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub context: Context,
    #[serde(default)]
    pub usage: Usage,
    pub finished_at: DateTime<Utc>,
}

impl AgentOutcome {
    pub fn completed(context: Context, usage: Usage) -> Self {
        Self {
            status: RunStatus::Completed,
            error: None,
            context,
            usage,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>, context: Context, usage: Usage) -> Self {
        Self {
            status: RunStatus::Failed,
            error: Some(error.into()),
            context,
            usage,
            finished_at: Utc::now(),
        }
    }

    pub fn canceled(context: Context, usage: Usage) -> Self {
        Self {
            status: RunStatus::Canceled,
            error: None,
            context,
            usage,
            finished_at: Utc::now(),
        }
    }
}
