use crate::task::TaskId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RelationshipType {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl RelationshipType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::FinishToStart => "FS",
            RelationshipType::StartToStart => "SS",
            RelationshipType::FinishToFinish => "FF",
            RelationshipType::StartToFinish => "SF",
        }
    }

    /// Accepts the short codes and the `PR_FS`-style codes found in exports.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_uppercase();
        let code = code.strip_prefix("PR_").unwrap_or(&code);
        match code {
            "FS" | "FINISHTOSTART" => Some(RelationshipType::FinishToStart),
            "SS" | "STARTTOSTART" => Some(RelationshipType::StartToStart),
            "FF" | "FINISHTOFINISH" => Some(RelationshipType::FinishToFinish),
            "SF" | "STARTTOFINISH" => Some(RelationshipType::StartToFinish),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub predecessor_id: TaskId,
    pub successor_id: TaskId,
    #[serde(default)]
    pub relationship: RelationshipType,
    /// Signed offset in work-hours.
    #[serde(default)]
    pub lag_hours: f64,
}

impl Dependency {
    pub fn new(
        predecessor_id: TaskId,
        successor_id: TaskId,
        relationship: RelationshipType,
        lag_hours: f64,
    ) -> Self {
        Self {
            predecessor_id,
            successor_id,
            relationship,
            lag_hours,
        }
    }

    pub fn finish_to_start(predecessor_id: TaskId, successor_id: TaskId) -> Self {
        Self::new(
            predecessor_id,
            successor_id,
            RelationshipType::FinishToStart,
            0.0,
        )
    }
}
