//! The supported analysis task tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported analysis tag. Extensible, but every variant here must have
/// exactly one `TaskDescriptor` in `echolia-llm::registry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTag {
    MemoryDistillation,
    Tagging,
    InsightExtraction,
}

impl TaskTag {
    pub const ALL: [TaskTag; 3] = [
        TaskTag::MemoryDistillation,
        TaskTag::Tagging,
        TaskTag::InsightExtraction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemoryDistillation => "memory_distillation",
            Self::Tagging => "tagging",
            Self::InsightExtraction => "insight_extraction",
        }
    }
}

impl fmt::Display for TaskTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a request names a task tag with no registered descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTask(pub String);

impl FromStr for TaskTag {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory_distillation" => Ok(Self::MemoryDistillation),
            "tagging" => Ok(Self::Tagging),
            "insight_extraction" => Ok(Self::InsightExtraction),
            other => Err(UnknownTask(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for tag in TaskTag::ALL {
            let parsed: TaskTag = tag.as_str().parse().unwrap();
            assert_eq!(parsed, tag);
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        let result = "summarization".parse::<TaskTag>();
        assert_eq!(result, Err(UnknownTask("summarization".to_string())));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&TaskTag::InsightExtraction).unwrap();
        assert_eq!(json, "\"insight_extraction\"");
    }
}
