//! `TaskRegistry`: the static table of supported analyses, their prompt
//! templates, and the post-parse validation each one requires.

use std::collections::HashMap;
use std::sync::OnceLock;

use echolia_types::TaskTag;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown task tag: {0}")]
    UnknownTask(String),

    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

/// A single memory item extracted from a journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub kind: MemoryKind,
    pub content: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Commitment,
    Fact,
    Insight,
    Pattern,
    Preference,
}

impl MemoryKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "commitment" => Some(Self::Commitment),
            "fact" => Some(Self::Fact),
            "insight" => Some(Self::Insight),
            "pattern" => Some(Self::Pattern),
            "preference" => Some(Self::Preference),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagItem {
    pub tag: String,
    pub confidence: f64,
}

/// The canonical, schema-validated result of one task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskResult {
    MemoryDistillation { memories: Vec<MemoryItem>, confidence: f64 },
    Tagging { tags: Vec<TagItem>, confidence: f64 },
    InsightExtraction { insights: Vec<String>, confidence: f64 },
}

/// A statically defined analysis: its prompts and its output contract.
pub struct TaskDescriptor {
    pub tag: TaskTag,
    pub system_prompt: &'static str,
    pub user_template: &'static str,
}

impl TaskDescriptor {
    /// Fills the user template with the verbatim plaintext. No escaping:
    /// the plaintext is the message body, not embedded in surrounding
    /// structure the model could misparse.
    pub fn format(&self, plaintext: &str) -> (String, String) {
        (
            self.system_prompt.to_string(),
            self.user_template.replace("{{content}}", plaintext),
        )
    }
}

fn descriptors() -> &'static HashMap<TaskTag, TaskDescriptor> {
    static TABLE: OnceLock<HashMap<TaskTag, TaskDescriptor>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        table.insert(
            TaskTag::MemoryDistillation,
            TaskDescriptor {
                tag: TaskTag::MemoryDistillation,
                system_prompt: "You distill durable memories from a single journal entry. \
                    Respond with JSON only: {\"memories\": [{\"kind\": \"commitment|fact|insight|pattern|preference\", \
                    \"content\": string, \"confidence\": number between 0 and 1}], \"confidence\": number between 0 and 1}. \
                    Use an empty array if nothing durable is present.",
                user_template: "Journal entry:\n{{content}}",
            },
        );
        table.insert(
            TaskTag::Tagging,
            TaskDescriptor {
                tag: TaskTag::Tagging,
                system_prompt: "You assign topical tags to a single journal entry. \
                    Respond with JSON only: {\"tags\": [{\"tag\": string (lowercase, single word preferred), \
                    \"confidence\": number between 0 and 1}], \"confidence\": number between 0 and 1}.",
                user_template: "Journal entry:\n{{content}}",
            },
        );
        table.insert(
            TaskTag::InsightExtraction,
            TaskDescriptor {
                tag: TaskTag::InsightExtraction,
                system_prompt: "You extract standalone insights from a single journal entry. \
                    Respond with JSON only: {\"insights\": [string], \"confidence\": number between 0 and 1}.",
                user_template: "Journal entry:\n{{content}}",
            },
        );
        table
    })
}

/// Static table of supported analyses plus their prompt/schema logic.
pub struct TaskRegistry;

impl TaskRegistry {
    /// Constant-time table lookup (a `HashMap` get behind a `OnceLock`).
    pub fn lookup(tag: TaskTag) -> Result<&'static TaskDescriptor, RegistryError> {
        descriptors()
            .get(&tag)
            .ok_or_else(|| RegistryError::UnknownTask(tag.to_string()))
    }

    /// Strips an optional triple-backtick fence, JSON-decodes, then
    /// validates against the descriptor's schema.
    pub fn parse(descriptor: &TaskDescriptor, model_output: &str) -> Result<TaskResult, RegistryError> {
        let stripped = strip_code_fence(model_output);
        let value: Value = serde_json::from_str(&stripped)
            .map_err(|e| RegistryError::MalformedOutput(format!("invalid JSON: {e}")))?;

        match descriptor.tag {
            TaskTag::MemoryDistillation => parse_memory_distillation(&value),
            TaskTag::Tagging => parse_tagging(&value),
            TaskTag::InsightExtraction => parse_insight_extraction(&value),
        }
    }
}

fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim().to_string()
}

fn confidence(value: &Value, context: &str) -> Result<f64, RegistryError> {
    let n = value
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| RegistryError::MalformedOutput(format!("{context}: missing numeric confidence")))?;
    if !(0.0..=1.0).contains(&n) {
        return Err(RegistryError::MalformedOutput(format!(
            "{context}: confidence {n} out of [0,1]"
        )));
    }
    Ok(n)
}

fn non_empty_string(value: &Value, field: &str, context: &str) -> Result<String, RegistryError> {
    let s = value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| RegistryError::MalformedOutput(format!("{context}: missing field {field}")))?;
    if s.is_empty() {
        return Err(RegistryError::MalformedOutput(format!("{context}: {field} is empty")));
    }
    Ok(s.to_string())
}

fn parse_memory_distillation(value: &Value) -> Result<TaskResult, RegistryError> {
    let top_confidence = confidence(value, "memory_distillation")?;
    let items = value
        .get("memories")
        .and_then(Value::as_array)
        .ok_or_else(|| RegistryError::MalformedOutput("memory_distillation: missing memories array".into()))?;

    let mut memories = Vec::with_capacity(items.len());
    for item in items {
        let kind_str = non_empty_string(item, "kind", "memory_distillation.memories[]")?;
        let kind = MemoryKind::parse(&kind_str)
            .ok_or_else(|| RegistryError::MalformedOutput(format!("unknown memory kind: {kind_str}")))?;
        let content = non_empty_string(item, "content", "memory_distillation.memories[]")?;
        let item_confidence = confidence(item, "memory_distillation.memories[]")?;
        memories.push(MemoryItem {
            kind,
            content,
            confidence: item_confidence,
        });
    }

    Ok(TaskResult::MemoryDistillation {
        memories,
        confidence: top_confidence,
    })
}

fn parse_tagging(value: &Value) -> Result<TaskResult, RegistryError> {
    let top_confidence = confidence(value, "tagging")?;
    let items = value
        .get("tags")
        .and_then(Value::as_array)
        .ok_or_else(|| RegistryError::MalformedOutput("tagging: missing tags array".into()))?;

    let mut tags = Vec::with_capacity(items.len());
    for item in items {
        let tag = non_empty_string(item, "tag", "tagging.tags[]")?;
        let item_confidence = confidence(item, "tagging.tags[]")?;
        tags.push(TagItem {
            tag,
            confidence: item_confidence,
        });
    }

    Ok(TaskResult::Tagging {
        tags,
        confidence: top_confidence,
    })
}

fn parse_insight_extraction(value: &Value) -> Result<TaskResult, RegistryError> {
    let top_confidence = confidence(value, "insight_extraction")?;
    let items = value
        .get("insights")
        .and_then(Value::as_array)
        .ok_or_else(|| RegistryError::MalformedOutput("insight_extraction: missing insights array".into()))?;

    let mut insights = Vec::with_capacity(items.len());
    for item in items {
        let text = item
            .as_str()
            .ok_or_else(|| RegistryError::MalformedOutput("insight_extraction: insight is not a string".into()))?;
        if text.is_empty() {
            return Err(RegistryError::MalformedOutput("insight_extraction: empty insight".into()));
        }
        insights.push(text.to_string());
    }

    Ok(TaskResult::InsightExtraction {
        insights,
        confidence: top_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_every_known_tag() {
        for tag in TaskTag::ALL {
            assert!(TaskRegistry::lookup(tag).is_ok());
        }
    }

    #[test]
    fn format_inserts_plaintext_verbatim() {
        let descriptor = TaskRegistry::lookup(TaskTag::Tagging).unwrap();
        let (_system, user) = descriptor.format("had a rough day, need to call the dentist");
        assert!(user.contains("had a rough day, need to call the dentist"));
    }

    #[test]
    fn parse_strips_triple_backtick_json_fence() {
        let descriptor = TaskRegistry::lookup(TaskTag::InsightExtraction).unwrap();
        let output = "```json\n{\"insights\": [\"likes mornings\"], \"confidence\": 0.8}\n```";
        let result = TaskRegistry::parse(descriptor, output).unwrap();
        assert!(matches!(result, TaskResult::InsightExtraction { .. }));
    }

    #[test]
    fn parse_memory_distillation_accepts_empty_array() {
        let descriptor = TaskRegistry::lookup(TaskTag::MemoryDistillation).unwrap();
        let output = r#"{"memories": [], "confidence": 0.1}"#;
        let result = TaskRegistry::parse(descriptor, output).unwrap();
        match result {
            TaskResult::MemoryDistillation { memories, confidence } => {
                assert!(memories.is_empty());
                assert_eq!(confidence, 0.1);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn parse_rejects_unknown_memory_kind() {
        let descriptor = TaskRegistry::lookup(TaskTag::MemoryDistillation).unwrap();
        let output = r#"{"memories": [{"kind": "rumor", "content": "x", "confidence": 0.5}], "confidence": 0.5}"#;
        let result = TaskRegistry::parse(descriptor, output);
        assert!(matches!(result, Err(RegistryError::MalformedOutput(_))));
    }

    #[test]
    fn parse_rejects_confidence_out_of_range() {
        let descriptor = TaskRegistry::lookup(TaskTag::Tagging).unwrap();
        let output = r#"{"tags": [{"tag": "work", "confidence": 1.5}], "confidence": 0.5}"#;
        let result = TaskRegistry::parse(descriptor, output);
        assert!(matches!(result, Err(RegistryError::MalformedOutput(_))));
    }

    #[test]
    fn parse_rejects_non_json_output() {
        let descriptor = TaskRegistry::lookup(TaskTag::Tagging).unwrap();
        let result = TaskRegistry::parse(descriptor, "not json at all");
        assert!(matches!(result, Err(RegistryError::MalformedOutput(_))));
    }

    #[test]
    fn parse_rejects_missing_required_field() {
        let descriptor = TaskRegistry::lookup(TaskTag::Tagging).unwrap();
        let output = r#"{"tags": [{"confidence": 0.5}], "confidence": 0.5}"#;
        let result = TaskRegistry::parse(descriptor, output);
        assert!(matches!(result, Err(RegistryError::MalformedOutput(_))));
    }

    #[test]
    fn parse_ignores_unknown_object_fields() {
        let descriptor = TaskRegistry::lookup(TaskTag::InsightExtraction).unwrap();
        let output = r#"{"insights": ["ok"], "confidence": 0.4, "model_notes": "ignored"}"#;
        let result = TaskRegistry::parse(descriptor, output).unwrap();
        assert!(matches!(result, TaskResult::InsightExtraction { .. }));
    }
}
