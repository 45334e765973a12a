//! Skill node type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{NodeLabel, NodeRecord};

/// A named competency. The name is the node's natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Skill {
    /// Canonicalize a name for duplicate detection
    ///
    /// Converts to lowercase, removes special characters, and normalizes whitespace
    pub fn canonicalize(name: &str) -> String {
        name.to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Trim a user-supplied skill name, rejecting blank ones
    pub fn normalize_name(name: &str) -> Result<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Skill name cannot be empty".into()));
        }
        Ok(trimmed.to_string())
    }
}

impl TryFrom<NodeRecord> for Skill {
    type Error = Error;

    fn try_from(record: NodeRecord) -> Result<Self> {
        record.expect_label(NodeLabel::Skill)?;
        Ok(Self {
            description: record.str_prop("description").map(str::to_string),
            id: record.id,
            name: record.key,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize() {
        assert_eq!(Skill::canonicalize("  Rust   Programming! "), "rust programming");
        assert_eq!(Skill::canonicalize("C++"), "c");
        assert_eq!(Skill::canonicalize("Node.js"), "nodejs");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(Skill::normalize_name("  Rust ").unwrap(), "Rust");
        assert!(matches!(Skill::normalize_name("   "), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_from_record() {
        let record = NodeRecord {
            id: "s1".into(),
            label: NodeLabel::Skill,
            key: "Rust".into(),
            properties: json!({"description": "Systems language"}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let skill = Skill::try_from(record).unwrap();
        assert_eq!(skill.name, "Rust");
        assert_eq!(skill.description.as_deref(), Some("Systems language"));
    }

    #[test]
    fn test_from_wrong_label() {
        let record = NodeRecord {
            id: "u1".into(),
            label: NodeLabel::User,
            key: "ada@example.com".into(),
            properties: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(Skill::try_from(record).is_err());
    }
}
