//! Skill-name matching
//!
//! Deciding whether a candidate skill name duplicates an existing one is
//! delegated to a [`SkillMatcher`]. In production that is typically a
//! model-backed service living outside this crate; [`CanonicalNameMatcher`]
//! is the deterministic implementation shipped here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::entity::Skill;
use crate::error::Result;

/// Outcome of matching one candidate against the existing skill names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillMatch {
    pub is_duplicate: bool,
    pub existing_name: Option<String>,
}

impl SkillMatch {
    /// The candidate is a new skill
    pub fn distinct() -> Self {
        Self {
            is_duplicate: false,
            existing_name: None,
        }
    }

    /// The candidate duplicates `name`
    pub fn duplicate_of(name: impl Into<String>) -> Self {
        Self {
            is_duplicate: true,
            existing_name: Some(name.into()),
        }
    }
}

/// Classifies candidate skill names against existing ones
#[async_trait]
pub trait SkillMatcher: Send + Sync {
    async fn find_match(&self, candidate: &str, existing: &[String]) -> Result<SkillMatch>;
}

/// Treats names as duplicates when their canonical forms are equal
/// (case, punctuation and spacing are ignored)
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalNameMatcher;

#[async_trait]
impl SkillMatcher for CanonicalNameMatcher {
    async fn find_match(&self, candidate: &str, existing: &[String]) -> Result<SkillMatch> {
        let canonical = Skill::canonicalize(candidate);
        if canonical.is_empty() {
            return Ok(SkillMatch::distinct());
        }

        Ok(existing
            .iter()
            .find(|name| Skill::canonicalize(name) == canonical)
            .map(SkillMatch::duplicate_of)
            .unwrap_or_else(SkillMatch::distinct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing() -> Vec<String> {
        vec!["Rust Programming".to_string(), "Node.js".to_string()]
    }

    #[tokio::test]
    async fn test_canonical_duplicate() {
        let found = CanonicalNameMatcher
            .find_match("  rust   PROGRAMMING ", &existing())
            .await
            .unwrap();
        assert_eq!(found, SkillMatch::duplicate_of("Rust Programming"));

        let found = CanonicalNameMatcher.find_match("nodejs", &existing()).await.unwrap();
        assert_eq!(found.existing_name.as_deref(), Some("Node.js"));
    }

    #[tokio::test]
    async fn test_distinct_candidate() {
        let found = CanonicalNameMatcher.find_match("Go", &existing()).await.unwrap();
        assert_eq!(found, SkillMatch::distinct());

        let found = CanonicalNameMatcher.find_match("!!!", &existing()).await.unwrap();
        assert!(!found.is_duplicate);
    }

    #[test]
    fn test_wire_shape() {
        let encoded = serde_json::to_value(SkillMatch::duplicate_of("Rust")).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({"isDuplicate": true, "existingName": "Rust"})
        );
    }
}
