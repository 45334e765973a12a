//! Personalized learning paths
//!
//! Strips the skills a user already has from a resolved path.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::graph::{EdgeType, GraphStore, NodeLabel};

/// `full_path` without the skills in `possessed`, remaining order kept
pub fn personalize(full_path: &[String], possessed: &BTreeSet<String>) -> Vec<String> {
    full_path
        .iter()
        .filter(|skill| !possessed.contains(*skill))
        .cloned()
        .collect()
}

/// Collects the skills a user possesses
#[derive(Debug, Clone)]
pub struct PersonalizedPathFilter {
    store: GraphStore,
}

impl PersonalizedPathFilter {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Skills the user holds directly (with or without a mastery level)
    /// plus those demonstrated by their completed accomplishments. An
    /// unknown user possesses nothing.
    pub async fn possessed_skills(&self, email: &str) -> Result<BTreeSet<String>> {
        let mut tx = self.store.begin().await?;
        let Some(user) = tx.find_node(NodeLabel::User, email.trim()).await? else {
            return Ok(BTreeSet::new());
        };

        let mut skills = BTreeSet::new();
        for edge_type in [EdgeType::HasMasteryOf, EdgeType::HasSkill] {
            for held in tx.targets(&user.id, edge_type).await? {
                skills.insert(held.node.key);
            }
        }

        for accomplishment in tx.targets(&user.id, EdgeType::Completed).await? {
            for demonstrated in tx
                .targets(&accomplishment.node.id, EdgeType::Demonstrates)
                .await?
            {
                skills.insert(demonstrated.node.key);
            }
        }

        Ok(skills)
    }

    /// Personalize `full_path` for the user
    pub async fn filter(&self, full_path: &[String], email: &str) -> Result<Vec<String>> {
        let possessed = self.possessed_skills(email).await?;
        Ok(personalize(full_path, &possessed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_removes_possessed_and_keeps_order() {
        let path = names(&["C", "B", "D", "A"]);
        assert_eq!(personalize(&path, &set(&["B", "A"])), names(&["C", "D"]));
    }

    #[test]
    fn test_nothing_possessed() {
        let path = names(&["C", "B", "A"]);
        assert_eq!(personalize(&path, &BTreeSet::new()), path);
    }

    #[test]
    fn test_everything_possessed() {
        let path = names(&["B", "A"]);
        assert!(personalize(&path, &set(&["A", "B", "Z"])).is_empty());
    }

    #[test]
    fn test_empty_path() {
        assert!(personalize(&[], &set(&["A"])).is_empty());
    }

    #[test]
    fn test_result_is_subsequence_of_input() {
        let path = names(&["E", "D", "C", "B", "A"]);
        let possessed = set(&["D", "B"]);
        let result = personalize(&path, &possessed);

        assert!(result.iter().all(|s| !possessed.contains(s)));
        let positions: Vec<usize> = result
            .iter()
            .map(|s| path.iter().position(|p| p == s).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
