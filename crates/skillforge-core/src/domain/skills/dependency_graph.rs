//! Skill nodes and their prerequisite edges
//!
//! `(dependent)-[REQUIRES]->(prerequisite)` means mastering the dependent
//! presumes the prerequisite. The edges are kept acyclic: an insert that
//! would close a cycle is rolled back.

use serde_json::json;
use tracing::{debug, info};

use super::entity::Skill;
use super::mastery::{Mastery, MasteryLevel};
use super::matching::SkillMatcher;
use crate::error::{Error, Result};
use crate::graph::{EdgeType, GraphStore, GraphTransaction, NodeLabel, NodeRecord};

/// Create `name` if absent and attach the mastery catalog to it. A supplied
/// description replaces the stored one. Returns the skill and whether it
/// was created.
pub(crate) async fn upsert_skill_in(
    tx: &mut GraphTransaction,
    name: &str,
    description: Option<&str>,
) -> Result<(Skill, bool)> {
    let name = Skill::normalize_name(name)?;
    let properties = match description {
        Some(description) => json!({ "description": description }),
        None => json!({}),
    };

    let (mut node, created) = tx.merge_node(NodeLabel::Skill, &name, &properties).await?;

    if created {
        for level in MasteryLevel::all() {
            let (mastery, _) = tx
                .merge_node(NodeLabel::Mastery, &level.node_key(), &level.node_properties())
                .await?;
            tx.merge_edge(&node.id, EdgeType::HasMastery, &mastery.id, &json!({}))
                .await?;
        }
    } else if description.is_some() {
        tx.set_properties(&node.id, &properties).await?;
        node.properties = properties;
    }

    Ok((Skill::try_from(node)?, created))
}

/// Look up a skill node by name or fail with `SkillNotFound`
pub(crate) async fn require_skill(tx: &mut GraphTransaction, name: &str) -> Result<NodeRecord> {
    tx.find_node(NodeLabel::Skill, name.trim())
        .await?
        .ok_or_else(|| Error::SkillNotFound(name.to_string()))
}

/// Skill graph operations
#[derive(Debug, Clone)]
pub struct SkillDependencyGraph {
    store: GraphStore,
}

impl SkillDependencyGraph {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Create the skill if absent. Calling this again with the same name
    /// leaves exactly one skill; a new description replaces the old one.
    pub async fn upsert_skill(&self, name: &str, description: Option<&str>) -> Result<Skill> {
        let mut tx = self.store.begin_write().await?;
        let (skill, created) = upsert_skill_in(&mut tx, name, description).await?;
        tx.commit().await?;

        if created {
            info!(skill = %skill.name, "Skill created");
        } else {
            debug!(skill = %skill.name, "Skill already present");
        }
        Ok(skill)
    }

    pub async fn get_skill(&self, name: &str) -> Result<Option<Skill>> {
        let mut tx = self.store.begin().await?;
        tx.find_node(NodeLabel::Skill, name.trim())
            .await?
            .map(Skill::try_from)
            .transpose()
    }

    /// All skills ordered by name
    pub async fn list_skills(&self) -> Result<Vec<Skill>> {
        let mut tx = self.store.begin().await?;
        tx.find_nodes(NodeLabel::Skill)
            .await?
            .into_iter()
            .map(Skill::try_from)
            .collect()
    }

    /// Mastery tiers the skill offers, lowest first
    pub async fn mastery_levels(&self, name: &str) -> Result<Vec<Mastery>> {
        let mut tx = self.store.begin().await?;
        let skill = require_skill(&mut tx, name).await?;
        tx.targets(&skill.id, EdgeType::HasMastery)
            .await?
            .into_iter()
            .map(|n| Mastery::try_from(n.node))
            .collect()
    }

    /// Rename a skill. Its edges stay attached.
    pub async fn rename_skill(&self, old_name: &str, new_name: &str) -> Result<Skill> {
        let new_name = Skill::normalize_name(new_name)?;

        let mut tx = self.store.begin_write().await?;
        let node = require_skill(&mut tx, old_name).await?;
        if node.key == new_name {
            return Skill::try_from(node);
        }
        if tx.find_node(NodeLabel::Skill, &new_name).await?.is_some() {
            return Err(Error::SkillAlreadyExists(new_name));
        }

        tx.rekey_node(&node.id, &new_name).await?;
        let renamed = tx
            .find_node_by_id(&node.id)
            .await?
            .ok_or_else(|| Error::SkillNotFound(new_name.clone()))?;
        tx.commit().await?;

        info!(from = %old_name, to = %new_name, "Skill renamed");
        Skill::try_from(renamed)
    }

    /// Delete a skill and every edge touching it
    pub async fn delete_skill(&self, name: &str) -> Result<bool> {
        let mut tx = self.store.begin_write().await?;
        let Some(node) = tx.find_node(NodeLabel::Skill, name.trim()).await? else {
            return Ok(false);
        };
        let deleted = tx.delete_node(&node.id).await?;
        tx.commit().await?;

        if deleted {
            info!(skill = %node.key, "Skill deleted");
        }
        Ok(deleted)
    }

    /// Record that `dependent` requires `prerequisite`. Returns false if
    /// the edge already existed.
    pub async fn add_dependency(&self, dependent: &str, prerequisite: &str) -> Result<bool> {
        let mut tx = self.store.begin_write().await?;
        let dependent_node = require_skill(&mut tx, dependent).await?;
        let prerequisite_node = require_skill(&mut tx, prerequisite).await?;

        if dependent_node.id == prerequisite_node.id {
            return Err(Error::SelfDependency(dependent_node.key));
        }

        let created = tx
            .merge_edge(
                &dependent_node.id,
                EdgeType::Requires,
                &prerequisite_node.id,
                &json!({}),
            )
            .await?;

        if created
            && tx
                .path_exists(&prerequisite_node.id, &dependent_node.id, EdgeType::Requires)
                .await?
        {
            tx.rollback().await?;
            return Err(Error::DependencyCycle {
                dependent: dependent_node.key,
                prerequisite: prerequisite_node.key,
            });
        }

        tx.commit().await?;

        if created {
            info!(
                dependent = %dependent_node.key,
                prerequisite = %prerequisite_node.key,
                "Dependency added"
            );
        }
        Ok(created)
    }

    /// Remove a prerequisite edge. Returns whether it existed.
    pub async fn remove_dependency(&self, dependent: &str, prerequisite: &str) -> Result<bool> {
        let mut tx = self.store.begin_write().await?;
        let dependent_node = require_skill(&mut tx, dependent).await?;
        let prerequisite_node = require_skill(&mut tx, prerequisite).await?;

        let removed = tx
            .delete_edge(&dependent_node.id, EdgeType::Requires, &prerequisite_node.id)
            .await?;
        tx.commit().await?;

        if removed {
            info!(
                dependent = %dependent_node.key,
                prerequisite = %prerequisite_node.key,
                "Dependency removed"
            );
        }
        Ok(removed)
    }

    /// Direct prerequisites of `name`, alphabetically
    pub async fn direct_dependencies(&self, name: &str) -> Result<Vec<String>> {
        let mut tx = self.store.begin().await?;
        let node = require_skill(&mut tx, name).await?;
        Ok(tx
            .targets(&node.id, EdgeType::Requires)
            .await?
            .into_iter()
            .map(|n| n.node.key)
            .collect())
    }

    /// Skills that directly require `name`, alphabetically
    pub async fn dependents(&self, name: &str) -> Result<Vec<String>> {
        let mut tx = self.store.begin().await?;
        let node = require_skill(&mut tx, name).await?;
        Ok(tx
            .sources(&node.id, EdgeType::Requires)
            .await?
            .into_iter()
            .map(|n| n.node.key)
            .collect())
    }

    /// Turn candidate skill names into final ones: candidates the matcher
    /// reports as duplicates map to the existing name, the rest are
    /// created. The result is in candidate order without repeats.
    pub async fn resolve_candidates(
        &self,
        candidates: &[String],
        matcher: &dyn SkillMatcher,
    ) -> Result<Vec<String>> {
        let mut existing: Vec<String> = self
            .list_skills()
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect();
        let mut resolved = Vec::new();

        for candidate in candidates {
            let candidate = Skill::normalize_name(candidate)?;
            let found = matcher.find_match(&candidate, &existing).await?;

            let name = match found.existing_name {
                Some(name) if found.is_duplicate && existing.contains(&name) => {
                    debug!(
                        candidate = %candidate,
                        existing = %name,
                        "Candidate matched existing skill"
                    );
                    name
                }
                _ => {
                    let skill = self.upsert_skill(&candidate, None).await?;
                    existing.push(skill.name.clone());
                    skill.name
                }
            };

            if !resolved.contains(&name) {
                resolved.push(name);
            }
        }

        Ok(resolved)
    }
}
