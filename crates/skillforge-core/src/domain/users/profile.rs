//! Users and the skills they hold

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::domain::skills::{MasteryLevel, require_skill};
use crate::error::{Error, Result};
use crate::graph::{EdgeType, GraphStore, GraphTransaction, NodeLabel, NodeRecord};

/// A learner, identified by email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Trim an email address, rejecting ones that cannot be an address
    pub fn normalize_email(email: &str) -> Result<String> {
        let trimmed = email.trim();
        if trimmed.is_empty() || !trimmed.contains('@') {
            return Err(Error::InvalidInput(format!("Invalid email address: '{}'", email)));
        }
        Ok(trimmed.to_string())
    }
}

impl TryFrom<NodeRecord> for User {
    type Error = Error;

    fn try_from(record: NodeRecord) -> Result<Self> {
        record.expect_label(NodeLabel::User)?;
        Ok(Self {
            id: record.id,
            email: record.key,
            created_at: record.created_at,
        })
    }
}

/// A skill held by a user. `level` is absent for skills recorded without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSkill {
    pub skill: String,
    pub level: Option<MasteryLevel>,
}

/// Look up a user node by email or fail with `UserNotFound`
pub(crate) async fn require_user(tx: &mut GraphTransaction, email: &str) -> Result<NodeRecord> {
    tx.find_node(NodeLabel::User, email.trim())
        .await?
        .ok_or_else(|| Error::UserNotFound(email.trim().to_string()))
}

/// User registration and skill assignment
#[derive(Debug, Clone)]
pub struct UserProfile {
    store: GraphStore,
}

impl UserProfile {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Register the user if absent
    pub async fn ensure_user(&self, email: &str) -> Result<User> {
        let email = User::normalize_email(email)?;

        let mut tx = self.store.begin_write().await?;
        let (node, created) = tx
            .merge_node(NodeLabel::User, &email, &json!({}))
            .await?;
        tx.commit().await?;

        if created {
            info!(user = %email, "User registered");
        }
        User::try_from(node)
    }

    pub async fn get_user(&self, email: &str) -> Result<Option<User>> {
        let mut tx = self.store.begin().await?;
        tx.find_node(NodeLabel::User, email.trim())
            .await?
            .map(User::try_from)
            .transpose()
    }

    pub async fn user_exists(&self, email: &str) -> Result<bool> {
        Ok(self.get_user(email).await?.is_some())
    }

    /// Record that the user holds `skill` at `level`, replacing any
    /// previously recorded level
    pub async fn assign_mastery(
        &self,
        email: &str,
        skill: &str,
        level: MasteryLevel,
    ) -> Result<UserSkill> {
        let mut tx = self.store.begin_write().await?;
        let user = require_user(&mut tx, email).await?;
        let skill_node = require_skill(&mut tx, skill).await?;

        let offered = match tx.find_node(NodeLabel::Mastery, &level.node_key()).await? {
            Some(mastery) => tx
                .find_edge(&skill_node.id, EdgeType::HasMastery, &mastery.id)
                .await?
                .is_some(),
            None => false,
        };
        if !offered {
            return Err(Error::MasteryNotDefined {
                skill: skill_node.key,
                level: level.as_u8(),
            });
        }

        let properties = json!({ "level": level.as_u8() });
        let created = tx
            .merge_edge(&user.id, EdgeType::HasMasteryOf, &skill_node.id, &properties)
            .await?;
        if !created {
            tx.set_edge_properties(&user.id, EdgeType::HasMasteryOf, &skill_node.id, &properties)
                .await?;
        }
        tx.commit().await?;

        info!(user = %user.key, skill = %skill_node.key, level = %level, "Mastery assigned");
        Ok(UserSkill {
            skill: skill_node.key,
            level: Some(level),
        })
    }

    /// Skills the user holds directly, ordered by skill name
    pub async fn user_skills(&self, email: &str) -> Result<Vec<UserSkill>> {
        let mut tx = self.store.begin().await?;
        let user = require_user(&mut tx, email).await?;

        let mut skills: Vec<UserSkill> = tx
            .targets(&user.id, EdgeType::HasMasteryOf)
            .await?
            .into_iter()
            .map(|held| UserSkill {
                level: held
                    .edge
                    .properties
                    .get("level")
                    .and_then(|v| v.as_u64())
                    .and_then(|l| u8::try_from(l).ok())
                    .and_then(MasteryLevel::from_u8),
                skill: held.node.key,
            })
            .collect();

        for held in tx.targets(&user.id, EdgeType::HasSkill).await? {
            if !skills.iter().any(|s| s.skill == held.node.key) {
                skills.push(UserSkill {
                    skill: held.node.key,
                    level: None,
                });
            }
        }

        skills.sort_by(|a, b| a.skill.cmp(&b.skill));
        debug!(user = %user.key, count = skills.len(), "Loaded user skills");
        Ok(skills)
    }

    /// Drop the user's hold on `skill`. Returns whether anything was removed.
    pub async fn remove_user_skill(&self, email: &str, skill: &str) -> Result<bool> {
        let mut tx = self.store.begin_write().await?;
        let user = require_user(&mut tx, email).await?;
        let skill_node = require_skill(&mut tx, skill).await?;

        let mut removed = false;
        for edge_type in [EdgeType::HasMasteryOf, EdgeType::HasSkill] {
            removed |= tx.delete_edge(&user.id, edge_type, &skill_node.id).await?;
        }
        tx.commit().await?;

        if removed {
            info!(user = %user.key, skill = %skill_node.key, "User skill removed");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::skills::SkillDependencyGraph;
    use crate::storage::Database;

    async fn setup() -> (GraphStore, UserProfile) {
        let db = Database::in_memory().await.expect("Failed to create database");
        let store = GraphStore::new(db);
        (store.clone(), UserProfile::new(store))
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let (store, users) = setup().await;

        let first = users.ensure_user("ada@example.com").await.unwrap();
        let second = users.ensure_user(" ada@example.com ").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(users.user_exists("ada@example.com").await.unwrap());
        assert!(!users.user_exists("bob@example.com").await.unwrap());

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.count_nodes(NodeLabel::User).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let (_, users) = setup().await;
        assert!(matches!(
            users.ensure_user("not-an-email").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_assign_and_reassign_mastery() {
        let (store, users) = setup().await;
        SkillDependencyGraph::new(store.clone())
            .upsert_skill("Rust", None)
            .await
            .unwrap();
        users.ensure_user("ada@example.com").await.unwrap();

        users
            .assign_mastery("ada@example.com", "Rust", MasteryLevel::Beginner)
            .await
            .unwrap();
        users
            .assign_mastery("ada@example.com", "Rust", MasteryLevel::Advanced)
            .await
            .unwrap();

        let skills = users.user_skills("ada@example.com").await.unwrap();
        assert_eq!(
            skills,
            vec![UserSkill {
                skill: "Rust".into(),
                level: Some(MasteryLevel::Advanced)
            }]
        );
    }

    #[tokio::test]
    async fn test_assign_requires_user_and_skill() {
        let (store, users) = setup().await;
        SkillDependencyGraph::new(store)
            .upsert_skill("Rust", None)
            .await
            .unwrap();

        assert!(matches!(
            users
                .assign_mastery("ghost@example.com", "Rust", MasteryLevel::Expert)
                .await,
            Err(Error::UserNotFound(_))
        ));

        users.ensure_user("ada@example.com").await.unwrap();
        assert!(matches!(
            users
                .assign_mastery("ada@example.com", "Go", MasteryLevel::Expert)
                .await,
            Err(Error::SkillNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_assign_requires_offered_level() {
        let (store, users) = setup().await;
        users.ensure_user("ada@example.com").await.unwrap();

        // A skill node written without its catalog links
        let mut tx = store.begin_write().await.unwrap();
        tx.merge_node(NodeLabel::Skill, "Bare", &json!({})).await.unwrap();
        tx.commit().await.unwrap();

        let err = users
            .assign_mastery("ada@example.com", "Bare", MasteryLevel::Expert)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MasteryNotDefined { level: 4, .. }));
    }

    #[tokio::test]
    async fn test_legacy_skill_edges_listed_without_level() {
        let (store, users) = setup().await;
        let user = users.ensure_user("ada@example.com").await.unwrap();
        let skill = SkillDependencyGraph::new(store.clone())
            .upsert_skill("Go", None)
            .await
            .unwrap();

        let mut tx = store.begin_write().await.unwrap();
        tx.merge_edge(&user.id, EdgeType::HasSkill, &skill.id, &json!({}))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let skills = users.user_skills("ada@example.com").await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].level, None);

        assert!(users.remove_user_skill("ada@example.com", "Go").await.unwrap());
        assert!(!users.remove_user_skill("ada@example.com", "Go").await.unwrap());
        assert!(users.user_skills("ada@example.com").await.unwrap().is_empty());
    }
}
