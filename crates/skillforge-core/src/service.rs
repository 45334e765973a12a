//! SkillForge facade
//!
//! The operations the surrounding application calls. A `SkillForge` is
//! built over an opened [`Database`] and hands the same store to every
//! component; closing is explicit.

use anyhow::Context;
use tracing::debug;

use crate::config::Config;
use crate::domain::goals::{
    Advancement, Goal, GoalLifecycle, GoalPlan, GoalProgressionEngine, Quest,
};
use crate::domain::paths::{
    LearningPath, LearningPathResolver, PathOrder, PersonalizedPathFilter, personalize,
};
use crate::domain::skills::{Skill, SkillDependencyGraph, SkillMatcher};
use crate::domain::users::{AccomplishmentLog, UserProfile};
use crate::error::Result;
use crate::graph::GraphStore;
use crate::storage::Database;

/// Entry point to skill graph, learning path and goal operations
#[derive(Debug, Clone)]
pub struct SkillForge {
    store: GraphStore,
    skills: SkillDependencyGraph,
    resolver: LearningPathResolver,
    filter: PersonalizedPathFilter,
    users: UserProfile,
    accomplishments: AccomplishmentLog,
    goals: GoalLifecycle,
    progression: GoalProgressionEngine,
}

impl SkillForge {
    pub fn new(database: Database) -> Self {
        let store = GraphStore::new(database);
        Self {
            skills: SkillDependencyGraph::new(store.clone()),
            resolver: LearningPathResolver::new(store.clone()),
            filter: PersonalizedPathFilter::new(store.clone()),
            users: UserProfile::new(store.clone()),
            accomplishments: AccomplishmentLog::new(store.clone()),
            goals: GoalLifecycle::new(store.clone()),
            progression: GoalProgressionEngine::new(store.clone()),
            store,
        }
    }

    /// Open the configured database and apply configured settings
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let db_config = config.database_config();
        let path = db_config.path.clone();
        let database = Database::new(db_config)
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        debug!(path = %path.display(), order = %config.paths.order, "SkillForge opened");
        Ok(Self::new(database).with_path_order(config.paths.order))
    }

    pub fn with_path_order(mut self, order: PathOrder) -> Self {
        self.resolver = self.resolver.with_order(order);
        self
    }

    /// Close the underlying database
    pub async fn close(&self) {
        self.store.database().close().await;
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn database(&self) -> &Database {
        self.store.database()
    }

    pub fn path_order(&self) -> PathOrder {
        self.resolver.order()
    }

    pub fn skills(&self) -> &SkillDependencyGraph {
        &self.skills
    }

    pub fn resolver(&self) -> &LearningPathResolver {
        &self.resolver
    }

    pub fn users(&self) -> &UserProfile {
        &self.users
    }

    pub fn accomplishments(&self) -> &AccomplishmentLog {
        &self.accomplishments
    }

    pub fn goals(&self) -> &GoalLifecycle {
        &self.goals
    }

    pub fn progression(&self) -> &GoalProgressionEngine {
        &self.progression
    }

    // ========== Skills ==========

    pub async fn upsert_skill(&self, name: &str, description: Option<&str>) -> Result<Skill> {
        self.skills.upsert_skill(name, description).await
    }

    pub async fn add_skill_dependency(&self, dependent: &str, prerequisite: &str) -> Result<bool> {
        self.skills.add_dependency(dependent, prerequisite).await
    }

    /// Map candidate skill names to final ones through `matcher`, creating
    /// the candidates that are not duplicates
    pub async fn resolve_skill_names(
        &self,
        candidates: &[String],
        matcher: &dyn SkillMatcher,
    ) -> Result<Vec<String>> {
        self.skills.resolve_candidates(candidates, matcher).await
    }

    // ========== Learning Paths ==========

    /// Skill names of the target's learning path; empty if the skill is
    /// unknown
    pub async fn resolve_learning_path(&self, skill: &str) -> Result<Vec<String>> {
        Ok(self.resolver.resolve(skill).await?.names())
    }

    /// The target's learning path with depths
    pub async fn learning_path(&self, skill: &str) -> Result<LearningPath> {
        self.resolver.resolve(skill).await
    }

    /// The learning path without skills the user already has
    pub async fn personalized_path(&self, skill: &str, email: &str) -> Result<Vec<String>> {
        let full_path = self.resolve_learning_path(skill).await?;
        let possessed = self.filter.possessed_skills(email).await?;
        Ok(personalize(&full_path, &possessed))
    }

    // ========== Goals ==========

    pub async fn create_goal_with_first_quest(
        &self,
        email: &str,
        text: &str,
        plan: GoalPlan,
    ) -> Result<(Goal, Quest)> {
        self.goals.create_goal(email, text, plan).await
    }

    pub async fn advance_goal(&self, quest_id: &str, email: &str) -> Result<Advancement> {
        self.progression.advance(quest_id, email).await
    }
}
