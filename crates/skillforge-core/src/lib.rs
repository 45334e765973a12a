//! SkillForge Core Library
//!
//! This crate provides the core functionality for SkillForge, including:
//! - A transactional property graph store over SQLite
//! - The skill dependency graph with acyclic prerequisite edges
//! - Learning path resolution and personalization
//! - Users, mastery levels and accomplishments
//! - Goals, quest plans and the goal progression engine

pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod service;
pub mod storage;

pub use error::{Error, Result};
pub use service::SkillForge;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::goals::{Advancement, Goal, GoalPlan, GoalStatus, PlanStep, Quest};
    pub use crate::domain::paths::{LearningPath, PathOrder};
    pub use crate::domain::skills::{MasteryLevel, Skill};
    pub use crate::domain::users::NewAccomplishment;
    pub use crate::error::{Error, Result};
    pub use crate::service::SkillForge;
    pub use crate::storage::{Database, DatabaseConfig};
}
