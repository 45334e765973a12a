//! Skill graph domain
//!
//! - **Skill**: a named competency node
//! - **Mastery**: the four-tier proficiency catalog
//! - **SkillDependencyGraph**: skills and their `REQUIRES` edges, kept acyclic
//! - **SkillMatcher**: duplicate detection for candidate skill names

mod dependency_graph;
mod entity;
mod mastery;
mod matching;

pub(crate) use dependency_graph::{require_skill, upsert_skill_in};
pub use dependency_graph::SkillDependencyGraph;
pub use entity::Skill;
pub use mastery::{Mastery, MasteryLevel};
pub use matching::{CanonicalNameMatcher, SkillMatch, SkillMatcher};
