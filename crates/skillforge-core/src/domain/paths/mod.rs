//! Learning paths
//!
//! [`LearningPathResolver`] turns a target skill into its depth-ordered
//! prerequisite closure; [`personalize`] removes what a user already knows.

mod personalize;
mod resolver;

pub use personalize::{PersonalizedPathFilter, personalize};
pub use resolver::{LearningPath, LearningPathResolver, PathOrder, PathStep};
