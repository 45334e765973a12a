//! Error types for SkillForge

use thiserror::Error;

/// Result type alias using SkillForge's Error
pub type Result<T> = std::result::Result<T, Error>;

/// SkillForge error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Lookup errors (E001-E099)
    #[error("Skill '{0}' not found. Run `skillforge skills list` to see all skills.")]
    SkillNotFound(String),

    #[error("User '{0}' not found. Register with `skillforge users add {0}`.")]
    UserNotFound(String),

    #[error("Goal '{0}' not found.")]
    GoalNotFound(String),

    #[error("Quest '{0}' not found.")]
    QuestNotFound(String),

    #[error("Accomplishment '{0}' not found.")]
    AccomplishmentNotFound(String),

    #[error("Skill '{skill}' has no mastery level {level} defined.")]
    MasteryNotDefined { skill: String, level: u8 },

    // Graph shape errors (E100-E199)
    #[error("Skill '{0}' already exists.")]
    SkillAlreadyExists(String),

    #[error("Skill '{0}' cannot require itself.")]
    SelfDependency(String),

    #[error("Adding '{dependent}' -> '{prerequisite}' would create a prerequisite cycle.")]
    DependencyCycle {
        dependent: String,
        prerequisite: String,
    },

    // Input errors (E200-E299)
    #[error("Invalid goal plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid mastery level '{0}'. Use Beginner, Intermediate, Advanced, Expert or 1-4.")]
    InvalidMasteryLevel(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Storage errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::SkillNotFound(_) => "E001",
            Self::UserNotFound(_) => "E002",
            Self::GoalNotFound(_) => "E003",
            Self::QuestNotFound(_) => "E004",
            Self::AccomplishmentNotFound(_) => "E005",
            Self::MasteryNotDefined { .. } => "E006",
            Self::SkillAlreadyExists(_) => "E100",
            Self::SelfDependency(_) => "E101",
            Self::DependencyCycle { .. } => "E102",
            Self::InvalidPlan(_) => "E200",
            Self::InvalidMasteryLevel(_) => "E201",
            Self::InvalidInput(_) => "E202",
            Self::DatabaseError(_) => "E400",
            Self::Serialization(_) => "E401",
            Self::ConfigError(_) => "E600",
            Self::Other(_) => "E9999",
        }
    }

    /// Whether this is one of the "referenced thing is absent" errors
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SkillNotFound(_)
                | Self::UserNotFound(_)
                | Self::GoalNotFound(_)
                | Self::QuestNotFound(_)
                | Self::AccomplishmentNotFound(_)
                | Self::MasteryNotDefined { .. }
        )
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::SkillNotFound(name) => Some(format!("skillforge skills add \"{}\"", name)),
            Self::UserNotFound(email) => Some(format!("skillforge users add {}", email)),
            Self::DependencyCycle { prerequisite, .. } => {
                Some(format!("skillforge path \"{}\"", prerequisite))
            }
            Self::InvalidMasteryLevel(_) => {
                Some("Use one of: Beginner, Intermediate, Advanced, Expert".to_string())
            }
            Self::ConfigError(_) => Some("skillforge config list".to_string()),
            _ => None,
        }
    }
}
