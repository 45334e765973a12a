//! Users, their skills and their accomplishments

mod accomplishment;
mod profile;

pub(crate) use profile::require_user;
pub use accomplishment::{Accomplishment, AccomplishmentLog, NewAccomplishment};
pub use profile::{User, UserProfile, UserSkill};
