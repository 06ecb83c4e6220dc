//! Concrete entity types persisted through the store.

pub mod guild_profile;
pub mod supporter;

pub use guild_profile::GuildProfile;
pub use supporter::Supporter;
