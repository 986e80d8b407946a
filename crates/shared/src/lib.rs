pub mod constants;
pub mod error;
pub mod membership;
pub mod moderation;
pub mod permissions;
pub mod validation;
pub mod wire;
