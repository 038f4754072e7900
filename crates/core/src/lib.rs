//! `warden-core` - identity building blocks shared by every layer.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod slug;

pub use error::DomainError;
pub use id::{RefreshTokenId, TenantId, UserId};
pub use slug::Slug;
