//! Infrastructure layer: store backends and provisioning for `warden-auth`.

pub mod bootstrap;
pub mod memory;
pub mod postgres;


pub use bootstrap::ensure_default_tenant;
pub use memory::InMemoryAuthStore;
pub use postgres::PostgresAuthStore;
