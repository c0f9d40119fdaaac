//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` as the first argument.

pub mod authorization_repo;
pub mod authorization_token_repo;
pub mod partner_repo;

pub use authorization_repo::AuthorizationRepo;
pub use authorization_token_repo::AuthorizationTokenRepo;
pub use partner_repo::PartnerRepo;
