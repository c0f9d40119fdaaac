//! Request handlers.
//!
//! Handlers delegate to the core services in [`AppState`](crate::state::AppState)
//! and map errors via [`AppError`](crate::error::AppError).

pub mod authorize;
pub mod partner;
