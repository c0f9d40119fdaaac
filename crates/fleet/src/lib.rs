//! Client for the vehicle provider's OAuth2 and partner-account endpoints.
//!
//! [`client::FleetAuthClient`] implements the core
//! [`TokenEndpoint`](fleetbroker_core::upstream::TokenEndpoint) over
//! form-encoded HTTP, and exposes the partner-account calls made once at
//! startup.

pub mod authorize;
pub mod client;
pub mod config;
pub mod error;

pub use client::FleetAuthClient;
pub use config::FleetConfig;
pub use error::FleetError;
