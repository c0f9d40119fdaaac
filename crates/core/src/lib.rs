//! Domain core of the fleet OAuth2 broker.
//!
//! Holds the token and client models, the capability traits for persistence
//! and the upstream token endpoint, and the two services built on them:
//! [`token_manager::PartnerTokenManager`] and [`flow::AuthorizationFlow`].
//! Nothing in here talks to a database or the network directly.

pub mod authorization;
pub mod clock;
pub mod error;
pub mod flow;
pub mod memory;
pub mod partner;
pub mod store;
pub mod token_manager;
pub mod types;
pub mod upstream;
