//! Row structs for the broker tables.
//!
//! Each `*Row` derives `FromRow` and converts into the matching core type.

pub mod authorization;
pub mod authorization_token;
pub mod partner;
