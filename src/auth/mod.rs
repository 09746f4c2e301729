//! Identity handling for requests authenticated by an upstream identity proxy.
//!
//! The proxy authenticates the user and forwards their identity in the `x-authentik-*` request
//! headers. This module trusts those headers, it does not verify credentials itself.

mod identity;
mod middleware;

pub use identity::Identity;
pub use middleware::auth_guard;

#[cfg(test)]
pub use identity::{EMAIL_HEADER, NAME_HEADER, UID_HEADER};
