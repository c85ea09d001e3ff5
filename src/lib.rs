//! Coordination core for a scheduling web app: rotating session tokens,
//! a weekly availability ledger with rolling-window expiry, a friend
//! request/accept protocol and password-gated groups.
//!
//! The HTTP transport and the persistence engine are external collaborators.
//! Everything enters through [`Coordinator`], which validates the caller's
//! session, applies the requested mutation through a [`store::DocumentStore`]
//! and rotates the session on success.

pub mod availability;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod friends;
pub mod groups;
pub mod mailer;
pub mod models;
pub mod password;
pub mod sessions;
pub mod store;
pub mod users;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::AppConfig;
pub use coordinator::{Coordinator, Reply};
pub use error::{CoordError, CoordResult, ErrorKind};
