use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{CoordError, CoordResult};
use crate::mailer::{Mailer, NoopMailer};
use crate::store::memory::InMemoryStore;
use crate::store::DocumentStore;

/// Entry point for every operation. Holds explicitly constructed
/// dependencies — store, mailer, config — with no ambient singletons.
///
/// Each domain module adds its operations as `impl Coordinator` blocks:
/// [`crate::users`], [`crate::sessions`], [`crate::availability`],
/// [`crate::friends`], [`crate::groups`].
#[derive(Clone)]
pub struct Coordinator {
    pub store: Arc<dyn DocumentStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn DocumentStore>, mailer: Arc<dyn Mailer>, config: AppConfig) -> Self {
        Self {
            store,
            mailer,
            config: Arc::new(config),
        }
    }

    /// In-process backend with inert mail delivery. Used by tests and
    /// embedded deployments.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), Arc::new(NoopMailer), config)
    }
}

/// Tagged success reply. `session_id` carries the post-rotation token when
/// the operation rotated the caller's session; the old token is unusable
/// the moment this reply exists.
#[derive(Debug, Serialize)]
pub struct Reply<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub data: T,
}

impl<T> Reply<T> {
    pub(crate) fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            data,
        }
    }

    pub(crate) fn rotated(message: impl Into<String>, session_id: Uuid, data: T) -> Self {
        Self {
            message: message.into(),
            session_id: Some(session_id),
            data,
        }
    }
}

/// Reject empty or whitespace-only string inputs before touching the store.
pub(crate) fn require_inputs(inputs: &[&str]) -> CoordResult<()> {
    if inputs.iter().any(|input| input.trim().is_empty()) {
        return Err(CoordError::Validation(
            "Please provide the appropriate inputs".into(),
        ));
    }
    Ok(())
}

/// Collapse a find result that must hit exactly one document. Zero matches is
/// the caller-visible `not_found`; more than one is a consistency violation
/// (`description` names the offending filter in the log).
pub(crate) fn unique<T>(
    mut found: Vec<T>,
    not_found: CoordError,
    description: &str,
) -> CoordResult<T> {
    match found.len() {
        0 => Err(not_found),
        1 => Ok(found.remove(0)),
        n => Err(CoordError::consistency(format!("Found {n} {description}"))),
    }
}
