//! Minimal query/update contract over the three document collections
//! (users, sessions, groups). The persistence engine behind it is an
//! external collaborator; [`memory::InMemoryStore`] is the in-process
//! backend used by tests and embedded deployments.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{AvailabilitySlot, Group, Session, User};

pub mod memory;

/// Mongo-style find filter for users; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub id: Option<Uuid>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserFilter {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_username(username: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            ..Default::default()
        }
    }

    pub fn by_email(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            ..Default::default()
        }
    }
}

/// Partial update of a user document; only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub activated: Option<bool>,
    pub friends: Option<Vec<String>>,
    pub friend_requests: Option<Vec<String>>,
    pub groups: Option<Vec<String>>,
    pub availabilities: Option<Vec<AvailabilitySlot>>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub deleted: Option<bool>,
}

impl SessionFilter {
    /// The filter every session check uses: this id, this owner, not deleted.
    pub fn live(id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Some(id),
            user_id: Some(user_id),
            deleted: Some(false),
        }
    }
}

/// Find / insert / update-fields / delete over the three collections.
///
/// Updates are whole-field writes (read-modify-write at the caller), matching
/// the document model: no conditional or versioned writes are required of a
/// backend. `update_user_pair` is the one stronger primitive — both documents
/// of a symmetric relationship change through a single call so a backend can
/// apply them without interleaving.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_users(&self, filter: UserFilter) -> anyhow::Result<Vec<User>>;
    async fn insert_user(&self, user: User) -> anyhow::Result<()>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<()>;
    async fn update_user_pair(
        &self,
        first: (Uuid, UserPatch),
        second: (Uuid, UserPatch),
    ) -> anyhow::Result<()>;

    async fn find_sessions(&self, filter: SessionFilter) -> anyhow::Result<Vec<Session>>;
    async fn insert_session(&self, session: Session) -> anyhow::Result<()>;
    /// Returns the number of sessions removed.
    async fn delete_sessions(&self, filter: SessionFilter) -> anyhow::Result<u64>;

    async fn find_groups(&self, name: &str) -> anyhow::Result<Vec<Group>>;
    async fn insert_group(&self, group: Group) -> anyhow::Result<()>;
    async fn update_group_members(&self, name: &str, members: Vec<String>) -> anyhow::Result<()>;
}
