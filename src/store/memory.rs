use anyhow::bail;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Group, Session, User};
use crate::store::{DocumentStore, SessionFilter, UserFilter, UserPatch};

/// In-memory document store. Collections are plain vectors so find semantics
/// mirror a document database: filters can match zero, one or many records,
/// and nothing here enforces uniqueness — that is the coordinator's job.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Collections>,
}

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    sessions: Vec<Session>,
    groups: Vec<Group>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn user_matches(user: &User, filter: &UserFilter) -> bool {
    filter.id.map_or(true, |id| user.id == id)
        && filter
            .username
            .as_deref()
            .map_or(true, |username| user.username == username)
        && filter
            .email
            .as_deref()
            .map_or(true, |email| user.email == email)
}

fn session_matches(session: &Session, filter: &SessionFilter) -> bool {
    filter.id.map_or(true, |id| session.id == id)
        && filter.user_id.map_or(true, |uid| session.user_id == uid)
        && filter.deleted.map_or(true, |d| session.deleted == d)
}

fn apply_patch(user: &mut User, patch: UserPatch) {
    if let Some(activated) = patch.activated {
        user.activated = activated;
    }
    if let Some(friends) = patch.friends {
        user.friends = friends;
    }
    if let Some(friend_requests) = patch.friend_requests {
        user.friend_requests = friend_requests;
    }
    if let Some(groups) = patch.groups {
        user.groups = groups;
    }
    if let Some(availabilities) = patch.availabilities {
        user.availabilities = availabilities;
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_users(&self, filter: UserFilter) -> anyhow::Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .filter(|user| user_matches(user, &filter))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: User) -> anyhow::Result<()> {
        self.inner.write().await.users.push(user);
        Ok(())
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        match inner.users.iter_mut().find(|user| user.id == id) {
            Some(user) => {
                apply_patch(user, patch);
                Ok(())
            }
            None => bail!("no user with id {id}"),
        }
    }

    async fn update_user_pair(
        &self,
        first: (Uuid, UserPatch),
        second: (Uuid, UserPatch),
    ) -> anyhow::Result<()> {
        // One write lock for both documents, so the pair cannot be observed
        // half-applied.
        let mut inner = self.inner.write().await;
        for id in [first.0, second.0] {
            if !inner.users.iter().any(|user| user.id == id) {
                bail!("no user with id {id}");
            }
        }
        for (id, patch) in [first, second] {
            if let Some(user) = inner.users.iter_mut().find(|user| user.id == id) {
                apply_patch(user, patch);
            }
        }
        Ok(())
    }

    async fn find_sessions(&self, filter: SessionFilter) -> anyhow::Result<Vec<Session>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .iter()
            .filter(|session| session_matches(session, &filter))
            .cloned()
            .collect())
    }

    async fn insert_session(&self, session: Session) -> anyhow::Result<()> {
        self.inner.write().await.sessions.push(session);
        Ok(())
    }

    async fn delete_sessions(&self, filter: SessionFilter) -> anyhow::Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|session| !session_matches(session, &filter));
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn find_groups(&self, name: &str) -> anyhow::Result<Vec<Group>> {
        let inner = self.inner.read().await;
        Ok(inner
            .groups
            .iter()
            .filter(|group| group.name == name)
            .cloned()
            .collect())
    }

    async fn insert_group(&self, group: Group) -> anyhow::Result<()> {
        self.inner.write().await.groups.push(group);
        Ok(())
    }

    async fn update_group_members(&self, name: &str, members: Vec<String>) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        match inner.groups.iter_mut().find(|group| group.name == name) {
            Some(group) => {
                group.members = members;
                Ok(())
            }
            None => bail!("no group named {name}"),
        }
    }
}
