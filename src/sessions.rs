//! Session lifecycle: validation, rotation and the periodic expiry sweep.
//!
//! A session is in one of two states, valid or deleted, and only ever moves
//! valid → deleted: on logoff, on rotation (the presented id) or when the
//! sweep finds it older than the configured timeout.

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::coordinator::{unique, Coordinator, Reply};
use crate::error::{CoordError, CoordResult};
use crate::models::Session;
use crate::store::SessionFilter;

/// Age-based expiry predicate used by the sweep.
pub fn session_expired(session: &Session, now: OffsetDateTime, timeout_secs: u64) -> bool {
    now - session.created_at > time::Duration::seconds(timeout_secs as i64)
}

impl Coordinator {
    /// Succeeds iff exactly one live session matches both id and owner.
    /// More than one match is corrupted state and aborts distinctly from
    /// not-found.
    pub(crate) async fn validate_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> CoordResult<Session> {
        let sessions = self
            .store
            .find_sessions(SessionFilter::live(session_id, user_id))
            .await?;
        unique(
            sessions,
            CoordError::NotFound(format!("Session {session_id} is invalid")),
            &format!("sessions with id {session_id}"),
        )
    }

    /// Validate the presented session, issue a fresh one for the same owner
    /// and delete the old. Every mutating operation calls this exactly once,
    /// after its mutation succeeds.
    pub(crate) async fn rotate_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> CoordResult<Uuid> {
        self.validate_session(session_id, user_id).await?;

        let new_session = Session::new(user_id);
        self.store.insert_session(new_session.clone()).await?;
        self.store
            .delete_sessions(SessionFilter {
                id: Some(session_id),
                user_id: Some(user_id),
                deleted: None,
            })
            .await?;
        debug!(old = %session_id, new = %new_session.id, %user_id, "session rotated");
        Ok(new_session.id)
    }

    /// Session check exposed to the transport layer. Does not rotate.
    pub async fn is_session_valid(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> CoordResult<Reply<bool>> {
        self.validate_session(session_id, user_id).await?;
        Ok(Reply::new("Session is valid", true))
    }

    /// Delete every non-deleted session older than the configured timeout.
    /// Returns how many were removed.
    pub async fn sweep_expired_sessions(&self) -> CoordResult<u64> {
        let now = OffsetDateTime::now_utc();
        let timeout_secs = self.config.session_timeout_secs;
        let sessions = self
            .store
            .find_sessions(SessionFilter {
                deleted: Some(false),
                ..Default::default()
            })
            .await?;

        let mut removed = 0;
        for session in sessions {
            if !session_expired(&session, now, timeout_secs) {
                continue;
            }
            removed += self
                .store
                .delete_sessions(SessionFilter {
                    id: Some(session.id),
                    deleted: Some(false),
                    ..Default::default()
                })
                .await?;
            debug!(session_id = %session.id, "deleted expired session");
        }
        Ok(removed)
    }
}

/// Recurring background sweep. Runs independently of request traffic;
/// failures are logged and the loop keeps going — there is no caller to
/// propagate to.
pub fn spawn_session_sweeper(coordinator: Coordinator) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(coordinator.config.sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match coordinator.sweep_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "session sweep removed expired sessions"),
                Err(e) => error!(error = %e, "session sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::ErrorKind;
    use crate::testutil::{coordinator, signed_in};

    #[test]
    fn expiry_is_strictly_older_than_timeout() {
        let now = OffsetDateTime::now_utc();
        let mut session = Session::new(Uuid::new_v4());

        session.created_at = now - time::Duration::seconds(3601);
        assert!(session_expired(&session, now, 3600));

        session.created_at = now - time::Duration::seconds(3599);
        assert!(!session_expired(&session, now, 3600));
    }

    #[tokio::test]
    async fn validate_rejects_unknown_session() {
        let coord = coordinator();
        let user = signed_in(&coord, "alice").await;

        let err = coord
            .validate_session(Uuid::new_v4(), user.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn validate_rejects_session_bound_to_another_user() {
        let coord = coordinator();
        let alice = signed_in(&coord, "alice").await;
        let bob = signed_in(&coord, "bob").await;

        let err = coord
            .validate_session(alice.session_id, bob.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn duplicated_session_id_is_a_consistency_violation() {
        let coord = coordinator();
        let user = signed_in(&coord, "alice").await;

        // Force the corrupted state validate() defends against.
        let sessions = coord
            .store
            .find_sessions(SessionFilter::live(user.session_id, user.user_id))
            .await
            .unwrap();
        coord
            .store
            .insert_session(sessions[0].clone())
            .await
            .unwrap();

        let err = coord
            .validate_session(user.session_id, user.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
        assert_eq!(err.client_message(), "Unexpected server error");
    }

    #[tokio::test]
    async fn rotation_invalidates_old_id_and_validates_new() {
        let coord = coordinator();
        let user = signed_in(&coord, "alice").await;

        let new_id = coord
            .rotate_session(user.session_id, user.user_id)
            .await
            .unwrap();
        assert_ne!(new_id, user.session_id);

        let err = coord
            .validate_session(user.session_id, user.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        coord
            .validate_session(new_id, user.user_id)
            .await
            .expect("rotated session must be valid for the same owner");
    }

    #[tokio::test]
    async fn sweeper_task_runs_in_the_background() {
        let coord = Coordinator::in_memory(AppConfig {
            session_timeout_secs: 0,
            sweep_interval_ms: 10,
            ..Default::default()
        });
        let mut stale = Session::new(Uuid::new_v4());
        stale.created_at = OffsetDateTime::now_utc() - time::Duration::seconds(5);
        coord.store.insert_session(stale).await.unwrap();

        let handle = spawn_session_sweeper(coord.clone());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        handle.abort();

        let remaining = coord
            .store
            .find_sessions(SessionFilter::default())
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn sweep_deletes_only_sessions_past_the_timeout() {
        let coord = Coordinator::in_memory(AppConfig {
            session_timeout_secs: 3600,
            ..Default::default()
        });
        let user_id = Uuid::new_v4();

        let mut stale = Session::new(user_id);
        stale.created_at = OffsetDateTime::now_utc() - time::Duration::hours(2);
        let fresh = Session::new(user_id);
        coord.store.insert_session(stale.clone()).await.unwrap();
        coord.store.insert_session(fresh.clone()).await.unwrap();

        let removed = coord.sweep_expired_sessions().await.unwrap();
        assert_eq!(removed, 1);

        let remaining = coord
            .store
            .find_sessions(SessionFilter {
                user_id: Some(user_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, fresh.id);
    }
}
