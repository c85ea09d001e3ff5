//! Account lifecycle: registration, activation, login/logoff and the
//! session-validated user document reads.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

use crate::coordinator::{require_inputs, unique, Coordinator, Reply};
use crate::error::{CoordError, CoordResult};
use crate::models::{AvailabilitySlot, Session, User};
use crate::password::{activation_token, hash_password, verify_password};
use crate::store::{UserFilter, UserPatch};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

const MIN_USERNAME_LEN: usize = 3;

/// Everything the client holds about the logged-in user, returned on login
/// and on document reads.
#[derive(Debug, Clone, Serialize)]
pub struct UserSnapshot {
    pub logged_in: bool,
    pub username: String,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub session_timestamp: OffsetDateTime,
    pub availabilities: Vec<AvailabilitySlot>,
    pub friends: Vec<String>,
    pub friend_requests: Vec<String>,
    pub groups: Vec<String>,
}

impl UserSnapshot {
    fn of(user: &User, session_id: Uuid, session_timestamp: OffsetDateTime) -> Self {
        Self {
            logged_in: true,
            username: user.username.clone(),
            user_id: user.id,
            session_id,
            session_timestamp,
            availabilities: user.availabilities.clone(),
            friends: user.friends.clone(),
            friend_requests: user.friend_requests.clone(),
            groups: user.groups.clone(),
        }
    }
}

impl Coordinator {
    pub(crate) async fn get_user_by_id(&self, user_id: Uuid) -> CoordResult<User> {
        let users = self.store.find_users(UserFilter::by_id(user_id)).await?;
        unique(
            users,
            CoordError::NotFound("Could not find a user with the given ID".into()),
            &format!("users with id {user_id}"),
        )
    }

    pub(crate) async fn get_user_by_username(&self, username: &str) -> CoordResult<User> {
        let users = self
            .store
            .find_users(UserFilter::by_username(username))
            .await?;
        unique(
            users,
            CoordError::NotFound("Could not find a user with the given username".into()),
            &format!("users with username {username}"),
        )
    }

    /// Create an inactive account and hand the activation mail to the mailer.
    /// Username and email must be globally unique.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> CoordResult<Reply<()>> {
        require_inputs(&[username, password, email])?;
        let username = username.trim();

        if !is_valid_email(email) {
            return Err(CoordError::Validation("The provided email is invalid".into()));
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(CoordError::Validation(
                "Username must be at least 3 characters".into(),
            ));
        }

        if !self
            .store
            .find_users(UserFilter::by_username(username))
            .await?
            .is_empty()
        {
            return Err(CoordError::Conflict("Username taken".into()));
        }
        if !self
            .store
            .find_users(UserFilter::by_email(email))
            .await?
            .is_empty()
        {
            return Err(CoordError::Conflict("Email taken".into()));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            activation_token: activation_token(),
            activated: false,
            password_hash: hash_password(password)?,
            friends: vec![],
            friend_requests: vec![],
            groups: vec![],
            availabilities: vec![],
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.insert_user(user.clone()).await?;
        info!(username, "registered new user");

        self.send_activation_email(&user).await;

        Ok(Reply::new(
            format!("Successfully registered user {username}. Check your e-mail for an activation link!"),
            (),
        ))
    }

    async fn send_activation_email(&self, user: &User) {
        let href = format!(
            "{}/users/activate?email={}&activationToken={}",
            self.config.activation_base_url, user.email, user.activation_token
        );
        let html = format!("To activate your account, <a href=\"{href}\">click here</a>");
        // Fire and forget: a mail failure never fails registration.
        if let Err(e) = self
            .mailer
            .send(&user.email, "Welcome to Koordinator!", &html)
            .await
        {
            error!(error = %e, email = %user.email, "failed to send activation email");
        }
    }

    /// Flip `activated` once the emailed token is presented.
    pub async fn activate(&self, email: &str, token: &str) -> CoordResult<Reply<()>> {
        require_inputs(&[email, token])?;

        let users = self.store.find_users(UserFilter::by_email(email)).await?;
        let user = unique(
            users,
            CoordError::NotFound("Found no user with that email".into()),
            &format!("users with email {email}"),
        )?;

        if token != user.activation_token {
            return Err(CoordError::Validation("Wrong activation token".into()));
        }

        self.store
            .update_user(
                user.id,
                UserPatch {
                    activated: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        Ok(Reply::new("Successfully activated your account", ()))
    }

    /// Verify credentials, open a fresh session and return the user snapshot
    /// with a cleaned availability ledger.
    pub async fn login(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> CoordResult<Reply<UserSnapshot>> {
        require_inputs(&[username, email, password])?;

        let users = self.store.find_users(UserFilter::by_email(email)).await?;
        let user = unique(
            users,
            CoordError::NotFound("Found no users with that email".into()),
            &format!("users with email {email}"),
        )?;

        if user.username != username {
            return Err(CoordError::Validation("Wrong username or e-mail".into()));
        }
        if !user.activated {
            return Err(CoordError::Validation(
                "You are not yet activated. Check your e-mail!".into(),
            ));
        }
        if !verify_password(password, &user.password_hash)? {
            return Err(CoordError::Validation("Bad credentials".into()));
        }

        let session = Session::new(user.id);
        self.store.insert_session(session.clone()).await?;

        let user = self.cleanup_availabilities(user.id).await?;
        info!(username, "user logged in");

        Ok(Reply::new(
            format!("{username} successfully logged in"),
            UserSnapshot::of(&user, session.id, session.created_at),
        ))
    }

    /// Delete the presented session. Anything but exactly one deletion means
    /// the session table is corrupted.
    pub async fn logoff(&self, session_id: Uuid, user_id: Uuid) -> CoordResult<Reply<()>> {
        let deleted = self
            .store
            .delete_sessions(crate::store::SessionFilter::live(session_id, user_id))
            .await?;
        if deleted != 1 {
            return Err(CoordError::consistency(format!(
                "Deleted {deleted} sessions with id {session_id}"
            )));
        }

        self.cleanup_availabilities(user_id).await?;

        Ok(Reply::new("Logged out", ()))
    }

    /// Session-validated snapshot read. Does not rotate; the presented id
    /// stays valid.
    pub async fn get_user_document(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> CoordResult<Reply<UserSnapshot>> {
        let session = self.validate_session(session_id, user_id).await?;
        let users = self.store.find_users(UserFilter::by_id(user_id)).await?;
        let user = unique(
            users,
            CoordError::NotFound("Found no users with such an ID".into()),
            &format!("users with id {user_id}"),
        )?;

        Ok(Reply::new(
            "Successfully retrieved user document",
            UserSnapshot::of(&user, session_id, session.created_at),
        ))
    }

    /// Public directory of registered usernames.
    pub async fn list_usernames(&self) -> CoordResult<Reply<Vec<String>>> {
        let users = self.store.find_users(UserFilter::default()).await?;
        let usernames = users.into_iter().map(|user| user.username).collect();
        Ok(Reply::new("Successfully retrieved usernames", usernames))
    }

    /// Resolve another user's username by id. `None` when no such user.
    pub async fn username_by_id(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        other_user_id: Uuid,
    ) -> CoordResult<Reply<Option<String>>> {
        self.validate_session(session_id, user_id).await?;

        let users = self
            .store
            .find_users(UserFilter::by_id(other_user_id))
            .await?;
        match users.len() {
            0 => Ok(Reply::new("Found no user", None)),
            1 => Ok(Reply::new(
                "Found user",
                users.into_iter().next().map(|user| user.username),
            )),
            n => Err(CoordError::consistency(format!(
                "Found {n} users with id {other_user_id}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testutil::{coordinator, register_only, signed_in};

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("alice@example.com"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[tokio::test]
    async fn register_activate_login_happy_path() {
        let coord = coordinator();
        let reply = coord
            .register("alice", "hunter2!", "alice@example.com")
            .await
            .unwrap();
        assert!(reply.message.contains("alice"));

        let token = coord
            .get_user_by_username("alice")
            .await
            .unwrap()
            .activation_token;
        coord.activate("alice@example.com", &token).await.unwrap();

        let reply = coord
            .login("alice", "alice@example.com", "hunter2!")
            .await
            .unwrap();
        assert!(reply.data.logged_in);
        assert_eq!(reply.data.username, "alice");
        coord
            .validate_session(reply.data.session_id, reply.data.user_id)
            .await
            .expect("login session must validate");
    }

    #[tokio::test]
    async fn login_blocked_before_activation() {
        let coord = coordinator();
        register_only(&coord, "alice").await;

        let err = coord
            .login("alice", "alice@example.com", "hunter2!")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("not yet activated"));
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let coord = coordinator();
        signed_in(&coord, "alice").await;

        let err = coord
            .login("alice", "alice@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Bad credentials");

        let err = coord
            .login("not-alice", "alice@example.com", "hunter2!")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Wrong username or e-mail");
    }

    #[tokio::test]
    async fn register_enforces_unique_username_and_email() {
        let coord = coordinator();
        register_only(&coord, "alice").await;

        let err = coord
            .register("alice", "pw123456", "other@example.com")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Username taken");

        let err = coord
            .register("alice2", "pw123456", "alice@example.com")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email taken");
    }

    #[tokio::test]
    async fn register_validates_inputs() {
        let coord = coordinator();

        let err = coord
            .register("al", "pw123456", "al@example.com")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least 3"));

        let err = coord
            .register("alice", "pw123456", "not-an-email")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The provided email is invalid");

        let err = coord.register("", "pw123456", "a@b.co").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn activate_rejects_wrong_token() {
        let coord = coordinator();
        register_only(&coord, "alice").await;

        let err = coord
            .activate("alice@example.com", "bogus-token")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Wrong activation token");
    }

    #[tokio::test]
    async fn logoff_invalidates_the_session() {
        let coord = coordinator();
        let user = signed_in(&coord, "alice").await;

        coord.logoff(user.session_id, user.user_id).await.unwrap();

        let err = coord
            .validate_session(user.session_id, user.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // A second logoff on the same id is a consistency failure: zero live
        // sessions were deleted.
        let err = coord.logoff(user.session_id, user.user_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
    }

    #[tokio::test]
    async fn username_by_id_resolves_or_reports_none() {
        let coord = coordinator();
        let alice = signed_in(&coord, "alice").await;
        let bob = signed_in(&coord, "bob").await;

        let reply = coord
            .username_by_id(alice.session_id, alice.user_id, bob.user_id)
            .await
            .unwrap();
        assert_eq!(reply.data.as_deref(), Some("bob"));

        let reply = coord
            .username_by_id(alice.session_id, alice.user_id, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(reply.data, None);
    }

    #[tokio::test]
    async fn user_document_read_does_not_rotate() {
        let coord = coordinator();
        let user = signed_in(&coord, "alice").await;

        let reply = coord
            .get_user_document(user.session_id, user.user_id)
            .await
            .unwrap();
        assert_eq!(reply.data.session_id, user.session_id);
        assert!(reply.session_id.is_none());

        coord
            .validate_session(user.session_id, user.user_id)
            .await
            .expect("document read must leave the session valid");
    }

    #[tokio::test]
    async fn list_usernames_covers_every_account() {
        let coord = coordinator();
        signed_in(&coord, "alice").await;
        signed_in(&coord, "bob").await;

        let reply = coord.list_usernames().await.unwrap();
        assert_eq!(reply.data, vec!["alice".to_string(), "bob".to_string()]);
    }
}
