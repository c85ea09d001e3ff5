//! Shared test fixtures: an in-memory coordinator and seeded accounts.

use uuid::Uuid;

use crate::config::AppConfig;
use crate::coordinator::Coordinator;

pub(crate) const TEST_PASSWORD: &str = "hunter2!";

pub(crate) struct TestUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

pub(crate) fn coordinator() -> Coordinator {
    Coordinator::in_memory(AppConfig::default())
}

fn email_for(username: &str) -> String {
    format!("{username}@example.com")
}

/// Register without activating; login stays blocked.
pub(crate) async fn register_only(coord: &Coordinator, username: &str) {
    coord
        .register(username, TEST_PASSWORD, &email_for(username))
        .await
        .expect("register");
}

/// Register, activate and log in, returning the ids a transport would hold.
pub(crate) async fn signed_in(coord: &Coordinator, username: &str) -> TestUser {
    register_only(coord, username).await;
    let email = email_for(username);
    let token = coord
        .get_user_by_username(username)
        .await
        .expect("registered user exists")
        .activation_token;
    coord.activate(&email, &token).await.expect("activate");
    let reply = coord
        .login(username, &email, TEST_PASSWORD)
        .await
        .expect("login");
    TestUser {
        user_id: reply.data.user_id,
        session_id: reply.data.session_id,
    }
}
