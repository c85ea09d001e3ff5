use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A user document with its relationship collections embedded inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub activation_token: String,
    pub activated: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Usernames of mutually confirmed friends.
    pub friends: Vec<String>,
    /// Usernames of users with an inbound pending request to this user.
    pub friend_requests: Vec<String>,
    pub groups: Vec<String>,
    pub availabilities: Vec<AvailabilitySlot>,
    pub created_at: OffsetDateTime,
}

/// One recurring weekly hour of declared availability. Stamped with the
/// day-of-month it was created on, which drives rolling-window expiry.
/// Never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    /// 0..=6
    pub weekday: u8,
    /// 0..=23
    pub hour: u8,
    /// 1..=31, creation day
    pub day_of_month: u8,
}

/// Short-lived proof of identity. Single-use across mutating calls: every
/// successful mutation deletes the presented session and issues a fresh one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub deleted: bool,
}

impl Session {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
            deleted: false,
        }
    }
}

/// A named group. The member list and each member's `groups` entry are kept
/// mutually consistent by the coordinator, not by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Ordered; aggregate availability reads follow this order.
    pub members: Vec<String>,
}
