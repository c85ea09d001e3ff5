//! Friend request/accept protocol.
//!
//! Friendship is a derived relation: both users list each other in `friends`
//! iff the relationship is mutually confirmed. A pending request exists only
//! as an entry in the target's `friend_requests` naming the requester. One
//! operation covers both halves: calling it against someone who already
//! requested you accepts; otherwise it files a fresh request.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::coordinator::{require_inputs, Coordinator, Reply};
use crate::error::{CoordError, CoordResult};
use crate::models::AvailabilitySlot;
use crate::store::UserPatch;

/// The requester's relationship sets after a friend mutation.
#[derive(Debug, Clone, Serialize)]
pub struct FriendLists {
    pub friends: Vec<String>,
    pub friend_requests: Vec<String>,
}

impl Coordinator {
    /// Request a friendship, or accept one the target already requested.
    pub async fn add_friend(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        friend_username: &str,
    ) -> CoordResult<Reply<FriendLists>> {
        require_inputs(&[friend_username])?;
        self.validate_session(session_id, user_id).await?;

        let requester = self.get_user_by_id(user_id).await?;
        let target = self
            .get_user_by_username(friend_username)
            .await
            .map_err(|err| match err {
                CoordError::NotFound(_) => CoordError::NotFound(format!(
                    "Could not find this {friend_username} you are trying to add"
                )),
                other => other,
            })?;

        if target.id == requester.id {
            return Err(CoordError::Validation(
                "You cannot send yourself a friend request".into(),
            ));
        }
        if requester
            .friends
            .iter()
            .any(|friend| friend.as_str() == friend_username)
        {
            return Err(CoordError::Conflict(
                "You are already friends with this user".into(),
            ));
        }

        let mut requester_friends = requester.friends.clone();
        let mut requester_requests = requester.friend_requests.clone();
        let mut target_friends = target.friends.clone();
        let mut target_requests = target.friend_requests.clone();

        let target_requested_us = requester_requests
            .iter()
            .any(|name| name.as_str() == friend_username);
        let message = if target_requested_us {
            // Acceptance: both sides gain the other, both pending entries
            // (including any stale reciprocal one) are cleared.
            if !requester_friends.iter().any(|f| f == &target.username) {
                requester_friends.push(target.username.clone());
            }
            requester_requests.retain(|name| name != &target.username);

            if !target_friends.iter().any(|f| f == &requester.username) {
                target_friends.push(requester.username.clone());
            }
            target_requests.retain(|name| name != &requester.username);

            info!(requester = %requester.username, target = %target.username, "friend request accepted");
            "Accepted friend request"
        } else {
            if target_requests
                .iter()
                .any(|name| name == &requester.username)
            {
                return Err(CoordError::Conflict(
                    "You have already sent a friend request to this user".into(),
                ));
            }
            target_requests.push(requester.username.clone());
            "Successfully sent this user a friend request"
        };

        // Both documents change through one paired update so the symmetric
        // relation cannot be observed half-written.
        self.store
            .update_user_pair(
                (
                    requester.id,
                    UserPatch {
                        friends: Some(requester_friends.clone()),
                        friend_requests: Some(requester_requests.clone()),
                        ..Default::default()
                    },
                ),
                (
                    target.id,
                    UserPatch {
                        friends: Some(target_friends),
                        friend_requests: Some(target_requests),
                        ..Default::default()
                    },
                ),
            )
            .await?;

        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            message,
            new_session_id,
            FriendLists {
                friends: requester_friends,
                friend_requests: requester_requests,
            },
        ))
    }

    /// Declared but unbuilt upstream. The ownership checks run; the mutation
    /// itself reports unimplemented rather than guessing at semantics.
    pub async fn remove_friend(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        friend_username: &str,
    ) -> CoordResult<Reply<FriendLists>> {
        require_inputs(&[friend_username])?;
        self.validate_session(session_id, user_id).await?;

        let requester = self.get_user_by_id(user_id).await?;
        let target = self.get_user_by_username(friend_username).await?;

        if !requester
            .friends
            .iter()
            .any(|friend| friend.as_str() == friend_username)
        {
            return Err(CoordError::Conflict(
                "You are not friends with this user".into(),
            ));
        }
        if target.id == requester.id {
            return Err(CoordError::Validation(
                "You cannot remove yourself as a friend".into(),
            ));
        }

        Err(CoordError::Unimplemented(
            "Removing friends has not yet been implemented".into(),
        ))
    }

    /// Read the caller's confirmed friends. Rotates.
    pub async fn get_friends(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> CoordResult<Reply<Vec<String>>> {
        self.validate_session(session_id, user_id).await?;
        let user = self.get_user_by_id(user_id).await?;
        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            "Successfully retrieved the friends list",
            new_session_id,
            user.friends,
        ))
    }

    /// Read the caller's inbound pending requests. Rotates.
    pub async fn get_friend_requests(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> CoordResult<Reply<Vec<String>>> {
        self.validate_session(session_id, user_id).await?;
        let user = self.get_user_by_id(user_id).await?;
        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            "Successfully retrieved the friend requests",
            new_session_id,
            user.friend_requests,
        ))
    }

    /// A confirmed friend's cleaned availability ledger. Rotates.
    pub async fn get_friend_availabilities(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        friend_username: &str,
    ) -> CoordResult<Reply<Vec<AvailabilitySlot>>> {
        require_inputs(&[friend_username])?;
        self.validate_session(session_id, user_id).await?;

        let user = self.get_user_by_id(user_id).await?;
        let friend = self
            .get_user_by_username(friend_username)
            .await
            .map_err(|err| match err {
                CoordError::NotFound(_) => {
                    CoordError::NotFound(format!("Did not find user {friend_username}"))
                }
                other => other,
            })?;
        let friend = self.cleanup_availabilities(friend.id).await?;

        if !user
            .friends
            .iter()
            .any(|name| name.as_str() == friend_username)
        {
            return Err(CoordError::NotFound(format!(
                "{friend_username} is not in your friends list"
            )));
        }

        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            format!("Successfully retrieved {friend_username}'s availabilities"),
            new_session_id,
            friend.availabilities,
        ))
    }
}
