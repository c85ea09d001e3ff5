//! Weekly availability ledger with rolling-window cleanup.
//!
//! Cleanup runs on access, before every read or mutation that touches a
//! ledger, instead of as a scheduled job. Slot counts are bounded by 7×24,
//! so pruning on the hot path stays cheap.

use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::coordinator::{Coordinator, Reply};
use crate::error::{CoordError, CoordResult};
use crate::models::{AvailabilitySlot, User};
use crate::store::UserPatch;

/// Keep only slots stamped inside the half-open window `[today, today+6)`.
///
/// Day-of-month arithmetic only; a slot stamped near the end of a month is
/// pruned incorrectly when the window crosses into the next month. This
/// matches the upstream behavior on purpose.
pub fn retain_window(slots: &[AvailabilitySlot], today: u8) -> Vec<AvailabilitySlot> {
    slots
        .iter()
        .filter(|slot| slot.day_of_month >= today && slot.day_of_month < today + 6)
        .copied()
        .collect()
}

fn check_range(weekday: u8, hour: u8) -> CoordResult<()> {
    if weekday > 6 || hour > 23 {
        return Err(CoordError::Validation(
            "Day must be in [0, 6] and hour in [0, 23]".into(),
        ));
    }
    Ok(())
}

/// One group member's cleaned ledger, in member-list order.
#[derive(Debug, Clone, Serialize)]
pub struct MemberAvailability {
    pub username: String,
    pub availabilities: Vec<AvailabilitySlot>,
}

impl Coordinator {
    /// Prune a user's expired slots and persist the result. Returns the user
    /// with the cleaned ledger so callers need not re-read.
    pub(crate) async fn cleanup_availabilities(&self, user_id: Uuid) -> CoordResult<User> {
        let user = self.get_user_by_id(user_id).await?;
        self.cleanup_user(user).await
    }

    async fn cleanup_user(&self, user: User) -> CoordResult<User> {
        let today = OffsetDateTime::now_utc().day();
        let kept = retain_window(&user.availabilities, today);
        if kept.len() != user.availabilities.len() {
            debug!(
                user_id = %user.id,
                pruned = user.availabilities.len() - kept.len(),
                "pruned expired availability slots"
            );
            self.store
                .update_user(
                    user.id,
                    UserPatch {
                        availabilities: Some(kept.clone()),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Ok(User {
            availabilities: kept,
            ..user
        })
    }

    /// Append a slot stamped with today's day-of-month. Duplicate
    /// (weekday, hour) pairs are rejected after cleanup.
    pub async fn add_availability(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        weekday: u8,
        hour: u8,
    ) -> CoordResult<Reply<Vec<AvailabilitySlot>>> {
        check_range(weekday, hour)?;
        self.validate_session(session_id, user_id).await?;

        let user = self.cleanup_availabilities(user_id).await?;
        let exists = user
            .availabilities
            .iter()
            .any(|slot| slot.weekday == weekday && slot.hour == hour);
        if exists {
            return Err(CoordError::Conflict(format!(
                "Availability hour: {hour} weekday: {weekday} already exists"
            )));
        }

        let mut availabilities = user.availabilities;
        availabilities.push(AvailabilitySlot {
            weekday,
            hour,
            day_of_month: OffsetDateTime::now_utc().day(),
        });
        self.store
            .update_user(
                user_id,
                UserPatch {
                    availabilities: Some(availabilities.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            "Successfully added availability",
            new_session_id,
            availabilities,
        ))
    }

    /// Remove the slot matching (weekday, hour), if present after cleanup.
    pub async fn remove_availability(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        weekday: u8,
        hour: u8,
    ) -> CoordResult<Reply<Vec<AvailabilitySlot>>> {
        check_range(weekday, hour)?;
        self.validate_session(session_id, user_id).await?;

        let user = self.cleanup_availabilities(user_id).await?;
        let exists = user
            .availabilities
            .iter()
            .any(|slot| slot.weekday == weekday && slot.hour == hour);
        if !exists {
            return Err(CoordError::NotFound(format!(
                "Availability hour: {hour} weekday: {weekday} does not exist"
            )));
        }

        let availabilities: Vec<AvailabilitySlot> = user
            .availabilities
            .into_iter()
            .filter(|slot| slot.weekday != weekday || slot.hour != hour)
            .collect();
        self.store
            .update_user(
                user_id,
                UserPatch {
                    availabilities: Some(availabilities.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            "Successfully deleted the described availability",
            new_session_id,
            availabilities,
        ))
    }

    /// Read the caller's cleaned ledger. Rotates like a mutation, because the
    /// cleanup it triggers may write.
    pub async fn get_availabilities(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> CoordResult<Reply<Vec<AvailabilitySlot>>> {
        self.validate_session(session_id, user_id).await?;
        let user = self.cleanup_availabilities(user_id).await?;
        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            "Successfully retrieved availabilities",
            new_session_id,
            user.availabilities,
        ))
    }

    /// Clean and collect each member's ledger, one entry per member in
    /// member-list order. Members with empty ledgers are included.
    pub(crate) async fn collect_group_availabilities(
        &self,
        members: &[String],
    ) -> CoordResult<Vec<MemberAvailability>> {
        let mut collected = Vec::with_capacity(members.len());
        for username in members {
            let member = self.get_user_by_username(username).await?;
            let member = self.cleanup_user(member).await?;
            collected.push(MemberAvailability {
                username: member.username,
                availabilities: member.availabilities,
            });
        }
        Ok(collected)
    }
}
