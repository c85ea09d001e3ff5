//! Password-gated groups. The member list and each member's `groups` entry
//! are denormalized; every join/leave/create writes both sides. A group that
//! reaches zero members persists empty — there is no deletion rule.

use tracing::info;
use uuid::Uuid;

use crate::availability::MemberAvailability;
use crate::coordinator::{require_inputs, unique, Coordinator, Reply};
use crate::error::{CoordError, CoordResult};
use crate::models::Group;
use crate::password::{hash_password, verify_password};
use crate::store::UserPatch;

impl Coordinator {
    pub(crate) async fn get_group_by_name(&self, name: &str) -> CoordResult<Group> {
        let groups = self.store.find_groups(name).await?;
        unique(
            groups,
            CoordError::NotFound("Found no group with that name".into()),
            &format!("groups with name {name}"),
        )
    }

    /// Create a group whose sole initial member is the creator.
    pub async fn create_group(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        name: &str,
        password: &str,
    ) -> CoordResult<Reply<Vec<String>>> {
        require_inputs(&[name, password])?;
        self.validate_session(session_id, user_id).await?;

        let existing = self.store.find_groups(name).await?;
        match existing.len() {
            0 => {}
            1 => {
                return Err(CoordError::Conflict(format!(
                    "Found an existing group called {name}"
                )))
            }
            n => {
                return Err(CoordError::consistency(format!(
                    "Found {n} groups with name {name}"
                )))
            }
        }

        let user = self.get_user_by_id(user_id).await?;
        let group = Group {
            name: name.to_string(),
            password_hash: hash_password(password)?,
            members: vec![user.username.clone()],
        };
        self.store.insert_group(group).await?;
        info!(group = name, creator = %user.username, "group created");

        let mut groups = user.groups;
        if !groups.iter().any(|g| g.as_str() == name) {
            groups.push(name.to_string());
        }
        self.store
            .update_user(
                user_id,
                UserPatch {
                    groups: Some(groups.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            format!("Successfully created group {name}"),
            new_session_id,
            groups,
        ))
    }

    /// Join an existing group; the password gate runs before the membership
    /// check, and a wrong password mutates nothing.
    pub async fn join_group(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        name: &str,
        password: &str,
    ) -> CoordResult<Reply<Vec<String>>> {
        require_inputs(&[name, password])?;
        self.validate_session(session_id, user_id).await?;

        let group = self.get_group_by_name(name).await?;
        if !verify_password(password, &group.password_hash)? {
            return Err(CoordError::Validation(
                "The password you have provided is invalid".into(),
            ));
        }

        let user = self.get_user_by_id(user_id).await?;
        if group.members.iter().any(|m| m == &user.username) {
            return Err(CoordError::Conflict(format!(
                "You are already a member of {name}"
            )));
        }

        let mut members = group.members;
        members.push(user.username.clone());
        self.store.update_group_members(name, members).await?;

        let mut groups = user.groups;
        if !groups.iter().any(|g| g.as_str() == name) {
            groups.push(name.to_string());
        }
        self.store
            .update_user(
                user_id,
                UserPatch {
                    groups: Some(groups.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            format!("Successfully joined {name}"),
            new_session_id,
            groups,
        ))
    }

    /// Leave a group. Both sides are updated; an emptied group persists.
    pub async fn leave_group(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        name: &str,
    ) -> CoordResult<Reply<Vec<String>>> {
        require_inputs(&[name])?;
        self.validate_session(session_id, user_id).await?;

        let group = self.get_group_by_name(name).await?;
        let user = self.get_user_by_id(user_id).await?;
        if !group.members.iter().any(|m| m == &user.username) {
            return Err(CoordError::Conflict(format!(
                "You are not a member of {name}"
            )));
        }

        let members: Vec<String> = group
            .members
            .into_iter()
            .filter(|m| m != &user.username)
            .collect();
        self.store.update_group_members(name, members).await?;

        let groups: Vec<String> = user
            .groups
            .into_iter()
            .filter(|g| g.as_str() != name)
            .collect();
        self.store
            .update_user(
                user_id,
                UserPatch {
                    groups: Some(groups.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            format!("Successfully left {name}"),
            new_session_id,
            groups,
        ))
    }

    /// Membership-gated member list. Does not rotate.
    pub async fn get_group_members(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        name: &str,
    ) -> CoordResult<Reply<Vec<String>>> {
        require_inputs(&[name])?;
        self.validate_session(session_id, user_id).await?;

        let user = self.get_user_by_id(user_id).await?;
        let group = self.get_group_by_name(name).await?;
        if !group.members.iter().any(|m| m == &user.username) {
            return Err(CoordError::Conflict(format!("You are not part of {name}")));
        }

        Ok(Reply::new(
            "Successfully retrieved group members",
            group.members,
        ))
    }

    /// Membership-gated aggregate: every member's cleaned ledger, in
    /// member-list order. Rotates.
    pub async fn get_group_availabilities(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        name: &str,
    ) -> CoordResult<Reply<Vec<MemberAvailability>>> {
        require_inputs(&[name])?;
        self.validate_session(session_id, user_id).await?;

        let user = self.get_user_by_id(user_id).await?;
        let group = self.get_group_by_name(name).await?;
        if !group.members.iter().any(|m| m == &user.username) {
            return Err(CoordError::Conflict(format!(
                "You are not in the group {name}"
            )));
        }

        let availabilities = self.collect_group_availabilities(&group.members).await?;

        let new_session_id = self.rotate_session(session_id, user_id).await?;
        Ok(Reply::rotated(
            "Successfully retrieved group availabilities",
            new_session_id,
            availabilities,
        ))
    }
}
