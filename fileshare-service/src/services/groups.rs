use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{AddMemberInput, CreateGroupInput, Group, Membership, Role};
use crate::services::error::{ServiceError, StoreError};
use crate::services::repository::{GroupRepository, UserRepository};

/// Membership Authority: group creation, role assignment and the single
/// answer to "may this user act on this group".
///
/// Roles are read from the store on every call, never from token claims.
#[derive(Clone)]
pub struct MembershipService {
    groups: Arc<dyn GroupRepository>,
    users: Arc<dyn UserRepository>,
}

impl MembershipService {
    pub fn new(groups: Arc<dyn GroupRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { groups, users }
    }

    /// Create a group with its creator as the first admin.
    pub async fn create_group(
        &self,
        input: CreateGroupInput,
        creator_id: Uuid,
    ) -> Result<Group, ServiceError> {
        input.validate()?;

        let group = Group::new(input.name, creator_id);
        self.groups.create_group(&group).await?;

        let admin = Membership::new(creator_id, group.id, Role::Admin, group.created_at);
        if let Err(err) = self.groups.add_member(&admin).await {
            if let Err(cleanup_err) = self.groups.delete_group(group.id).await {
                tracing::warn!(
                    group_id = %group.id,
                    error = %cleanup_err,
                    "Failed to roll back group after creator membership insert failed"
                );
            }
            return Err(membership_err(err));
        }

        tracing::info!(group_id = %group.id, creator_id = %creator_id, "Group created");
        Ok(group)
    }

    pub async fn get_group(&self, group_id: Uuid) -> Result<Group, ServiceError> {
        self.groups
            .get_group(group_id)
            .await
            .map_err(|e| e.or_not_found(ServiceError::GroupNotFound))
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Group>, ServiceError> {
        Ok(self.groups.list_groups_by_user(user_id).await?)
    }

    /// A missing membership is `false`, not an error.
    pub async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, ServiceError> {
        match self.groups.get_membership(group_id, user_id).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(ServiceError::Store(e)),
        }
    }

    pub async fn get_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Membership, ServiceError> {
        self.groups
            .get_membership(group_id, user_id)
            .await
            .map_err(|e| e.or_not_found(ServiceError::NotMember))
    }

    pub async fn list_members(&self, group_id: Uuid) -> Result<Vec<Membership>, ServiceError> {
        Ok(self.groups.list_members(group_id).await?)
    }

    pub async fn group_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        Ok(self.groups.group_ids_for_user(user_id).await?)
    }

    /// Admin-only. An empty role means `member`.
    pub async fn add_member(
        &self,
        group_id: Uuid,
        input: AddMemberInput,
        requesting_user_id: Uuid,
    ) -> Result<Membership, ServiceError> {
        let role = input.validate()?;
        self.require_admin(group_id, requesting_user_id).await?;

        self.users
            .get_user(input.user_id)
            .await
            .map_err(|e| e.or_not_found(ServiceError::UserNotFound))?;

        let membership = Membership::new(input.user_id, group_id, role, Utc::now());
        self.groups
            .add_member(&membership)
            .await
            .map_err(membership_err)?;

        tracing::info!(
            group_id = %group_id,
            user_id = %membership.user_id,
            role = %role,
            added_by = %requesting_user_id,
            "Member added"
        );
        Ok(membership)
    }

    /// Admin-only. Nobody may remove themselves, whatever their role; there is
    /// no ownership transfer, so a sole admin stays in the group.
    pub async fn remove_member(
        &self,
        group_id: Uuid,
        target_user_id: Uuid,
        requesting_user_id: Uuid,
    ) -> Result<(), ServiceError> {
        if target_user_id == requesting_user_id {
            return Err(ServiceError::CannotRemoveSelf);
        }
        self.require_admin(group_id, requesting_user_id).await?;

        self.groups
            .remove_member(group_id, target_user_id)
            .await
            .map_err(|e| e.or_not_found(ServiceError::NotMember))?;

        tracing::info!(
            group_id = %group_id,
            user_id = %target_user_id,
            removed_by = %requesting_user_id,
            "Member removed"
        );
        Ok(())
    }

    async fn require_admin(&self, group_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        match self.groups.get_membership(group_id, user_id).await {
            Ok(membership) if membership.is_admin() => Ok(()),
            Ok(_) | Err(StoreError::NotFound) => Err(ServiceError::NotAdmin),
            Err(e) => Err(ServiceError::Store(e)),
        }
    }
}

fn membership_err(err: StoreError) -> ServiceError {
    match err {
        StoreError::Conflict => ServiceError::AlreadyMember,
        other => ServiceError::Store(other),
    }
}
