//! Metadata Store capability.
//!
//! One trait per entity so callers depend only on what they touch. Every
//! lookup reports a miss as [`StoreError::NotFound`] and every unique
//! constraint violation as [`StoreError::Conflict`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{File, Group, Membership, User};
use crate::services::error::StoreError;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; a taken email is a `Conflict`.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;
    async fn get_user(&self, id: Uuid) -> Result<User, StoreError>;
    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn create_group(&self, group: &Group) -> Result<(), StoreError>;
    async fn get_group(&self, id: Uuid) -> Result<Group, StoreError>;
    /// Memberships of the group go with it.
    async fn delete_group(&self, id: Uuid) -> Result<(), StoreError>;
    /// Groups the user belongs to, newest first.
    async fn list_groups_by_user(&self, user_id: Uuid) -> Result<Vec<Group>, StoreError>;

    /// Insert a membership; an existing `(user_id, group_id)` pair is a `Conflict`.
    async fn add_member(&self, membership: &Membership) -> Result<(), StoreError>;
    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;
    async fn get_membership(&self, group_id: Uuid, user_id: Uuid)
        -> Result<Membership, StoreError>;
    /// Members in join order.
    async fn list_members(&self, group_id: Uuid) -> Result<Vec<Membership>, StoreError>;
    async fn group_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn create_file(&self, file: &File) -> Result<(), StoreError>;
    async fn get_file(&self, id: Uuid) -> Result<File, StoreError>;
    async fn delete_file(&self, id: Uuid) -> Result<(), StoreError>;
    /// Files of the group, newest first.
    async fn list_files_by_group(&self, group_id: Uuid) -> Result<Vec<File>, StoreError>;
}
