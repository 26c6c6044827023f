//! In-memory Metadata Store and Blob Store used by tests and local runs.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{File, Group, Membership, User};
use crate::services::error::StoreError;
use crate::services::repository::{FileRepository, GroupRepository, UserRepository};
use crate::services::storage::{blob_stream, collect_blob, BlobStore, BlobStream};

#[derive(Default)]
struct MetadataState {
    users: HashMap<Uuid, User>,
    groups: HashMap<Uuid, Group>,
    memberships: HashMap<(Uuid, Uuid), Membership>,
    files: HashMap<Uuid, File>,
}

/// Metadata Store with the same miss, conflict and cascade behavior as the
/// PostgreSQL schema.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    state: Mutex<MetadataState>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MetadataState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::backend(format!("metadata store mutex poisoned: {}", e)))
    }

    pub fn group_count(&self) -> usize {
        self.state().map(|s| s.groups.len()).unwrap_or_default()
    }

    pub fn file_count(&self) -> usize {
        self.state().map(|s| s.files.len()).unwrap_or_default()
    }

    pub fn membership_count(&self, group_id: Uuid) -> usize {
        self.state()
            .map(|s| s.memberships.keys().filter(|(_, g)| *g == group_id).count())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UserRepository for InMemoryMetadataStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict);
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        self.state()?.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.state()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Conflict);
        }
        match state.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.users.remove(&id).ok_or(StoreError::NotFound)?;
        state.memberships.retain(|(user_id, _), _| *user_id != id);
        Ok(())
    }
}

#[async_trait]
impl GroupRepository for InMemoryMetadataStore {
    async fn create_group(&self, group: &Group) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.groups.contains_key(&group.id) {
            return Err(StoreError::Conflict);
        }
        state.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_group(&self, id: Uuid) -> Result<Group, StoreError> {
        self.state()?.groups.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn delete_group(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state.groups.remove(&id).ok_or(StoreError::NotFound)?;
        state.memberships.retain(|(_, group_id), _| *group_id != id);
        state.files.retain(|_, f| f.group_id != id);
        Ok(())
    }

    async fn list_groups_by_user(&self, user_id: Uuid) -> Result<Vec<Group>, StoreError> {
        let state = self.state()?;
        let mut groups: Vec<Group> = state
            .memberships
            .keys()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, g)| state.groups.get(g).cloned())
            .collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(groups)
    }

    async fn add_member(&self, membership: &Membership) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if !state.groups.contains_key(&membership.group_id)
            || !state.users.contains_key(&membership.user_id)
        {
            return Err(StoreError::backend("membership references a missing row"));
        }
        let key = (membership.user_id, membership.group_id);
        if state.memberships.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        state.memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        self.state()?
            .memberships
            .remove(&(user_id, group_id))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn get_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Membership, StoreError> {
        self.state()?
            .memberships
            .get(&(user_id, group_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_members(&self, group_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        let mut members: Vec<Membership> = self
            .state()?
            .memberships
            .values()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(members)
    }

    async fn group_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .state()?
            .memberships
            .keys()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, g)| *g)
            .collect())
    }
}

#[async_trait]
impl FileRepository for InMemoryMetadataStore {
    async fn create_file(&self, file: &File) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.files.contains_key(&file.id) {
            return Err(StoreError::Conflict);
        }
        state.files.insert(file.id, file.clone());
        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<File, StoreError> {
        self.state()?.files.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn delete_file(&self, id: Uuid) -> Result<(), StoreError> {
        self.state()?
            .files
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list_files_by_group(&self, group_id: Uuid) -> Result<Vec<File>, StoreError> {
        let mut files: Vec<File> = self
            .state()?
            .files
            .values()
            .filter(|f| f.group_id == group_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }
}

/// Blob Store backed by a map, with call counters and fault switches.
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_put: AtomicBool,
    fail_get: AtomicBool,
    fail_delete: AtomicBool,
    put_delay_ms: AtomicU64,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> Result<MutexGuard<'_, HashMap<String, (Bytes, String)>>, StoreError> {
        self.objects
            .lock()
            .map_err(|e| StoreError::backend(format!("blob store mutex poisoned: {}", e)))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects().map(|o| o.contains_key(key)).unwrap_or(false)
    }

    pub fn object_count(&self) -> usize {
        self.objects().map(|o| o.len()).unwrap_or_default()
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Delay every `put` before it stores anything.
    pub fn delay_puts(&self, delay: Duration) {
        self.put_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        body: BlobStream,
        content_type: &str,
        _size: i64,
    ) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.put_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected put failure"));
        }

        let data = collect_blob(body).await.map_err(StoreError::backend)?;
        self.objects()?
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<BlobStream, StoreError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected get failure"));
        }
        let (data, _) = self.objects()?.get(key).cloned().ok_or(StoreError::NotFound)?;
        Ok(blob_stream(data))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected delete failure"));
        }
        self.objects()?.remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str) -> Result<String, StoreError> {
        if !self.objects()?.contains_key(key) {
            return Err(StoreError::NotFound);
        }
        Ok(format!("memory://blobs/{}?expires=900", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::{Duration as ChronoDuration, Utc};

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = InMemoryMetadataStore::new();
        store
            .create_user(&User::new("a@example.com".into(), "h".into()))
            .await
            .unwrap();

        let result = store
            .create_user(&User::new("a@example.com".into(), "h".into()))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict)));
        // Email comparison is exact.
        assert!(store
            .create_user(&User::new("A@example.com".into(), "h".into()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_group_delete_cascades() {
        let store = InMemoryMetadataStore::new();
        let user = User::new("a@example.com".into(), "h".into());
        store.create_user(&user).await.unwrap();
        let group = Group::new("team".into(), user.id);
        store.create_group(&group).await.unwrap();
        store
            .add_member(&Membership::new(user.id, group.id, Role::Admin, Utc::now()))
            .await
            .unwrap();

        store.delete_group(group.id).await.unwrap();
        assert_eq!(store.membership_count(group.id), 0);
        assert!(store.group_ids_for_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_members_in_join_order() {
        let store = InMemoryMetadataStore::new();
        let first = User::new("a@example.com".into(), "h".into());
        let second = User::new("b@example.com".into(), "h".into());
        store.create_user(&first).await.unwrap();
        store.create_user(&second).await.unwrap();
        let group = Group::new("team".into(), first.id);
        store.create_group(&group).await.unwrap();

        let now = Utc::now();
        store
            .add_member(&Membership::new(second.id, group.id, Role::Member, now))
            .await
            .unwrap();
        store
            .add_member(&Membership::new(
                first.id,
                group.id,
                Role::Admin,
                now - ChronoDuration::seconds(5),
            ))
            .await
            .unwrap();

        let members = store.list_members(group.id).await.unwrap();
        assert_eq!(members[0].user_id, first.id);
        assert_eq!(members[1].user_id, second.id);
    }

    #[tokio::test]
    async fn test_blob_round_trip_and_counters() {
        let blobs = InMemoryBlobStore::new();
        blobs
            .put("k", blob_stream(&b"abc"[..]), "text/plain", 3)
            .await
            .unwrap();
        assert_eq!(blobs.put_calls(), 1);

        let data = collect_blob(blobs.get("k").await.unwrap()).await.unwrap();
        assert_eq!(&data[..], b"abc");

        blobs.delete("k").await.unwrap();
        assert_eq!(blobs.delete_calls(), 1);
        assert!(matches!(blobs.get("k").await, Err(StoreError::NotFound)));
    }
}
