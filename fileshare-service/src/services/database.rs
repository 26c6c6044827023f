//! PostgreSQL implementation of the Metadata Store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{File, Group, Membership, Role, User};
use crate::services::error::StoreError;
use crate::services::repository::{FileRepository, GroupRepository, UserRepository};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }
}

fn store_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => StoreError::Conflict,
        other => StoreError::Backend(anyhow::anyhow!(other)),
    }
}

fn expect_one(rows_affected: u64) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

#[derive(FromRow)]
struct MembershipRow {
    user_id: Uuid,
    group_id: Uuid,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = StoreError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|_| StoreError::backend(format!("unknown role in storage: {}", row.role)))?;
        Ok(Membership::new(row.user_id, row.group_id, role, row.joined_at))
    }
}

// ==================== User Operations ====================

#[async_trait]
impl UserRepository for Database {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET email = $1, password_hash = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        expect_one(result.rows_affected())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        expect_one(result.rows_affected())
    }
}

// ==================== Group Operations ====================

#[async_trait]
impl GroupRepository for Database {
    async fn create_group(&self, group: &Group) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO groups (id, name, created_by, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(group.created_by)
        .bind(group.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_group(&self, id: Uuid) -> Result<Group, StoreError> {
        sqlx::query_as::<_, Group>(
            "SELECT id, name, created_by, created_at FROM groups WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)
    }

    async fn delete_group(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        expect_one(result.rows_affected())
    }

    async fn list_groups_by_user(&self, user_id: Uuid) -> Result<Vec<Group>, StoreError> {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name, g.created_by, g.created_at
            FROM groups g
            INNER JOIN user_groups ug ON g.id = ug.group_id
            WHERE ug.user_id = $1
            ORDER BY g.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)
    }

    // ==================== Membership Operations ====================

    async fn add_member(&self, membership: &Membership) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_groups (user_id, group_id, role, joined_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(membership.user_id)
        .bind(membership.group_id)
        .bind(membership.role.as_str())
        .bind(membership.joined_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM user_groups WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        expect_one(result.rows_affected())
    }

    async fn get_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Membership, StoreError> {
        sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT user_id, group_id, role, joined_at
            FROM user_groups
            WHERE group_id = $1 AND user_id = $2
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?
        .try_into()
    }

    async fn list_members(&self, group_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT user_id, group_id, role, joined_at
            FROM user_groups
            WHERE group_id = $1
            ORDER BY joined_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?
        .into_iter()
        .map(Membership::try_from)
        .collect()
    }

    async fn group_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        sqlx::query_scalar::<_, Uuid>("SELECT group_id FROM user_groups WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)
    }
}

// ==================== File Operations ====================

#[async_trait]
impl FileRepository for Database {
    async fn create_file(&self, file: &File) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO files (id, name, blob_key, size_bytes, content_type, group_id, uploaded_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(file.id)
        .bind(&file.name)
        .bind(&file.blob_key)
        .bind(file.size_bytes)
        .bind(&file.content_type)
        .bind(file.group_id)
        .bind(file.uploaded_by)
        .bind(file.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<File, StoreError> {
        sqlx::query_as::<_, File>(
            r#"
            SELECT id, name, blob_key, size_bytes, content_type, group_id, uploaded_by, created_at
            FROM files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)
    }

    async fn delete_file(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        expect_one(result.rows_affected())
    }

    async fn list_files_by_group(&self, group_id: Uuid) -> Result<Vec<File>, StoreError> {
        sqlx::query_as::<_, File>(
            r#"
            SELECT id, name, blob_key, size_bytes, content_type, group_id, uploaded_by, created_at
            FROM files
            WHERE group_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)
    }
}
