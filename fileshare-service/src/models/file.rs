//! File metadata model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::ServiceError;

/// Maximum accepted upload size (1 GiB).
pub const MAX_FILE_SIZE: i64 = 1024 * 1024 * 1024;

/// Blob key layout: `groups/{group_id}/{file_id}/{name}`.
pub fn blob_key(group_id: Uuid, file_id: Uuid, name: &str) -> String {
    format!("groups/{}/{}/{}", group_id, file_id, name)
}

/// File metadata. A file exists only while both this row and its blob exist.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct File {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub blob_key: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub group_id: Uuid,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Upload request as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct UploadFileInput {
    pub name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub group_id: Uuid,
    pub uploaded_by: Uuid,
}

impl UploadFileInput {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.name.is_empty() {
            return Err(ServiceError::NameRequired);
        }
        if self.group_id.is_nil() {
            return Err(ServiceError::GroupIdRequired);
        }
        if self.uploaded_by.is_nil() {
            return Err(ServiceError::UploadedByRequired);
        }
        if self.size_bytes < 0 {
            return Err(ServiceError::InvalidFileSize(self.size_bytes));
        }
        if self.size_bytes > MAX_FILE_SIZE {
            return Err(ServiceError::FileTooLarge {
                size: self.size_bytes,
                max: MAX_FILE_SIZE,
            });
        }
        Ok(())
    }
}
