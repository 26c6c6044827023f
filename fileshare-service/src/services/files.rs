use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::models::{blob_key, File, UploadFileInput};
use crate::services::error::{ServiceError, StoreError};
use crate::services::groups::MembershipService;
use crate::services::metrics::{
    record_outcome, COMPENSATIONS_TOTAL, DELETES_TOTAL, DOWNLOADS_TOTAL, UPLOADS_TOTAL,
    UPLOAD_DURATION_SECONDS,
};
use crate::services::repository::FileRepository;
use crate::services::storage::{sized_blob, BlobStore, BlobStream};

/// File Orchestrator: keeps blob content and file metadata consistent.
///
/// Upload writes the blob before the metadata row and deletes the blob again
/// if the row cannot be written. Delete removes the row before the blob. The
/// metadata row is therefore the authority on whether a file exists; a stray
/// blob may be left behind, a stray row never is.
#[derive(Clone)]
pub struct FileService {
    files: Arc<dyn FileRepository>,
    blobs: Arc<dyn BlobStore>,
    membership: MembershipService,
    store_timeout: Duration,
}

impl FileService {
    pub fn new(
        files: Arc<dyn FileRepository>,
        blobs: Arc<dyn BlobStore>,
        membership: MembershipService,
        store_timeout: Duration,
    ) -> Self {
        Self {
            files,
            blobs,
            membership,
            store_timeout,
        }
    }

    #[tracing::instrument(
        skip(self, input, body),
        fields(group_id = %input.group_id, uploaded_by = %input.uploaded_by, size = input.size_bytes)
    )]
    pub async fn upload(
        &self,
        input: UploadFileInput,
        body: BlobStream,
    ) -> Result<File, ServiceError> {
        input.validate()?;
        self.authorize(input.group_id, input.uploaded_by).await?;

        let start = Instant::now();
        let file_id = Uuid::new_v4();
        let key = blob_key(input.group_id, file_id, &input.name);
        // Validated non-negative above.
        let declared = input.size_bytes.max(0) as u64;
        let (body, body_size) = sized_blob(body, declared);

        match self
            .bounded(
                "blob_put",
                self.blobs
                    .put(&key, body, &input.content_type, input.size_bytes),
            )
            .await
        {
            Ok(Ok(())) if body_size.received() == declared && !body_size.mismatched() => {}
            Ok(Ok(())) => {
                // The store accepted a body it did not fully read.
                record_outcome(UPLOADS_TOTAL, "size_mismatch");
                self.compensate(&key).await;
                return Err(ServiceError::SizeMismatch {
                    declared: input.size_bytes,
                    received: body_size.received(),
                });
            }
            Ok(Err(_)) if body_size.mismatched() => {
                record_outcome(UPLOADS_TOTAL, "size_mismatch");
                tracing::warn!(
                    key = %key,
                    declared = input.size_bytes,
                    received = body_size.received(),
                    "Upload body does not match declared size"
                );
                return Err(ServiceError::SizeMismatch {
                    declared: input.size_bytes,
                    received: body_size.received(),
                });
            }
            Ok(Err(e)) => {
                record_outcome(UPLOADS_TOTAL, "blob_failed");
                tracing::error!(key = %key, error = %e, "Blob upload failed");
                return Err(ServiceError::UploadFailed(e));
            }
            Err(timeout) => {
                // The put may have landed before it was cut off.
                record_outcome(UPLOADS_TOTAL, "timeout");
                self.compensate(&key).await;
                return Err(timeout);
            }
        }

        let file = File {
            id: file_id,
            name: input.name,
            blob_key: key,
            size_bytes: input.size_bytes,
            content_type: input.content_type,
            group_id: input.group_id,
            uploaded_by: input.uploaded_by,
            created_at: Utc::now(),
        };

        let inserted = match self
            .bounded("metadata_insert", self.files.create_file(&file))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServiceError::Store(e)),
            Err(timeout) => Err(timeout),
        };

        if let Err(err) = inserted {
            record_outcome(UPLOADS_TOTAL, "metadata_failed");
            tracing::error!(file_id = %file.id, error = %err, "File metadata insert failed");
            self.compensate(&file.blob_key).await;
            return Err(err);
        }

        record_outcome(UPLOADS_TOTAL, "success");
        metrics::histogram!(UPLOAD_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
        tracing::info!(file_id = %file.id, "File uploaded");
        Ok(file)
    }

    /// Stream a file's bytes; membership is re-checked against the file's group.
    pub async fn download(
        &self,
        file_id: Uuid,
        user_id: Uuid,
    ) -> Result<(BlobStream, File), ServiceError> {
        let file = self.get_file(file_id, user_id).await?;

        let stream = match self.bounded("blob_get", self.blobs.get(&file.blob_key)).await? {
            Ok(stream) => stream,
            Err(StoreError::NotFound) => {
                record_outcome(DOWNLOADS_TOTAL, "missing_blob");
                tracing::warn!(
                    file_id = %file.id,
                    key = %file.blob_key,
                    "Blob missing for file"
                );
                return Err(ServiceError::FileNotFound);
            }
            Err(e) => {
                record_outcome(DOWNLOADS_TOTAL, "blob_failed");
                return Err(ServiceError::DownloadFailed(e));
            }
        };

        record_outcome(DOWNLOADS_TOTAL, "success");
        Ok((stream, file))
    }

    pub async fn get_file(&self, file_id: Uuid, user_id: Uuid) -> Result<File, ServiceError> {
        let file = self
            .bounded("metadata_get", self.files.get_file(file_id))
            .await?
            .map_err(|e| e.or_not_found(ServiceError::FileNotFound))?;

        self.authorize(file.group_id, user_id).await?;
        Ok(file)
    }

    /// Files of a group, newest first.
    pub async fn list_by_group(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<File>, ServiceError> {
        self.authorize(group_id, user_id).await?;

        Ok(self
            .bounded("metadata_list", self.files.list_files_by_group(group_id))
            .await??)
    }

    /// Remove the metadata row, then the blob. A failed blob delete is logged,
    /// never returned.
    pub async fn delete(&self, file_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let file = self.get_file(file_id, user_id).await?;

        self.bounded("metadata_delete", self.files.delete_file(file.id))
            .await?
            .map_err(|e| e.or_not_found(ServiceError::FileNotFound))?;

        match self.bounded("blob_delete", self.blobs.delete(&file.blob_key)).await {
            Ok(Ok(())) => record_outcome(DELETES_TOTAL, "success"),
            Ok(Err(e)) => {
                record_outcome(DELETES_TOTAL, "blob_orphaned");
                tracing::warn!(
                    file_id = %file.id,
                    key = %file.blob_key,
                    error = %e,
                    "Blob delete failed; blob orphaned"
                );
            }
            Err(e) => {
                record_outcome(DELETES_TOTAL, "blob_orphaned");
                tracing::warn!(
                    file_id = %file.id,
                    key = %file.blob_key,
                    error = %e,
                    "Blob delete timed out; blob orphaned"
                );
            }
        }

        tracing::info!(file_id = %file.id, deleted_by = %user_id, "File deleted");
        Ok(())
    }

    /// Time-bounded direct download URL.
    pub async fn get_download_url(
        &self,
        file_id: Uuid,
        user_id: Uuid,
    ) -> Result<String, ServiceError> {
        let file = self.get_file(file_id, user_id).await?;

        self.bounded("blob_presign", self.blobs.presign_get(&file.blob_key))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound => ServiceError::FileNotFound,
                other => ServiceError::DownloadFailed(other),
            })
    }

    async fn authorize(&self, group_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        if !self
            .bounded("membership_check", self.membership.is_member(group_id, user_id))
            .await??
        {
            return Err(ServiceError::NotMember);
        }
        Ok(())
    }

    /// Best-effort removal of a blob whose metadata never landed.
    async fn compensate(&self, key: &str) {
        let outcome = match self.bounded("blob_delete", self.blobs.delete(key)).await {
            Ok(Ok(())) => "success",
            Ok(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "Compensating blob delete failed");
                "failed"
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Compensating blob delete timed out");
                "failed"
            }
        };
        record_outcome(COMPENSATIONS_TOTAL, outcome);
    }

    /// Run one store call under the per-call timeout. The outer error is the
    /// timeout; dropping `fut` cancels the call.
    async fn bounded<T, E, F>(
        &self,
        op: &'static str,
        fut: F,
    ) -> Result<Result<T, E>, ServiceError>
    where
        F: Future<Output = Result<T, E>>,
    {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| {
                tracing::warn!(
                    op,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                ServiceError::Timeout(op)
            })
    }
}
