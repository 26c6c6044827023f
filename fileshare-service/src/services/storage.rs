use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, TryStreamExt};
use secrecy::ExposeSecret;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::io::ReaderStream;

use crate::config::StorageConfig;
use crate::services::error::StoreError;

/// Byte stream flowing into and out of the Blob Store.
pub type BlobStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Wrap an in-memory payload as a single-chunk stream.
pub fn blob_stream(data: impl Into<Bytes>) -> BlobStream {
    Box::pin(futures::stream::iter(std::iter::once(Ok(data.into()))))
}

/// Drain a stream into one contiguous buffer.
pub async fn collect_blob(stream: BlobStream) -> Result<Bytes, std::io::Error> {
    let buf = stream
        .try_fold(BytesMut::new(), |mut buf, chunk| async move {
            buf.extend_from_slice(&chunk);
            Ok(buf)
        })
        .await?;
    Ok(buf.freeze())
}

/// Observes a body wrapped by [`sized_blob`] after the stream has been consumed.
#[derive(Debug, Clone, Default)]
pub struct BodySize {
    received: Arc<AtomicU64>,
    mismatched: Arc<AtomicBool>,
}

impl BodySize {
    /// Bytes seen so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    /// Whether the body ended short of, or ran past, its declared size.
    pub fn mismatched(&self) -> bool {
        self.mismatched.load(Ordering::SeqCst)
    }
}

struct SizedBody {
    inner: BlobStream,
    declared: u64,
    size: BodySize,
    finished: bool,
}

impl SizedBody {
    fn mismatch(&mut self, received: u64) -> std::io::Error {
        self.finished = true;
        self.size.mismatched.store(true, Ordering::SeqCst);
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("body has {} bytes but {} were declared", received, self.declared),
        )
    }
}

impl Stream for SizedBody {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let received = self
                    .size
                    .received
                    .fetch_add(chunk.len() as u64, Ordering::SeqCst)
                    + chunk.len() as u64;
                if received > self.declared {
                    return Poll::Ready(Some(Err(self.mismatch(received))));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                let received = self.size.received();
                if received != self.declared {
                    return Poll::Ready(Some(Err(self.mismatch(received))));
                }
                self.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Hold a body to exactly `declared` bytes. The stream errors as soon as more
/// bytes arrive, or at its end if fewer did; the returned [`BodySize`] records
/// which happened.
pub fn sized_blob(body: BlobStream, declared: u64) -> (BlobStream, BodySize) {
    let size = BodySize::default();
    let stream = SizedBody {
        inner: body,
        declared,
        size: size.clone(),
        finished: false,
    };
    (Box::pin(stream), size)
}

/// Blob Store capability: opaque keys to byte content.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        body: BlobStream,
        content_type: &str,
        size: i64,
    ) -> Result<(), StoreError>;
    /// A missing key is [`StoreError::NotFound`].
    async fn get(&self, key: &str) -> Result<BlobStream, StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Time-bounded URL granting direct read access to the object.
    async fn presign_get(&self, key: &str) -> Result<String, StoreError>;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    multipart_threshold: i64,
    part_size: usize,
    presign_ttl: Duration,
}

impl S3Storage {
    pub fn new(client: S3Client, config: &StorageConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            multipart_threshold: config.multipart_threshold_bytes,
            part_size: usize::try_from(config.part_size_bytes).unwrap_or(10 * 1024 * 1024),
            presign_ttl: Duration::from_secs(config.presign_ttl_seconds),
        }
    }

    /// Build a client from config: static credentials when given, otherwise the
    /// default provider chain, plus an optional custom endpoint (MinIO, localstack).
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.expose_secret().clone(),
                None,
                None,
                "fileshare-static",
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.use_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            "S3 storage initialized"
        );

        Self::new(S3Client::from_conf(builder.build()), config)
    }

    async fn put_single(
        &self,
        key: &str,
        body: BlobStream,
        content_type: &str,
        size: i64,
    ) -> Result<(), StoreError> {
        let data = collect_blob(body).await.map_err(StoreError::backend)?;

        // S3 rejects the request when the body disagrees with the declared length.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::backend(DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        body: BlobStream,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::backend(DisplayErrorContext(e)))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StoreError::backend("multipart upload returned no upload id"))?
            .to_string();

        match self.upload_parts(key, &upload_id, body).await {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|e| StoreError::backend(DisplayErrorContext(e)))?;
                Ok(())
            }
            Err(err) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        key = %key,
                        error = %DisplayErrorContext(abort_err),
                        "Failed to abort multipart upload"
                    );
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        mut body: BlobStream,
    ) -> Result<Vec<CompletedPart>, StoreError> {
        let mut parts = Vec::new();
        let mut buf = BytesMut::with_capacity(self.part_size);

        loop {
            let chunk = body.next().await.transpose().map_err(StoreError::backend)?;
            let done = chunk.is_none();
            if let Some(chunk) = chunk {
                buf.extend_from_slice(&chunk);
            }

            while buf.len() >= self.part_size || (done && (!buf.is_empty() || parts.is_empty())) {
                let take = buf.len().min(self.part_size);
                let part = buf.split_to(take).freeze();
                parts.push(self.upload_part(key, upload_id, parts.len() as i32 + 1, part).await?);
                if buf.is_empty() {
                    break;
                }
            }

            if done {
                return Ok(parts);
            }
        }
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<CompletedPart, StoreError> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(data.len() as i64)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::backend(DisplayErrorContext(e)))?;

        Ok(CompletedPart::builder()
            .set_e_tag(output.e_tag().map(str::to_string))
            .part_number(part_number)
            .build())
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    async fn put(
        &self,
        key: &str,
        body: BlobStream,
        content_type: &str,
        size: i64,
    ) -> Result<(), StoreError> {
        if size > self.multipart_threshold {
            tracing::debug!(key = %key, size, "Using multipart upload");
            self.put_multipart(key, body, content_type).await
        } else {
            self.put_single(key, body, content_type, size).await
        }
    }

    async fn get(&self, key: &str) -> Result<BlobStream, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound
                } else {
                    StoreError::backend(DisplayErrorContext(e))
                }
            })?;

        Ok(Box::pin(ReaderStream::new(output.body.into_async_read())))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::backend(DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str) -> Result<String, StoreError> {
        let presigning =
            PresigningConfig::expires_in(self.presign_ttl).map_err(StoreError::backend)?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StoreError::backend(DisplayErrorContext(e)))?;

        Ok(request.uri().to_string())
    }
}
