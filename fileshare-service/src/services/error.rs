use service_core::error::AppError;
use thiserror::Error;

use crate::services::jwt::TokenKind;

/// Uniform error surfaced by the metadata and blob store capabilities.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("unique constraint conflict")]
    Conflict,

    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(anyhow::anyhow!("{}", err))
    }
}

/// Domain error kind; every [`ServiceError`] maps to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    InvalidInput,
    Unauthenticated,
    UpstreamFailure,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    // Tokens
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token: expected {expected} token, found {found} token")]
    TokenKindMismatch { expected: TokenKind, found: TokenKind },

    #[error("Missing or invalid Authorization header")]
    MissingCredentials,

    // Users
    #[error("Email is required")]
    EmailRequired,

    #[error("Password is required")]
    PasswordRequired,

    #[error("Password must be at least 8 characters")]
    PasswordTooShort,

    #[error("Email already exists")]
    EmailExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    // Groups
    #[error("Group not found")]
    GroupNotFound,

    #[error("Name is required")]
    NameRequired,

    #[error("User ID is required")]
    UserIdRequired,

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("User is not a member of this group")]
    NotMember,

    #[error("User is already a member of this group")]
    AlreadyMember,

    #[error("Cannot remove yourself from the group")]
    CannotRemoveSelf,

    #[error("User is not an admin of this group")]
    NotAdmin,

    // Files
    #[error("File not found")]
    FileNotFound,

    #[error("Group ID is required")]
    GroupIdRequired,

    #[error("Uploaded by is required")]
    UploadedByRequired,

    #[error("File exceeds maximum size ({size} > {max} bytes)")]
    FileTooLarge { size: i64, max: i64 },

    #[error("Invalid file size: {0}")]
    InvalidFileSize(i64),

    #[error("File body has {received} bytes but {declared} were declared")]
    SizeMismatch { declared: i64, received: u64 },

    #[error("Failed to upload file: {0}")]
    UploadFailed(StoreError),

    #[error("Failed to download file: {0}")]
    DownloadFailed(StoreError),

    // Infrastructure
    #[error("Store operation '{0}' timed out")]
    Timeout(&'static str),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Store(err)
    }
}

impl StoreError {
    /// Name a miss with the domain error for the entity that was looked up.
    pub(crate) fn or_not_found(self, not_found: ServiceError) -> ServiceError {
        match self {
            StoreError::NotFound => not_found,
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidToken
            | ServiceError::ExpiredToken
            | ServiceError::TokenKindMismatch { .. }
            | ServiceError::MissingCredentials
            | ServiceError::InvalidPassword => ErrorKind::Unauthenticated,

            ServiceError::UserNotFound
            | ServiceError::GroupNotFound
            | ServiceError::FileNotFound => ErrorKind::NotFound,

            ServiceError::EmailExists | ServiceError::AlreadyMember => ErrorKind::Conflict,

            ServiceError::NotMember | ServiceError::NotAdmin | ServiceError::CannotRemoveSelf => {
                ErrorKind::Forbidden
            }

            ServiceError::EmailRequired
            | ServiceError::PasswordRequired
            | ServiceError::PasswordTooShort
            | ServiceError::NameRequired
            | ServiceError::UserIdRequired
            | ServiceError::InvalidRole(_)
            | ServiceError::GroupIdRequired
            | ServiceError::UploadedByRequired
            | ServiceError::FileTooLarge { .. }
            | ServiceError::InvalidFileSize(_)
            | ServiceError::SizeMismatch { .. } => ErrorKind::InvalidInput,

            ServiceError::UploadFailed(_)
            | ServiceError::DownloadFailed(_)
            | ServiceError::Timeout(_)
            | ServiceError::Store(_)
            | ServiceError::Internal(_) => ErrorKind::UpstreamFailure,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        if let ServiceError::FileTooLarge { .. } = err {
            return AppError::PayloadTooLarge(anyhow::anyhow!(err.to_string()));
        }

        let kind = err.kind();
        match err {
            ServiceError::Timeout(op) => AppError::GatewayTimeout(op.to_string()),
            ServiceError::UploadFailed(e) | ServiceError::DownloadFailed(e) => {
                AppError::BadGateway(e.to_string())
            }
            ServiceError::Store(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            other => {
                let message = anyhow::anyhow!(other.to_string());
                match kind {
                    ErrorKind::NotFound => AppError::NotFound(message),
                    ErrorKind::Conflict => AppError::Conflict(message),
                    ErrorKind::Forbidden => AppError::Forbidden(message),
                    ErrorKind::InvalidInput => AppError::BadRequest(message),
                    ErrorKind::Unauthenticated => AppError::Unauthorized(message),
                    ErrorKind::UpstreamFailure => AppError::InternalError(message),
                }
            }
        }
    }
}
