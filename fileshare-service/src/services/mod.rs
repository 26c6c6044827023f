//! Services layer for fileshare-service.
//!
//! Token issue and validation, the Membership Authority, the File
//! Orchestrator and the store capabilities they run on.

mod database;
pub mod error;
mod files;
mod groups;
mod jwt;
pub mod memory;
pub mod metrics;
pub mod repository;
mod session;
pub mod storage;
mod users;

pub use database::Database;
pub use error::{ErrorKind, ServiceError, StoreError};
pub use files::FileService;
pub use groups::MembershipService;
pub use jwt::{Claims, JwtService, TokenKind, TokenPair};
pub use memory::{InMemoryBlobStore, InMemoryMetadataStore};
pub use repository::{FileRepository, GroupRepository, UserRepository};
pub use session::{AuthSession, SessionService};
pub use storage::{
    blob_stream, collect_blob, sized_blob, BlobStore, BlobStream, BodySize, S3Storage,
};
pub use users::UserService;
