//! service-core: Shared infrastructure for the fileshare workspace.
pub mod config;
pub mod error;
pub mod observability;

pub use axum;
pub use serde;
pub use serde_json;
pub use tracing;
