pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use crate::services::{
    BlobStore, FileRepository, FileService, GroupRepository, JwtService, MembershipService,
    SessionService, UserRepository, UserService,
};
use crate::utils::CredentialHasher;

/// The service graph handed to the transport layer.
#[derive(Clone)]
pub struct AppServices {
    pub users: UserService,
    pub membership: MembershipService,
    pub files: FileService,
    pub sessions: SessionService,
}

impl AppServices {
    /// Wire services over one metadata store and one blob store.
    pub fn new<M>(
        metadata: Arc<M>,
        blobs: Arc<dyn BlobStore>,
        hasher: Arc<dyn CredentialHasher>,
        jwt: JwtService,
        store_timeout: Duration,
    ) -> Self
    where
        M: UserRepository + GroupRepository + FileRepository + 'static,
    {
        let users = UserService::new(metadata.clone(), hasher);
        let membership = MembershipService::new(metadata.clone(), metadata.clone());
        let files = FileService::new(metadata, blobs, membership.clone(), store_timeout);
        let sessions = SessionService::new(users.clone(), membership.clone(), jwt);

        Self {
            users,
            membership,
            files,
            sessions,
        }
    }
}
