//! Shared setup for fileshare-service integration tests.
//!
//! Builds the full service graph over the in-memory stores.

#![allow(dead_code)]

use chrono::Duration as ChronoDuration;
use fileshare_service::models::{CreateGroupInput, Group, RegisterUserInput, User};
use fileshare_service::services::{InMemoryBlobStore, InMemoryMetadataStore, JwtService};
use fileshare_service::utils::{CredentialHasher, Password};
use fileshare_service::AppServices;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_SECRET: &str = "integration-test-secret-with-32-plus-chars";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Reversible stand-in for argon2 so tests do not pay for key stretching.
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &Password) -> Result<String, anyhow::Error> {
        Ok(format!("plain${}", password.as_str()))
    }

    fn verify(&self, password: &Password, hash: &str) -> Result<bool, anyhow::Error> {
        let stored = hash
            .strip_prefix("plain$")
            .ok_or_else(|| anyhow::anyhow!("not a plain hash"))?;
        Ok(stored == password.as_str())
    }
}

pub struct TestContext {
    pub services: AppServices,
    pub metadata: Arc<InMemoryMetadataStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub jwt: JwtService,
}

pub fn test_jwt() -> JwtService {
    JwtService::new(
        &SecretString::new(TEST_SECRET.to_string()),
        ChronoDuration::minutes(15),
        ChronoDuration::days(7),
        "fileshare",
    )
}

pub fn setup() -> TestContext {
    setup_with(Arc::new(PlainHasher), Duration::from_secs(5))
}

pub fn setup_with(hasher: Arc<dyn CredentialHasher>, store_timeout: Duration) -> TestContext {
    service_core::observability::try_init_test_tracing();

    let metadata = Arc::new(InMemoryMetadataStore::new());
    let blobs = Arc::new(InMemoryBlobStore::new());
    let jwt = test_jwt();

    let services = AppServices::new(
        metadata.clone(),
        blobs.clone(),
        hasher,
        jwt.clone(),
        store_timeout,
    );

    TestContext {
        services,
        metadata,
        blobs,
        jwt,
    }
}

impl TestContext {
    pub async fn register(&self, email: &str) -> User {
        self.services
            .users
            .register(RegisterUserInput {
                email: email.to_string(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .expect("register test user")
    }

    pub async fn create_group(&self, name: &str, creator: &User) -> Group {
        self.services
            .membership
            .create_group(
                CreateGroupInput {
                    name: name.to_string(),
                },
                creator.id,
            )
            .await
            .expect("create test group")
    }
}
