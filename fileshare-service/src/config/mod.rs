use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Minimum accepted length of the token signing secret.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct FileshareConfig {
    pub common: core_config::Config,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    /// Upper bound for a single metadata or blob store call
    pub store_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub issuer: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub use_path_style: bool,
    pub multipart_threshold_bytes: i64,
    pub part_size_bytes: i64,
    pub presign_ttl_seconds: u64,
}

impl FileshareConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the service config from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars {
            lookup,
            is_prod: common.environment.is_prod(),
        };

        let endpoint = vars.optional("AWS_ENDPOINT");
        let use_path_style = endpoint.is_some() || vars.parse("S3_USE_PATH_STYLE", false)?;

        let config = FileshareConfig {
            database: DatabaseConfig {
                url: vars.required("DATABASE_URL")?,
                max_connections: vars.parse("DATABASE_MAX_CONNECTIONS", 25)?,
                min_connections: vars.parse("DATABASE_MIN_CONNECTIONS", 5)?,
            },
            jwt: JwtConfig {
                secret: SecretString::new(vars.required("JWT_SECRET")?),
                access_token_ttl_seconds: vars.parse("JWT_ACCESS_TOKEN_TTL_SECONDS", 900)?,
                refresh_token_ttl_seconds: vars.parse("JWT_REFRESH_TOKEN_TTL_SECONDS", 604_800)?,
                issuer: vars.get("JWT_ISSUER", Some("fileshare"))?,
            },
            storage: StorageConfig {
                bucket: vars.required("S3_BUCKET")?,
                region: vars.get("AWS_REGION", Some("us-east-1"))?,
                endpoint,
                access_key_id: vars.optional("AWS_ACCESS_KEY_ID"),
                secret_access_key: vars.optional("AWS_SECRET_ACCESS_KEY").map(SecretString::new),
                use_path_style,
                multipart_threshold_bytes: vars
                    .parse("S3_MULTIPART_THRESHOLD_BYTES", 5 * 1024 * 1024)?,
                part_size_bytes: vars.parse("S3_PART_SIZE_BYTES", 10 * 1024 * 1024)?,
                presign_ttl_seconds: vars.parse("S3_PRESIGN_TTL_SECONDS", 900)?,
            },
            store_timeout_seconds: vars.parse("STORE_OPERATION_TIMEOUT_SECONDS", 30)?,
            common,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.jwt.secret.expose_secret().chars().count() < MIN_JWT_SECRET_LENGTH {
            return Err(config_error(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_JWT_SECRET_LENGTH
            )));
        }
        if self.jwt.access_token_ttl_seconds <= 0 || self.jwt.refresh_token_ttl_seconds <= 0 {
            return Err(config_error("JWT token TTLs must be positive"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(config_error(
                "DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS",
            ));
        }
        // S3 rejects multipart parts below 5 MiB, except the last one.
        if self.storage.part_size_bytes < 5 * 1024 * 1024 {
            return Err(config_error("S3_PART_SIZE_BYTES must be at least 5 MiB"));
        }
        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            return Err(config_error(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together",
            ));
        }
        if self.store_timeout_seconds == 0 {
            return Err(config_error("STORE_OPERATION_TIMEOUT_SECONDS must be positive"));
        }
        Ok(())
    }
}

struct Vars<F> {
    lookup: F,
    is_prod: bool,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, AppError> {
        self.get(key, None)
    }

    fn get(&self, key: &str, default: Option<&str>) -> Result<String, AppError> {
        match self.optional(key) {
            Some(val) => Ok(val),
            None => {
                if self.is_prod && default.is_none() {
                    Err(config_error(format!(
                        "{} is required in production but not set",
                        key
                    )))
                } else if let Some(def) = default {
                    Ok(def.to_string())
                } else {
                    Err(config_error(format!("{} is required but not set", key)))
                }
            }
        }
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(val) => val
                .parse()
                .map_err(|e| config_error(format!("Invalid value for {}: {}", key, e))),
            None => Ok(default),
        }
    }
}

fn config_error(msg: impl Into<String>) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.into()))
}
