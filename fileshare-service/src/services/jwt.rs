use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::services::ServiceError;

/// Distinguishes short-lived access tokens from long-lived refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Signed token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub email: String,
    /// Group memberships at issue time; access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_ids: Option<Vec<Uuid>>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    pub fn group_ids(&self) -> &[Uuid] {
        self.group_ids.as_deref().unwrap_or_default()
    }
}

/// Token pair returned to the client on register, login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
}

/// HMAC-signed token issue and validation.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    issuer: String,
}

impl JwtService {
    pub fn new(
        secret: &SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
        issuer: impl Into<String>,
    ) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
            issuer: issuer.into(),
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        let service = Self::new(
            &config.secret,
            Duration::seconds(config.access_token_ttl_seconds),
            Duration::seconds(config.refresh_token_ttl_seconds),
            config.issuer.clone(),
        );
        tracing::info!(issuer = %config.issuer, "JWT service initialized with HS256 secret");
        service
    }

    /// Issue an access token carrying `group_ids` and a refresh token without them.
    pub fn issue_pair(
        &self,
        user_id: Uuid,
        email: &str,
        group_ids: Vec<Uuid>,
    ) -> Result<TokenPair, ServiceError> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;

        let access_token = self.sign(Claims {
            sub: user_id,
            email: email.to_string(),
            group_ids: Some(group_ids),
            kind: TokenKind::Access,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: access_expires_at.timestamp(),
        })?;

        let refresh_token = self.sign(Claims {
            sub: user_id,
            email: email.to_string(),
            group_ids: None,
            kind: TokenKind::Refresh,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
        })
    }

    /// Validate signature, issuer, expiry and kind, in that order.
    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is checked below against the full timestamp with no leeway.
        validation.validate_exp = false;
        validation.validate_nbf = true;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                ServiceError::InvalidToken
            })?
            .claims;

        if Utc::now().timestamp() >= claims.exp {
            return Err(ServiceError::ExpiredToken);
        }

        if claims.kind != expected {
            return Err(ServiceError::TokenKindMismatch {
                expected,
                found: claims.kind,
            });
        }

        Ok(claims)
    }

    pub fn validate_access(&self, token: &str) -> Result<Claims, ServiceError> {
        self.validate(token, TokenKind::Access)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<Claims, ServiceError> {
        self.validate(token, TokenKind::Refresh)
    }

    fn sign(&self, claims: Claims) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }
}
