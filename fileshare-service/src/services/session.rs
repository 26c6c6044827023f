use serde::Serialize;
use uuid::Uuid;

use crate::models::{RegisterUserInput, User, UserResponse};
use crate::services::error::ServiceError;
use crate::services::groups::MembershipService;
use crate::services::jwt::{Claims, JwtService, TokenPair};
use crate::services::users::UserService;

/// Identity plus a fresh token pair.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Session lifecycle: register, login, refresh and bearer authentication.
#[derive(Clone)]
pub struct SessionService {
    users: UserService,
    membership: MembershipService,
    jwt: JwtService,
}

impl SessionService {
    pub fn new(users: UserService, membership: MembershipService, jwt: JwtService) -> Self {
        Self {
            users,
            membership,
            jwt,
        }
    }

    pub async fn register(&self, input: RegisterUserInput) -> Result<AuthSession, ServiceError> {
        let user = self.users.register(input).await?;
        self.issue(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let user = self.users.authenticate(email, password).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        self.issue(user).await
    }

    /// Exchange a refresh token for a new pair. The identity is reloaded so a
    /// deleted user cannot refresh, and group ids reflect current membership.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, ServiceError> {
        let claims = self.jwt.validate_refresh(refresh_token)?;
        let user = self.users.get_user(claims.user_id()).await?;
        self.issue(user).await
    }

    /// Validate an `Authorization: Bearer <access token>` header value.
    pub fn authenticate_bearer(&self, authorization: &str) -> Result<Claims, ServiceError> {
        let token = bearer_token(authorization).ok_or(ServiceError::MissingCredentials)?;
        self.jwt.validate_access(token)
    }

    async fn issue(&self, user: User) -> Result<AuthSession, ServiceError> {
        let group_ids: Vec<Uuid> = self.membership.group_ids_for_user(user.id).await?;
        let tokens = self.jwt.issue_pair(user.id, &user.email, group_ids)?;
        Ok(AuthSession {
            user: user.into(),
            tokens,
        })
    }
}

/// Token part of a `Bearer` credential; the scheme is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}
