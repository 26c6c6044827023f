mod common;

use common::{setup, setup_with, TEST_PASSWORD};
use fileshare_service::models::{ChangePasswordInput, RegisterUserInput};
use fileshare_service::services::{ErrorKind, ServiceError, TokenKind};
use fileshare_service::utils::Argon2Hasher;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_authenticate_returns_registered_identity() {
    let ctx = setup();
    let user = ctx.register("alice@example.com").await;

    let authenticated = ctx
        .services
        .users
        .authenticate("alice@example.com", TEST_PASSWORD)
        .await
        .unwrap();
    assert_eq!(authenticated.id, user.id);
    assert_ne!(authenticated.password_hash, TEST_PASSWORD);
}

#[tokio::test]
async fn test_wrong_password_is_invalid_password_not_user_not_found() {
    let ctx = setup();
    ctx.register("alice@example.com").await;

    for wrong in ["", "correct-horse-battery!", "CORRECT-HORSE-BATTERY"] {
        let err = ctx
            .services
            .users
            .authenticate("alice@example.com", wrong)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPassword), "{:?}", err);
    }

    let err = ctx
        .services
        .users
        .authenticate("nobody@example.com", TEST_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UserNotFound));
}

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let ctx = setup();
    ctx.register("alice@example.com").await;

    let cases = [
        ("", "longenough", "EmailRequired"),
        ("bob@example.com", "", "PasswordRequired"),
        ("bob@example.com", "1234567", "PasswordTooShort"),
        ("alice@example.com", "longenough", "EmailExists"),
    ];

    for (email, password, expected) in cases {
        let err = ctx
            .services
            .users
            .register(RegisterUserInput {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(format!("{:?}", err), expected);
    }

    let err = ctx
        .services
        .users
        .register(RegisterUserInput {
            email: "alice@example.com".to_string(),
            password: "longenough".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_login_embeds_current_groups_in_access_token() {
    let ctx = setup();
    let alice = ctx.register("alice@example.com").await;
    let group = ctx.create_group("team", &alice).await;

    let session = ctx
        .services
        .sessions
        .login("alice@example.com", TEST_PASSWORD)
        .await
        .unwrap();
    assert_eq!(session.user.id, alice.id);

    let claims = ctx.jwt.validate_access(&session.tokens.access_token).unwrap();
    assert_eq!(claims.user_id(), alice.id);
    assert_eq!(claims.email, "alice@example.com");
    assert_eq!(claims.group_ids(), &[group.id]);

    let refresh = ctx.jwt.validate_refresh(&session.tokens.refresh_token).unwrap();
    assert!(refresh.group_ids.is_none());
}

#[tokio::test]
async fn test_refresh_reissues_with_fresh_groups() {
    let ctx = setup();
    let session = ctx
        .services
        .sessions
        .register(RegisterUserInput {
            email: "alice@example.com".to_string(),
            password: TEST_PASSWORD.to_string(),
        })
        .await
        .unwrap();

    let initial = ctx.jwt.validate_access(&session.tokens.access_token).unwrap();
    assert!(initial.group_ids().is_empty());

    let alice = ctx.services.users.get_user(session.user.id).await.unwrap();
    let group = ctx.create_group("team", &alice).await;

    let refreshed = ctx
        .services
        .sessions
        .refresh(&session.tokens.refresh_token)
        .await
        .unwrap();
    let claims = ctx.jwt.validate_access(&refreshed.tokens.access_token).unwrap();
    assert_eq!(claims.group_ids(), &[group.id]);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let ctx = setup();
    ctx.register("alice@example.com").await;
    let session = ctx
        .services
        .sessions
        .login("alice@example.com", TEST_PASSWORD)
        .await
        .unwrap();

    let err = ctx
        .services
        .sessions
        .refresh(&session.tokens.access_token)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::TokenKindMismatch {
            expected: TokenKind::Refresh,
            found: TokenKind::Access
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn test_refresh_fails_for_deleted_user() {
    let ctx = setup();
    let alice = ctx.register("alice@example.com").await;
    let session = ctx
        .services
        .sessions
        .login("alice@example.com", TEST_PASSWORD)
        .await
        .unwrap();

    ctx.services.users.delete_user(alice.id).await.unwrap();

    let err = ctx
        .services
        .sessions
        .refresh(&session.tokens.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UserNotFound));
}

#[tokio::test]
async fn test_bearer_authentication() {
    let ctx = setup();
    let alice = ctx.register("alice@example.com").await;
    let session = ctx
        .services
        .sessions
        .login("alice@example.com", TEST_PASSWORD)
        .await
        .unwrap();

    let header = format!("bearer {}", session.tokens.access_token);
    let claims = ctx.services.sessions.authenticate_bearer(&header).unwrap();
    assert_eq!(claims.user_id(), alice.id);

    for header in ["", "Bearer", "Token abc", session.tokens.access_token.as_str()] {
        assert!(matches!(
            ctx.services.sessions.authenticate_bearer(header),
            Err(ServiceError::MissingCredentials)
        ));
    }

    let with_refresh = format!("Bearer {}", session.tokens.refresh_token);
    assert!(matches!(
        ctx.services.sessions.authenticate_bearer(&with_refresh),
        Err(ServiceError::TokenKindMismatch { .. })
    ));

    assert!(matches!(
        ctx.services.sessions.authenticate_bearer("Bearer not.a.token"),
        Err(ServiceError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_change_password() {
    let ctx = setup();
    let alice = ctx.register("alice@example.com").await;

    let err = ctx
        .services
        .users
        .change_password(
            alice.id,
            ChangePasswordInput {
                current_password: "not-the-password".to_string(),
                new_password: "a-brand-new-password".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidPassword));

    let err = ctx
        .services
        .users
        .change_password(
            alice.id,
            ChangePasswordInput {
                current_password: TEST_PASSWORD.to_string(),
                new_password: "short".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PasswordTooShort));

    let updated = ctx
        .services
        .users
        .change_password(
            alice.id,
            ChangePasswordInput {
                current_password: TEST_PASSWORD.to_string(),
                new_password: "a-brand-new-password".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(updated.updated_at >= alice.updated_at);

    assert!(matches!(
        ctx.services
            .users
            .authenticate("alice@example.com", TEST_PASSWORD)
            .await,
        Err(ServiceError::InvalidPassword)
    ));
    ctx.services
        .users
        .authenticate("alice@example.com", "a-brand-new-password")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_user_drops_memberships() {
    let ctx = setup();
    let alice = ctx.register("alice@example.com").await;
    let group = ctx.create_group("team", &alice).await;

    ctx.services.users.delete_user(alice.id).await.unwrap();

    assert!(!ctx
        .services
        .membership
        .is_member(group.id, alice.id)
        .await
        .unwrap());
    assert!(matches!(
        ctx.services.users.delete_user(alice.id).await,
        Err(ServiceError::UserNotFound)
    ));
}

#[tokio::test]
async fn test_argon2_register_and_login() {
    let ctx = setup_with(Arc::new(Argon2Hasher), Duration::from_secs(5));
    let alice = ctx.register("alice@example.com").await;
    assert!(alice.password_hash.starts_with("$argon2"));

    let session = ctx
        .services
        .sessions
        .login("alice@example.com", TEST_PASSWORD)
        .await
        .unwrap();
    assert_eq!(session.user.id, alice.id);

    assert!(matches!(
        ctx.services
            .sessions
            .login("alice@example.com", "wrong-password")
            .await,
        Err(ServiceError::InvalidPassword)
    ));
}
