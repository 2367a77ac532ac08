//! Account creation.

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::{json, Map, Value};
use tracing::info;

use super::args::Args;
use super::{require_permission, DomainError, DomainResult, ToolHandler};
use crate::auth::Principal;
use crate::platform::{NewAccount, Platform};
use crate::sanitize::{sanitize_email, sanitize_text, sanitize_user};

const GENERATED_PASSWORD_LEN: usize = 20;

const PASSWORD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_[]{}<>~`+=,.;:/?|";

/// Random password drawn from letters, digits and punctuation.
pub fn generate_password(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .filter_map(|_| PASSWORD_CHARS.choose(&mut rng).map(|&b| b as char))
        .collect()
}

pub struct CreateUser {
    platform: Arc<Platform>,
}

impl CreateUser {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for CreateUser {
    async fn call(&self, args: &Map<String, Value>, principal: &Principal) -> DomainResult {
        require_permission(principal, "create_users")?;
        let args = Args::new(args);
        let identity = &self.platform.identity;

        let username = args
            .verbatim("username")
            .map(|u| sanitize_user(&u))
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DomainError::required("username"))?;
        let email = args
            .verbatim("email")
            .and_then(|e| sanitize_email(&e))
            .ok_or_else(|| DomainError::required("email"))?;
        if identity.username_exists(&username).await? {
            return Err(DomainError::new("username_exists"));
        }
        if identity.email_exists(&email).await? {
            return Err(DomainError::new("email_exists"));
        }

        let role = args.text("role").unwrap_or_else(|| "subscriber".into());
        if !identity.role_exists(&role).await? {
            return Err(DomainError::invalid_argument());
        }
        let display_name = args
            .verbatim("display_name")
            .map(|d| sanitize_text(&d))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| username.clone());
        let password = args
            .verbatim("password")
            .unwrap_or_else(|| generate_password(GENERATED_PASSWORD_LEN));

        let account = identity
            .create_account(NewAccount {
                username,
                email,
                password,
                display_name,
                role,
            })
            .await?;
        info!(id = account.id, username = %account.username, created_by = principal.user_id, "Account created");

        Ok(json!({
            "id": account.id,
            "username": account.username,
            "email": account.email,
            "roles": account.roles,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;

    #[test]
    fn test_generate_password() {
        let a = generate_password(GENERATED_PASSWORD_LEN);
        let b = generate_password(GENERATED_PASSWORD_LEN);
        assert_eq!(a.chars().count(), GENERATED_PASSWORD_LEN);
        assert!(a.bytes().all(|c| PASSWORD_CHARS.contains(&c)));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_create_user_defaults() {
        let site = site();
        let handler = CreateUser::new(Arc::new(site.platform()));
        let out = handler
            .call(
                &args(json!({"username": " jo<b>e</b> ", "email": " joe@example.com "})),
                &principal(&["administrator"]),
            )
            .await
            .unwrap();
        assert_eq!(out["username"], "joe");
        assert_eq!(out["email"], "joe@example.com");
        assert_eq!(out["roles"], json!(["subscriber"]));
        assert_eq!(site.account_count(), 1);
    }

    #[tokio::test]
    async fn test_create_user_with_role() {
        let site = site();
        let handler = CreateUser::new(Arc::new(site.platform()));
        let out = handler
            .call(
                &args(json!({
                    "username": "ed",
                    "email": "ed@example.com",
                    "role": "editor",
                    "password": "s3cret!",
                    "display_name": "Ed"
                })),
                &principal(&["administrator"]),
            )
            .await
            .unwrap();
        assert_eq!(out["roles"], json!(["editor"]));
    }

    #[tokio::test]
    async fn test_create_user_errors() {
        let site = site();
        site.add_user("taken", "pw", "taken@example.com", &["subscriber"]);
        let handler = CreateUser::new(Arc::new(site.platform()));
        let admin = principal(&["administrator"]);

        let err = handler
            .call(
                &args(json!({"username": "new", "email": "new@example.com"})),
                &principal(&["editor"]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "insufficient_capability");

        let cases = [
            (json!({"email": "a@example.com"}), "username required"),
            (json!({"username": "<>", "email": "a@example.com"}), "username required"),
            (json!({"username": "new"}), "email required"),
            (json!({"username": "new", "email": "not-an-email"}), "email required"),
            (json!({"username": "taken", "email": "a@example.com"}), "username_exists"),
            (json!({"username": "new", "email": "TAKEN@example.com"}), "email_exists"),
            (
                json!({"username": "new", "email": "a@example.com", "role": "overlord"}),
                "invalid_argument",
            ),
        ];
        for (input, code) in cases {
            let err = handler.call(&args(input), &admin).await.unwrap_err();
            assert_eq!(err.code(), code);
        }
        assert_eq!(site.account_count(), 1);
    }
}
