// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! Authentication flows. These are the only writers of the credential.

use log::{debug, info, warn};
use reqwest::Method;
use secrecy::{ExposeSecret as _, SecretString};

use super::{
    decode,
    endpoint::{Me, Register},
    model::{Registration, TokenResponse, User},
    transport::Body,
    Gateway,
};
use crate::error::Result;

const TOKEN_PATH: &[&str] = &["api", "auth", "token"];

/// Exchanges a username and password for a bearer token and stores it.
///
/// The token is in the credential store by the time this returns, so the
/// next call made through `gateway` is already authenticated.
pub(crate) async fn login(
    gateway: &Gateway,
    username: &str,
    password: &SecretString,
) -> Result<TokenResponse> {
    let form = Body::Form(vec![
        ("username".to_owned(), username.to_owned()),
        ("password".to_owned(), password.expose_secret().clone()),
    ]);
    let resp = gateway
        .send(Method::POST, TOKEN_PATH, &[], form, "Login failed")
        .await?;
    let token: TokenResponse = decode(TOKEN_PATH, &resp.body)?;

    let credentials = gateway.credentials();
    let previous = credentials.get().await;
    if let Err(e) = credentials.set(Some(token.access_token.clone())).await {
        warn!("Discarding the token for {} because it could not be stored", username);
        _ = credentials.set(previous).await;
        return Err(e);
    }
    info!("Obtained a {} token for {}", token.token_type, username);
    Ok(token)
}

pub(crate) async fn me(gateway: &Gateway) -> Result<User> {
    gateway.execute(Me).await
}

pub(crate) async fn register(gateway: &Gateway, registration: &Registration) -> Result<User> {
    gateway.execute(Register(registration)).await
}

pub(crate) async fn logout(gateway: &Gateway) -> Result<()> {
    debug!("Discarding the stored credential");
    gateway.credentials().set(None).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        error::ErrorClass,
        gateway::{model::fixtures, testing, transport::Body},
    };

    #[tokio::test]
    async fn login_posts_a_form_and_stores_the_token() {
        let (gateway, server) = testing::signed_out().await;
        server.reply(Method::POST, "/api/auth/token", 200, json!({ "access_token": "abc" }));
        server.reply(Method::GET, "/api/auth/me", 200, fixtures::user("doctor1"));

        let token = login(&gateway, "doctor1", &SecretString::new("test123".to_owned()))
            .await
            .expect("login succeeds");
        assert_eq!(token.token_type, "bearer");

        let user = me(&gateway).await.expect("profile");
        assert_eq!(user.username, "doctor1");

        let seen = server.requests();
        match seen[0].body {
            Body::Form(ref pairs) => assert_eq!(
                *pairs,
                [
                    ("username".to_owned(), "doctor1".to_owned()),
                    ("password".to_owned(), "test123".to_owned()),
                ]
            ),
            ref other => panic!("expected a form, got {other:?}"),
        }
        assert_eq!(seen[0].bearer, None);
        assert_eq!(seen[1].bearer.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn failed_login_keeps_the_previous_credential() {
        let (gateway, server) = testing::signed_in("old").await;
        server.reply_raw(Method::POST, "/api/auth/token", 401, b"");

        let err = login(&gateway, "doctor1", &SecretString::new("wrong".to_owned()))
            .await
            .expect_err("rejected");
        assert_eq!(err.class(), ErrorClass::Auth);
        assert!(err.to_string().ends_with("Login failed"));
        assert_eq!(
            gateway
                .credentials()
                .get()
                .await
                .map(|t| t.expose_secret().clone())
                .as_deref(),
            Some("old")
        );
    }

    #[tokio::test]
    async fn unstored_tokens_are_not_kept() {
        let (gateway, server) = testing::read_only(None).await;
        server.reply(Method::POST, "/api/auth/token", 200, json!({ "access_token": "abc" }));

        let err = login(&gateway, "doctor1", &SecretString::new("test123".to_owned()))
            .await
            .expect_err("storage refused the token");
        assert_eq!(err.class(), ErrorClass::Local);
        assert!(!gateway.credentials().is_present().await);
    }

    #[tokio::test]
    async fn unstored_tokens_leave_the_previous_one_in_place() {
        let (gateway, server) = testing::read_only(Some("old")).await;
        server.reply(Method::POST, "/api/auth/token", 200, json!({ "access_token": "new" }));

        _ = login(&gateway, "doctor1", &SecretString::new("test123".to_owned()))
            .await
            .expect_err("storage refused the token");
        assert_eq!(
            gateway
                .credentials()
                .get()
                .await
                .map(|t| t.expose_secret().clone())
                .as_deref(),
            Some("old")
        );
    }

    #[tokio::test]
    async fn logout_clears_the_credential() {
        let (gateway, _server) = testing::signed_in("abc").await;

        logout(&gateway).await.expect("cleared");
        assert!(!gateway.credentials().is_present().await);
    }
}
