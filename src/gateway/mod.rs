// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! The single path by which requests reach the backend.
//!
//! Every call is built here: the base URL is joined with the endpoint path,
//! the current credential is attached as a bearer token, and any non-success
//! status is turned into an [`Api`] error carrying the backend's own message.

pub(crate) mod auth;
pub(crate) mod credential;
pub(crate) mod endpoint;
pub(crate) mod model;
pub(crate) mod transfer;
pub(crate) mod transport;

use std::sync::Arc;

use log::debug;
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize};
use url::{ParseError, Url};

use crate::error::{Api, Result};

pub(crate) use self::{credential::CredentialStore, endpoint::Endpoint};
use self::transport::{Body, Request, Response, Transport};

pub(crate) const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Deserialize)]
struct ErrorBody {
    detail: Detail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Detail {
    Message(String),
    Items(Vec<DetailItem>),
}

#[derive(Deserialize)]
struct DetailItem {
    msg: String,
}

impl ErrorBody {
    fn parse(body: &[u8]) -> Option<String> {
        let message = match serde_json::from_slice::<Self>(body).ok()?.detail {
            Detail::Message(message) => message,
            Detail::Items(items) => items
                .into_iter()
                .map(|item| item.msg)
                .collect::<Vec<_>>()
                .join("; "),
        };

        (!message.is_empty()).then_some(message)
    }
}

struct Inner {
    base: Url,
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
}

#[derive(Clone)]
pub(crate) struct Gateway {
    inner: Arc<Inner>,
}

impl Gateway {
    pub(crate) fn new(base: Url, transport: Arc<dyn Transport>, credentials: CredentialStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                base,
                transport,
                credentials,
            }),
        }
    }

    pub(crate) fn base(&self) -> &Url {
        &self.inner.base
    }

    /// Read access to the credential. Writes are reserved for [`auth`].
    pub(crate) fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    /// Appends `path` to the base URL, percent-encoding each segment.
    fn url(&self, path: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.inner.base.clone();
        _ = url
            .path_segments_mut()
            .map_err(|()| ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(path);
        if !query.is_empty() {
            _ = url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Issues one call and returns the raw response if its status indicates
    /// success. Otherwise the error body's `detail` becomes the message, or
    /// `fallback` if there is none.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &[&str],
        query: &[(&str, String)],
        body: Body,
        fallback: &str,
    ) -> Result<Response> {
        let url = self.url(path, query)?;
        let route = url.path().to_owned();
        let bearer = self.inner.credentials.get().await;
        debug!(
            "{} {} (credential attached: {})",
            method,
            route,
            bearer.is_some()
        );

        let resp = self
            .inner
            .transport
            .send(Request {
                method,
                url,
                bearer,
                body,
            })
            .await?;
        if resp.status.is_success() {
            return Ok(resp);
        }

        let message = ErrorBody::parse(&resp.body).unwrap_or_else(|| fallback.to_owned());
        debug!("Request to {} failed with {}: {}", route, resp.status, message);
        Err(Api::from_status(resp.status, message).into())
    }

    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &[&str],
        query: &[(&str, String)],
        body: Body,
    ) -> Result<T> {
        let resp = self.send(method, path, query, body, UNKNOWN_ERROR).await?;
        decode(path, &resp.body)
    }

    pub(crate) async fn execute<E: Endpoint>(&self, endpoint: E) -> Result<E::Response> {
        let path = endpoint.path();
        let query = endpoint.query();
        let body = endpoint.body()?;
        self.request(endpoint.method(), &path, &query, body).await
    }
}

/// Decodes a success body. An empty body reads as JSON `null`.
pub(crate) fn decode<T: DeserializeOwned>(path: &[&str], body: &[u8]) -> Result<T> {
    let result = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(b"null")
    } else {
        serde_json::from_slice(body)
    };

    result.map_err(|source| {
        Api::UnexpectedShape {
            path: format!("/{}", path.join("/")),
            source,
        }
        .into()
    })
}


#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::error::{Error, ErrorClass};

    fn api_error(err: Error) -> Api {
        match err {
            Error::Api(api) => api,
            other => panic!("expected an API error, got {other}"),
        }
    }

    #[tokio::test]
    async fn attaches_the_bearer_only_when_present() {
        for (gateway, server, expected) in [
            {
                let (gateway, server) = testing::signed_out().await;
                (gateway, server, None)
            },
            {
                let (gateway, server) = testing::signed_in("abc").await;
                (gateway, server, Some("abc"))
            },
        ] {
            server.reply(Method::GET, "/health", 200, model::fixtures::health());
            let _: model::Health = gateway
                .request(Method::GET, &["health"], &[], Body::Empty)
                .await
                .expect("health");

            assert_eq!(server.requests()[0].bearer.as_deref(), expected);
        }
    }

    #[tokio::test]
    async fn joins_paths_and_query_onto_the_base() {
        let server = transport::testing::Scripted::new();
        let gateway = Gateway::new(
            Url::parse("http://radiant.test/").expect("valid URL"),
            server.clone(),
            credential::testing::empty().await,
        );
        server.reply(Method::GET, "/api/patients", 200, json!([]));

        let _: Vec<model::Patient> = gateway
            .request(
                Method::GET,
                &["api", "patients"],
                &[("search", "o'brien & co".to_owned())],
                Body::Empty,
            )
            .await
            .expect("listing");

        let seen = server.requests();
        assert_eq!(
            seen[0].url.as_str(),
            "http://radiant.test/api/patients?search=o%27brien+%26+co"
        );
    }

    #[tokio::test]
    async fn identifiers_stay_within_their_segment() {
        let server = transport::testing::Scripted::new();
        let gateway = Gateway::new(
            Url::parse("http://radiant.test/backend").expect("valid URL"),
            server.clone(),
            credential::testing::empty().await,
        );

        _ = gateway
            .execute(endpoint::GetPatient("p/1?admin=1#top"))
            .await
            .expect_err("no such route");

        let seen = server.requests();
        assert_eq!(
            seen[0].url.as_str(),
            "http://radiant.test/backend/api/patients/p%2F1%3Fadmin=1%23top"
        );
        assert_eq!(seen[0].url.query(), None);
    }

    #[tokio::test]
    async fn surfaces_the_backend_detail() {
        let (gateway, server) = testing::signed_in("abc").await;
        server.reply(
            Method::GET,
            "/api/patients/p-9",
            404,
            json!({ "detail": "Patient not found" }),
        );

        let err = api_error(
            gateway
                .request::<model::Patient>(Method::GET, &["api", "patients", "p-9"], &[], Body::Empty)
                .await
                .expect_err("missing patient"),
        );
        assert_eq!(err.class(), ErrorClass::Validation);
        assert!(matches!(
            err,
            Api::Validation {
                status: StatusCode::NOT_FOUND,
                ..
            }
        ));
        assert!(err.to_string().contains("Patient not found"));
    }

    #[tokio::test]
    async fn flattens_field_errors() {
        let (gateway, server) = testing::signed_in("abc").await;
        server.reply(
            Method::POST,
            "/api/patients",
            422,
            json!({ "detail": [
                { "loc": ["body", "first_name"], "msg": "field required", "type": "missing" },
                { "loc": ["body", "date_of_birth"], "msg": "invalid date", "type": "value_error" },
            ]}),
        );

        let err = api_error(
            gateway
                .request::<model::Patient>(Method::POST, &["api", "patients"], &[], Body::Empty)
                .await
                .expect_err("rejected"),
        );
        assert!(err.to_string().ends_with("field required; invalid date"));
    }

    #[tokio::test]
    async fn falls_back_when_the_error_body_is_unreadable() {
        let (gateway, server) = testing::signed_in("abc").await;
        server.reply_raw(Method::GET, "/api/config", 502, b"<html>Bad Gateway</html>");

        let err = api_error(
            gateway
                .request::<model::Config>(Method::GET, &["api", "config"], &[], Body::Empty)
                .await
                .expect_err("bad gateway"),
        );
        assert_eq!(err.class(), ErrorClass::Server);
        assert!(err.to_string().ends_with(UNKNOWN_ERROR));
    }

    #[tokio::test]
    async fn maps_unauthorized_to_auth() {
        let (gateway, server) = testing::signed_in("expired").await;
        server.reply(
            Method::GET,
            "/api/auth/me",
            401,
            json!({ "detail": "Could not validate credentials" }),
        );

        let err = gateway
            .request::<model::User>(Method::GET, &["api", "auth", "me"], &[], Body::Empty)
            .await
            .expect_err("unauthorized");
        assert_eq!(err.class(), ErrorClass::Auth);
    }

    #[tokio::test]
    async fn rejects_unexpected_shapes() {
        let (gateway, server) = testing::signed_in("abc").await;
        server.reply(Method::GET, "/api/auth/me", 200, json!({ "name": "doctor1" }));

        let err = api_error(
            gateway
                .request::<model::User>(Method::GET, &["api", "auth", "me"], &[], Body::Empty)
                .await
                .expect_err("wrong shape"),
        );
        assert!(matches!(err, Api::UnexpectedShape { ref path, .. } if path == "/api/auth/me"));
    }

    #[tokio::test]
    async fn network_failures_are_not_api_errors() {
        let (gateway, server) = testing::signed_in("abc").await;
        server.unreachable(Method::GET, "/health");

        let err = gateway
            .request::<model::Health>(Method::GET, &["health"], &[], Body::Empty)
            .await
            .expect_err("unreachable");
        assert_eq!(err.class(), ErrorClass::Network);
    }

    #[test]
    fn empty_bodies_decode_as_null() {
        decode::<()>(&["api", "patients", "p-1"], b"").expect("unit from empty body");
        decode::<Option<model::Patient>>(&["api", "patients", "p-1"], b"  \n").expect("none");
        assert!(decode::<model::Patient>(&["api", "patients", "p-1"], b"").is_err());
    }
}
