// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    multipart, Method, StatusCode,
};
use secrecy::{ExposeSecret as _, SecretString};
use url::Url;

use crate::{error::Result, metadata};

#[derive(Clone, Debug)]
pub(crate) enum Body {
    Empty,
    Json(Vec<u8>),
    Form(Vec<(String, String)>),
    Multipart(Vec<Field>),
}

#[derive(Clone, Debug)]
pub(crate) enum Field {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content: Vec<u8>,
    },
}

#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) bearer: Option<SecretString>,
    pub(crate) body: Body,
}

#[derive(Debug)]
pub(crate) struct Response {
    pub(crate) status: StatusCode,
    pub(crate) body: Vec<u8>,
}

/// Moves one request over the wire. Implementations report a transport
/// failure only when no response was received; any HTTP status, including
/// errors, is a successful exchange at this level.
#[async_trait]
pub(crate) trait Transport: Send + Sync {
    async fn send(&self, req: Request) -> Result<Response>;
}

pub(crate) struct Http {
    client: reqwest::Client,
}

impl Http {
    pub(crate) fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        _ = headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent(metadata::USER_AGENT.as_str())
                .default_headers(headers)
                .timeout(timeout)
                .build()?,
        })
    }
}

#[async_trait]
impl Transport for Http {
    async fn send(&self, req: Request) -> Result<Response> {
        let mut builder = self.client.request(req.method, req.url);
        if let Some(ref token) = req.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }

        builder = match req.body {
            Body::Empty => builder,
            Body::Json(data) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(data),
            Body::Form(pairs) => builder.form(&pairs),
            Body::Multipart(fields) => {
                let form = fields
                    .into_iter()
                    .fold(multipart::Form::new(), |form, field| match field {
                        Field::Text { name, value } => form.text(name, value),
                        Field::File {
                            name,
                            file_name,
                            content,
                        } => form.part(name, multipart::Part::bytes(content).file_name(file_name)),
                    });
                builder.multipart(form)
            }
        };

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?.to_vec();
        Ok(Response { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::{HashMap, VecDeque},
        io,
        sync::{Arc, Mutex},
    };

    use tokio::sync::Semaphore;

    use super::*;
    use crate::error::Error;

    /// What the fake server saw.
    #[derive(Clone, Debug)]
    pub(crate) struct Recorded {
        pub(crate) method: Method,
        pub(crate) url: Url,
        pub(crate) bearer: Option<String>,
        pub(crate) body: Body,
    }

    impl Recorded {
        pub(crate) fn json(&self) -> serde_json::Value {
            match self.body {
                Body::Json(ref data) => serde_json::from_slice(data).expect("JSON body"),
                ref other => panic!("expected a JSON body, got {other:?}"),
            }
        }
    }

    enum Reply {
        Status(StatusCode, Vec<u8>),
        Unreachable,
    }

    impl Reply {
        fn to_result(&self) -> Result<Response> {
            match *self {
                Self::Status(status, ref body) => Ok(Response {
                    status,
                    body: body.clone(),
                }),
                Self::Unreachable => Err(Error::Network(Box::new(io::Error::from(
                    io::ErrorKind::ConnectionRefused,
                )))),
            }
        }
    }

    /// A transport that replays canned replies per route and records every
    /// request. The last reply queued for a route is repeated indefinitely.
    #[derive(Default)]
    pub(crate) struct Scripted {
        routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
        seen: Mutex<Vec<Recorded>>,
        gate: Mutex<Option<Arc<Semaphore>>>,
    }

    impl Scripted {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn push(&self, method: Method, path: &str, reply: Reply) {
            self.routes
                .lock()
                .expect("routes lock")
                .entry((method, path.to_owned()))
                .or_default()
                .push_back(reply);
        }

        pub(crate) fn reply(&self, method: Method, path: &str, status: u16, body: serde_json::Value) {
            self.push(
                method,
                path,
                Reply::Status(
                    StatusCode::from_u16(status).expect("valid status"),
                    serde_json::to_vec(&body).expect("serializable body"),
                ),
            );
        }

        pub(crate) fn reply_raw(&self, method: Method, path: &str, status: u16, body: &[u8]) {
            self.push(
                method,
                path,
                Reply::Status(StatusCode::from_u16(status).expect("valid status"), body.to_vec()),
            );
        }

        pub(crate) fn unreachable(&self, method: Method, path: &str) {
            self.push(method, path, Reply::Unreachable);
        }

        /// Holds every subsequent request until `release` is called.
        pub(crate) fn hold(&self) {
            *self.gate.lock().expect("gate lock") = Some(Arc::new(Semaphore::new(0)));
        }

        pub(crate) fn release(&self, count: usize) {
            if let Some(ref gate) = *self.gate.lock().expect("gate lock") {
                gate.add_permits(count);
            }
        }

        pub(crate) fn requests(&self) -> Vec<Recorded> {
            self.seen.lock().expect("seen lock").clone()
        }

        pub(crate) fn count(&self, path: &str) -> usize {
            self.seen
                .lock()
                .expect("seen lock")
                .iter()
                .filter(|req| req.url.path() == path)
                .count()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, req: Request) -> Result<Response> {
            let key = (req.method.clone(), req.url.path().to_owned());
            self.seen.lock().expect("seen lock").push(Recorded {
                method: req.method,
                url: req.url,
                bearer: req.bearer.map(|token| token.expose_secret().clone()),
                body: req.body,
            });

            let gate = self.gate.lock().expect("gate lock").clone();
            if let Some(gate) = gate {
                gate.acquire().await.expect("gate open").forget();
            }

            let mut routes = self.routes.lock().expect("routes lock");
            match routes.get_mut(&key) {
                Some(replies) if replies.len() > 1 => {
                    replies.pop_front().expect("queued reply").to_result()
                }
                Some(replies) if !replies.is_empty() => replies[0].to_result(),
                _ => Ok(Response {
                    status: StatusCode::NOT_FOUND,
                    body: br#"{"detail":"Not Found"}"#.to_vec(),
                }),
            }
        }
    }
}
