// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use futures_util::lock::Mutex;
use log::{debug, warn};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use tokio::sync::RwLock;

use crate::{
    error::Result,
    storage::{self, IsPersistent as _, Storage as _},
};

/// The persisted form of the bearer credential.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Credential {
    #[serde(serialize_with = "expose")]
    access_token: SecretString,
}

impl Credential {
    pub(crate) fn new(access_token: SecretString) -> Self {
        Self { access_token }
    }
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

pub(crate) type CredentialStorage = Box<dyn storage::Storage<Credential>>;

/// Holds the one live bearer token for the process.
///
/// Anyone holding a store may read the token, but only the gateway's
/// authentication flows can replace or clear it. Every write goes through to
/// the backing storage so that a restarted process resumes the same session.
#[derive(Clone)]
pub(crate) struct CredentialStore {
    current: Arc<RwLock<Option<SecretString>>>,
    storage: Arc<Mutex<CredentialStorage>>,
}

impl CredentialStore {
    pub(crate) async fn open(mut storage: CredentialStorage) -> Result<Self> {
        let current = storage.get().await?.map(|credential| credential.access_token);
        debug!(
            "Opened credential store (persistent: {}, credential present: {})",
            storage.is_persistent(),
            current.is_some()
        );

        Ok(Self {
            current: Arc::new(RwLock::new(current)),
            storage: Arc::new(Mutex::new(storage)),
        })
    }

    pub(crate) async fn get(&self) -> Option<SecretString> {
        self.current.read().await.clone()
    }

    pub(crate) async fn is_present(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub(crate) async fn is_persistent(&self) -> bool {
        self.storage.lock().await.is_persistent()
    }

    /// Replaces the token. The in-memory value always changes, even if the
    /// backing storage then fails, so clearing can never leave a live token
    /// behind in this process. Callers storing a new token undo it themselves
    /// when this fails.
    pub(super) async fn set(&self, token: Option<SecretString>) -> Result<()> {
        let mut storage = self.storage.lock().await;
        *self.current.write().await = token.clone();

        let result = match token {
            Some(token) => storage.update(&Credential::new(token)).await,
            None => storage.clear().await,
        };
        if let Err(ref e) = result {
            warn!("Could not persist credential change: {}", e);
        }
        result
    }
}
