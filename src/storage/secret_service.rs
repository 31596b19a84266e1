// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretVec};
use serde::{Deserialize, Serialize};

use crate::{
    error::{self, Result},
    metadata,
};

use super::{IsPersistent, Storage};

/// An item in the desktop secret service, keyed by the API it authenticates
/// against.
pub(crate) struct SecretService {
    keyring: oo7::Keyring,
    attributes: HashMap<&'static str, String>,
}

impl SecretService {
    pub(crate) async fn new(api_url: &url::Url) -> Result<Self> {
        Ok(Self {
            keyring: oo7::Keyring::new().await.map_err(error::Storage::from)?,
            attributes: HashMap::from([
                ("radiant.kind", "credential".to_owned()),
                ("radiant.api", api_url.as_str().to_owned()),
            ]),
        })
    }

    fn attributes(&self) -> HashMap<&str, &str> {
        self.attributes
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect()
    }

    async fn item(&self) -> Result<Option<oo7::Item>> {
        Ok(self
            .keyring
            .search_items(self.attributes())
            .await
            .map_err(error::Storage::from)?
            .into_iter()
            .next())
    }
}

impl IsPersistent for SecretService {
    fn is_persistent(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: for<'de> Deserialize<'de> + Send + Serialize + Sync> Storage<T> for SecretService {
    async fn get(&mut self) -> Result<Option<T>> {
        match self.item().await? {
            Some(item) => {
                let secret = item.secret().await.map_err(error::Storage::from)?;
                Ok(Some(serde_json::from_slice(&secret)?))
            }
            None => Ok(None),
        }
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        let label = format!("{} credential", *metadata::CLIENT_DISPLAY_NAME);
        self.keyring
            .create_item(
                &label,
                self.attributes(),
                SecretVec::new(serde_json::to_vec(data)?).expose_secret(),
                true,
            )
            .await
            .map_err(error::Storage::from)?;
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        if let Some(item) = self.item().await? {
            item.delete().await.map_err(error::Storage::from)?;
        }
        Ok(())
    }
}
