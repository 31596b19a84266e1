// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt as _};

use crate::{error::Result, metadata};

use super::{IsPersistent, Storage};

/// A JSON document in the per-user data directory.
pub(crate) struct File {
    path: PathBuf,
}

impl File {
    pub(crate) fn new<P: AsRef<Path>>(file: P) -> Option<Self> {
        metadata::PROJECT_DIRS
            .as_ref()
            .map(|dirs| Self::at(dirs.data_dir().join(file)))
    }

    pub(crate) fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl IsPersistent for File {
    fn is_persistent(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: Send + Serialize + Sync + for<'de> Deserialize<'de>> Storage<T> for File {
    async fn get(&mut self) -> Result<Option<T>> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&mut self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut options = fs::OpenOptions::new();
        _ = options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            _ = options.mode(0o600);
        }

        let mut file = options.open(&self.path).await?;
        file.write_all(&serde_json::to_vec(data)?).await?;
        file.flush().await?;
        debug!("Wrote {}", self.path.display());
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Slot {
        value: String,
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let mut storage = File::at(dir.path().join("slot.json"));

        let data: Option<Slot> = storage.get().await.expect("read succeeds");
        assert_eq!(data, None);
    }

    #[tokio::test]
    async fn update_then_clear() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let path = dir.path().join("nested").join("slot.json");
        let mut storage = File::at(&path);

        storage
            .update(&Slot {
                value: "abc".to_owned(),
            })
            .await
            .expect("write succeeds");
        assert!(path.exists());

        let mut reopened = File::at(&path);
        let data: Option<Slot> = reopened.get().await.expect("read succeeds");
        assert_eq!(data.map(|slot| slot.value).as_deref(), Some("abc"));

        Storage::<Slot>::clear(&mut reopened)
            .await
            .expect("clear succeeds");
        assert!(!path.exists());

        // Clearing an already empty slot is not an error.
        Storage::<Slot>::clear(&mut reopened)
            .await
            .expect("second clear succeeds");
    }
}
