// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{write_atomic, StoreError};

const CREDENTIAL_FILENAME: &str = "credentials.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    openai_api_key: Option<String>,
}

/// Persists the OpenAI credential as a single key/value entry under the
/// config directory.
///
/// The value is opaque: no format validation happens here, validity is
/// discovered on first use. The empty string is a valid stored value and
/// round-trips (it clears the credential in the controller).
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self { path: config_dir.into().join(CREDENTIAL_FILENAME) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored credential. A missing file is not an error.
    pub fn load(&self) -> Result<Option<String>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path: self.path.clone(), source }),
        };

        let file: CredentialFile = serde_json::from_str(&contents)
            .map_err(|source| StoreError::Json { path: self.path.clone(), source })?;
        Ok(file.openai_api_key)
    }

    pub fn save(&self, value: &str) -> Result<(), StoreError> {
        let file = CredentialFile { openai_api_key: Some(value.to_owned()) };
        let contents = serde_json::to_string_pretty(&file)
            .map_err(|source| StoreError::Json { path: self.path.clone(), source })?;
        write_atomic(&self.path, format!("{contents}\n").as_bytes())
    }
}
