// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Durable local storage.
//!
//! Two small stores live here: the credential file (one key/value entry,
//! read once at startup, written only on explicit Save) and the insert-only
//! diagram library. Both write atomically (temp file, then rename).

mod credential;
mod library;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub use credential::CredentialStore;
pub use library::{DiagramLibrary, DiagramRecord, NewDiagram};

#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: io::Error },
    Json { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Json { path, source } => write!(f, "json error at {path:?}: {source}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("path has no parent"),
        });
    };
    fs::create_dir_all(parent)
        .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;

    let Some(file_name) = path.file_name() else {
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("path has no file name"),
        });
    };

    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    let tmp_path =
        parent.join(format!(".undine.tmp.{}.{nanos}", file_name.to_string_lossy()));

    fs::write(&tmp_path, contents)
        .map_err(|source| StoreError::Io { path: tmp_path.clone(), source })?;

    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(source) => {
            let _ = fs::remove_file(&tmp_path);
            Err(StoreError::Io { path: path.to_path_buf(), source })
        }
    }
}
