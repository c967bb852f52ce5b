// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{write_atomic, StoreError};

/// A saved diagram, as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for an insert. The library fills in id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiagram {
    pub title: String,
    pub description: String,
    pub content: String,
    pub is_public: bool,
}

/// Insert-only collection of saved diagrams, one JSON file per record.
///
/// There is deliberately no update/delete/versioning surface here.
#[derive(Debug, Clone)]
pub struct DiagramLibrary {
    root: PathBuf,
}

impl DiagramLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    pub fn insert(&self, new: NewDiagram) -> Result<DiagramRecord, StoreError> {
        let record = DiagramRecord {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            description: new.description,
            content: new.content,
            is_public: new.is_public,
            created_at: Utc::now(),
        };

        let path = self.record_path(&record.id);
        let contents = serde_json::to_string_pretty(&record)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;
        write_atomic(&path, format!("{contents}\n").as_bytes())?;

        Ok(record)
    }

    pub fn load(&self, id: &str) -> Result<DiagramRecord, StoreError> {
        let path = self.record_path(id);
        let contents = fs::read_to_string(&path)
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Json { path, source })
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::{DiagramLibrary, NewDiagram};
    use crate::store::tests::TempDir;

    struct LibraryTestCtx {
        _tmp: TempDir,
        library: DiagramLibrary,
    }

    #[fixture]
    fn ctx() -> LibraryTestCtx {
        let tmp = TempDir::new("diagram-library");
        let library = DiagramLibrary::new(tmp.path().join("library"));
        LibraryTestCtx { _tmp: tmp, library }
    }

    fn sample() -> NewDiagram {
        NewDiagram {
            title: "Login flow".to_owned(),
            description: String::new(),
            content: "graph TD\nA-->B".to_owned(),
            is_public: false,
        }
    }

    #[rstest]
    fn insert_returns_the_stored_record(ctx: LibraryTestCtx) {
        let record = ctx.library.insert(sample()).expect("insert");

        assert_eq!(record.title, "Login flow");
        assert_eq!(record.content, "graph TD\nA-->B");
        assert!(!record.is_public);
        assert!(!record.id.is_empty());
    }

    #[rstest]
    fn inserted_record_round_trips(ctx: LibraryTestCtx) {
        let record = ctx.library.insert(sample()).expect("insert");
        let loaded = ctx.library.load(&record.id).expect("load");
        assert_eq!(loaded, record);
    }

    #[rstest]
    fn inserts_get_distinct_ids(ctx: LibraryTestCtx) {
        let first = ctx.library.insert(sample()).expect("insert");
        let second = ctx.library.insert(sample()).expect("insert");
        assert_ne!(first.id, second.id);
    }
}
