// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

/// The sample diagram shown on first start.
pub const DEFAULT_DIAGRAM: &str = "graph TD\n    A[Start] --> B{Is it working?}\n    B -->|Yes| C[Great!]\n    B -->|No| D[Debug]\n    D --> B";

/// The single source of truth for what is edited and rendered.
///
/// The revision counter lets observers detect changes without diffing the
/// source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramDocument {
    source: String,
    rev: u64,
}

impl Default for DiagramDocument {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGRAM)
    }
}

impl DiagramDocument {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), rev: 0 }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rev(&self) -> u64 {
        self.rev
    }

    /// Replaces the source text. A no-op (revision untouched) when the new
    /// text is identical to the current one.
    pub fn set_source(&mut self, source: impl Into<String>) -> bool {
        let source = source.into();
        if self.source == source {
            return false;
        }
        self.source = source;
        self.rev = self.rev.saturating_add(1);
        true
    }
}
