// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// A short user-facing notification emitted by the controller and shown as a
/// toast by the TUI. Raw error detail never lands here; it goes to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    kind: NoticeKind,
    title: String,
    body: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, title: title.into(), body: body.into() }
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, title: title.into(), body: body.into() }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Info, title: title.into(), body: body.into() }
    }

    pub fn kind(&self) -> NoticeKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
