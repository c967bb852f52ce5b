// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Core data model: the diagram document and the notice stream.

mod document;
mod notice;

pub use document::{DiagramDocument, DEFAULT_DIAGRAM};
pub use notice::{Notice, NoticeKind};
