// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Undine — terminal Mermaid editor with AI generation.
//!
//! Single-crate layout: the TUI edits Mermaid source, renders previews via
//! the Mermaid CLI, and generates diagrams from natural-language prompts,
//! either directly against OpenAI or through the bundled relay service.

pub mod app;
pub mod generate;
pub mod model;
pub mod relay;
pub mod render;
pub mod store;
pub mod tui;
