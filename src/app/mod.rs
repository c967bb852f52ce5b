// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Application state controller.
//!
//! Owns the diagram document, the render pipeline, the generation state
//! machine and the notice queue. The controller is synchronous and free of
//! I/O beyond the stores; the TUI loop feeds it key-driven intents and the
//! async worker feeds it completion events, both by plain method calls.

pub mod worker;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::generate::GenerationError;
use crate::model::{DiagramDocument, Notice};
use crate::render::{CompileError, RenderPipeline, RenderResult, RenderTicket};
use crate::store::{CredentialStore, DiagramLibrary, NewDiagram, StoreError};

/// How long the source must be stable before a render is issued.
pub const RENDER_DEBOUNCE: Duration = Duration::from_millis(250);

const LIBRARY_TITLE_MAX_CHARS: usize = 64;

/// Where the generation credential lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// The client holds the key; settings collect and persist it.
    Direct,
    /// A relay holds the key server-side; settings are informational.
    Relay,
}

/// At most one generation request is outstanding at a time. This is
/// advisory mutual exclusion enforced at the controller boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Generating { seq: u64 },
}

/// An accepted prompt submission, handed to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub seq: u64,
    pub prompt: String,
}

/// Work shipped from the TUI thread to the async worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkRequest {
    Render { seq: u64, source: String },
    Generate { seq: u64, prompt: String, credential: Option<String> },
}

/// Completions shipped back from the worker, drained every loop tick.
#[derive(Debug)]
pub enum WorkEvent {
    RenderDone { seq: u64, outcome: Result<String, CompileError> },
    GenerationDone { seq: u64, outcome: Result<String, GenerationError> },
}

#[derive(Debug)]
pub struct AppController {
    document: DiagramDocument,
    pipeline: RenderPipeline,
    generation: GenerationState,
    generation_seq: u64,
    credential_mode: CredentialMode,
    credential: Option<String>,
    credential_store: Option<CredentialStore>,
    library: Option<DiagramLibrary>,
    notices: VecDeque<Notice>,
    settings_open: bool,
    dirty_since: Option<Instant>,
    debounce: Duration,
}

impl AppController {
    pub fn new(credential_mode: CredentialMode) -> Self {
        Self {
            document: DiagramDocument::default(),
            pipeline: RenderPipeline::new(),
            generation: GenerationState::Idle,
            generation_seq: 0,
            credential_mode,
            credential: None,
            credential_store: None,
            library: None,
            notices: VecDeque::new(),
            settings_open: false,
            // The startup document renders once the first debounce window
            // elapses.
            dirty_since: Some(Instant::now()),
            debounce: RENDER_DEBOUNCE,
        }
    }

    /// Attaches the credential store and reads the stored credential (the
    /// one read per session).
    pub fn with_credential_store(mut self, store: CredentialStore) -> Result<Self, StoreError> {
        let loaded = store.load()?;
        self.credential = loaded.filter(|value| !value.is_empty());
        self.credential_store = Some(store);
        Ok(self)
    }

    pub fn with_library(mut self, library: DiagramLibrary) -> Self {
        self.library = Some(library);
        self
    }

    pub fn credential_mode(&self) -> CredentialMode {
        self.credential_mode
    }

    pub fn source(&self) -> &str {
        self.document.source()
    }

    pub fn document_rev(&self) -> u64 {
        self.document.rev()
    }

    pub fn render_result(&self) -> &RenderResult {
        self.pipeline.current()
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.generation, GenerationState::Generating { .. })
    }

    /// Whether generation can be attempted at all. Unconditionally true in
    /// relay mode.
    pub fn has_api_key(&self) -> bool {
        match self.credential_mode {
            CredentialMode::Relay => true,
            CredentialMode::Direct => self.credential.is_some(),
        }
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn settings_open(&self) -> bool {
        self.settings_open
    }

    pub fn open_settings(&mut self) {
        self.settings_open = true;
    }

    pub fn close_settings(&mut self) {
        self.settings_open = false;
    }

    /// Relays a raw editor change into the document and schedules a render.
    pub fn edit_source(&mut self, source: impl Into<String>) {
        if self.document.set_source(source) {
            self.dirty_since = Some(Instant::now());
        }
    }

    /// Issues a render ticket once the debounce window has elapsed.
    pub fn take_due_render(&mut self, now: Instant) -> Option<RenderTicket> {
        let dirty_since = self.dirty_since?;
        if now.duration_since(dirty_since) < self.debounce {
            return None;
        }
        self.dirty_since = None;
        self.pipeline.begin(self.document.source())
    }

    /// Applies a compile outcome; stale outcomes are discarded.
    pub fn finish_render(&mut self, seq: u64, outcome: Result<String, CompileError>) -> bool {
        self.pipeline.finish(seq, outcome)
    }

    /// Handles a prompt submission.
    ///
    /// Returns the request to dispatch, or `None` when the submission is
    /// rejected at this boundary: blank prompt, a request already
    /// outstanding, or (direct mode) no credential. The last case opens the
    /// settings surface and emits a notice.
    pub fn submit_prompt(&mut self, prompt: &str) -> Option<GenerationRequest> {
        if self.is_generating() {
            return None;
        }
        if prompt.trim().is_empty() {
            return None;
        }
        if !self.has_api_key() {
            self.settings_open = true;
            self.push_notice(Notice::error(
                "OpenAI API Key Required",
                "Please add your OpenAI API key in settings first.",
            ));
            return None;
        }

        self.generation_seq = self.generation_seq.wrapping_add(1);
        let seq = self.generation_seq;
        self.generation = GenerationState::Generating { seq };
        Some(GenerationRequest { seq, prompt: prompt.to_owned() })
    }

    /// Applies a generation outcome. Outcomes for anything but the
    /// outstanding request are ignored.
    pub fn finish_generation(&mut self, seq: u64, outcome: Result<String, GenerationError>) {
        let GenerationState::Generating { seq: active } = self.generation else {
            return;
        };
        if active != seq {
            return;
        }

        self.generation = GenerationState::Idle;
        match outcome {
            Ok(text) => {
                self.edit_source(text);
                self.push_notice(Notice::success(
                    "Diagram Generated",
                    "Your mermaid diagram has been created successfully.",
                ));
            }
            Err(err) => {
                tracing::warn!(error = %err, "generation failed");
                self.push_notice(Notice::error("Generation Failed", err.user_reason()));
            }
        }
    }

    /// Commits a credential from the settings surface. The empty string
    /// clears it. No format validation; validity is discovered on first
    /// use.
    pub fn save_credential(&mut self, value: &str) {
        if let Some(store) = &self.credential_store {
            if let Err(err) = store.save(value) {
                tracing::error!(error = %err, "cannot persist credential");
                self.push_notice(Notice::error(
                    "Settings Not Saved",
                    "Could not write the credential file.",
                ));
                return;
            }
        }

        self.credential = (!value.is_empty()).then(|| value.to_owned());
        self.settings_open = false;
        self.push_notice(Notice::success(
            "Settings Saved",
            "Your OpenAI API key has been saved.",
        ));
    }

    /// Inserts the current diagram into the library.
    pub fn save_to_library(&mut self) {
        let Some(library) = &self.library else {
            self.push_notice(Notice::info(
                "No Library",
                "No diagram library is configured.",
            ));
            return;
        };

        let content = self.document.source().to_owned();
        if content.trim().is_empty() {
            self.push_notice(Notice::error("Nothing to Save", "The diagram is empty."));
            return;
        }

        let new = NewDiagram {
            title: library_title(&content),
            description: String::new(),
            content,
            is_public: false,
        };
        match library.insert(new) {
            Ok(record) => {
                self.push_notice(Notice::success(
                    "Diagram Saved",
                    format!("Stored in the library as {}.", record.id),
                ));
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot save diagram to library");
                self.push_notice(Notice::error(
                    "Save Failed",
                    "Could not write the diagram to the library.",
                ));
            }
        }
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }
}

fn library_title(content: &str) -> String {
    let line = content.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");
    if line.is_empty() {
        return "Untitled diagram".to_owned();
    }
    line.chars().take(LIBRARY_TITLE_MAX_CHARS).collect()
}
