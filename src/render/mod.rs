// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Render pipeline.
//!
//! Diagram source goes in, a displayable result comes out. Compilation is
//! delegated to an external Mermaid compiler behind [`DiagramCompiler`];
//! this module owns only the result bookkeeping: blank input short-circuits
//! to `Pending`, failures map to a fixed user-facing message, and a stale
//! outcome never overwrites one issued for newer input.

mod compiler;

pub use compiler::{CompileError, CompilerOptions, DiagramCompiler, MmdcCompiler};

/// Shown for any compile rejection; the raw compiler error goes to the log.
pub const RENDER_FAILED_MESSAGE: &str =
    "Failed to render diagram. Please check your syntax.";

/// Shown when the compiler binary itself cannot be launched. A missing tool
/// is not a syntax problem, so it gets its own message.
pub const COMPILER_UNAVAILABLE_MESSAGE: &str =
    "Mermaid compiler (mmdc) is not installed or not on PATH.";

/// Current state of the preview. Derived from the document, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    Pending,
    Rendered { svg: String },
    Failed { message: String },
}

impl RenderResult {
    pub fn svg(&self) -> Option<&str> {
        match self {
            Self::Rendered { svg } => Some(svg),
            _ => None,
        }
    }
}

/// Handle for one in-flight compile. Calls are not cancellable; the ticket's
/// sequence decides at completion time whether the outcome still applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTicket {
    seq: u64,
    source: String,
}

impl RenderTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_source(self) -> String {
        self.source
    }
}

/// Sequenced render bookkeeping: last-issued-input wins regardless of
/// completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPipeline {
    issued_seq: u64,
    current: RenderResult,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPipeline {
    pub fn new() -> Self {
        Self { issued_seq: 0, current: RenderResult::Pending }
    }

    pub fn current(&self) -> &RenderResult {
        &self.current
    }

    pub fn issued_seq(&self) -> u64 {
        self.issued_seq
    }

    /// Issues a ticket for `source`.
    ///
    /// Blank or whitespace-only input yields no ticket and resets the
    /// current result to `Pending` (never `Failed`). The sequence advances
    /// either way, so any in-flight compile goes stale.
    pub fn begin(&mut self, source: &str) -> Option<RenderTicket> {
        self.issued_seq = self.issued_seq.wrapping_add(1);

        if source.trim().is_empty() {
            self.current = RenderResult::Pending;
            return None;
        }

        Some(RenderTicket { seq: self.issued_seq, source: source.to_owned() })
    }

    /// Applies a compile outcome. Returns false (and changes nothing) when
    /// `seq` is not the most recently issued ticket.
    pub fn finish(&mut self, seq: u64, outcome: Result<String, CompileError>) -> bool {
        if seq != self.issued_seq {
            tracing::debug!(seq, issued = self.issued_seq, "discarding stale render outcome");
            return false;
        }

        self.current = match outcome {
            Ok(svg) if !svg.trim().is_empty() => RenderResult::Rendered { svg },
            Ok(_) => {
                tracing::warn!("mermaid compiler produced empty output");
                RenderResult::Failed { message: RENDER_FAILED_MESSAGE.to_owned() }
            }
            Err(err) => {
                tracing::warn!(error = %err, "mermaid compile failed");
                let message = match err {
                    CompileError::Launch { .. } => COMPILER_UNAVAILABLE_MESSAGE,
                    _ => RENDER_FAILED_MESSAGE,
                };
                RenderResult::Failed { message: message.to_owned() }
            }
        };
        true
    }
}


#[cfg(test)]
mod tests;
