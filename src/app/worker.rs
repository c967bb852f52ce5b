// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Async side of the controller: executes compile and generation requests
//! and reports completions back to the TUI thread.
//!
//! Neither call is cancellable; requests run to completion and staleness is
//! resolved by the controller when the event is applied.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use super::{WorkEvent, WorkRequest};
use crate::generate::GenerationClient;
use crate::render::DiagramCompiler;

pub async fn run(
    compiler: Arc<dyn DiagramCompiler>,
    client: Arc<dyn GenerationClient>,
    mut requests: UnboundedReceiver<WorkRequest>,
    events: Sender<WorkEvent>,
) {
    while let Some(request) = requests.recv().await {
        match request {
            WorkRequest::Render { seq, source } => {
                let compiler = compiler.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let outcome = compiler.compile(&source).await;
                    // The receiver may be gone during shutdown.
                    let _ = events.send(WorkEvent::RenderDone { seq, outcome });
                });
            }
            WorkRequest::Generate { seq, prompt, credential } => {
                let client = client.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let outcome = client.generate(&prompt, credential.as_deref()).await;
                    let _ = events.send(WorkEvent::GenerationDone { seq, outcome });
                });
            }
        }
    }
}
