// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

use std::time::Duration;

use super::testing::ScriptedCompiler;
use super::{
    CompileError, CompilerOptions, DiagramCompiler, MmdcCompiler, RenderPipeline, RenderResult,
    COMPILER_UNAVAILABLE_MESSAGE, RENDER_FAILED_MESSAGE,
};

const SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\"><g/></svg>";

#[test]
fn starts_pending() {
    let pipeline = RenderPipeline::new();
    assert_eq!(pipeline.current(), &RenderResult::Pending);
}

#[test]
fn successful_compile_becomes_rendered() {
    let mut pipeline = RenderPipeline::new();
    let ticket = pipeline.begin("graph TD\nA-->B").expect("ticket");

    assert!(pipeline.finish(ticket.seq(), Ok(SVG.to_owned())));
    assert_eq!(pipeline.current().svg(), Some(SVG));
}

#[test]
fn compile_rejection_maps_to_fixed_message() {
    let mut pipeline = RenderPipeline::new();
    let ticket = pipeline.begin("graph TD\nA-->").expect("ticket");

    let outcome = Err(CompileError::Compile { detail: "Parse error on line 2".to_owned() });
    assert!(pipeline.finish(ticket.seq(), outcome));

    match pipeline.current() {
        RenderResult::Failed { message } => {
            assert_eq!(message, RENDER_FAILED_MESSAGE);
            assert!(!message.contains("Parse error"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[test]
fn missing_compiler_gets_its_own_message() {
    let mut pipeline = RenderPipeline::new();
    let ticket = pipeline.begin("graph TD\nA-->B").expect("ticket");

    let outcome = Err(CompileError::Launch {
        program: "mmdc".into(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
    });
    assert!(pipeline.finish(ticket.seq(), outcome));

    assert_eq!(
        pipeline.current(),
        &RenderResult::Failed { message: COMPILER_UNAVAILABLE_MESSAGE.to_owned() }
    );
}

#[test]
fn blank_source_is_pending_not_failed() {
    let mut pipeline = RenderPipeline::new();
    let ticket = pipeline.begin("graph TD\nA-->B").expect("ticket");
    pipeline.finish(ticket.seq(), Ok(SVG.to_owned()));

    assert!(pipeline.begin("").is_none());
    assert_eq!(pipeline.current(), &RenderResult::Pending);

    assert!(pipeline.begin("   \n  ").is_none());
    assert_eq!(pipeline.current(), &RenderResult::Pending);
}

#[test]
fn current_input_wins_when_stale_render_settles_last() {
    let mut pipeline = RenderPipeline::new();

    // Source A starts compiling, then the user edits to B before A settles.
    let ticket_a = pipeline.begin("graph TD\nA-->B").expect("ticket a");
    let ticket_b = pipeline.begin("graph LR\nX-->Y").expect("ticket b");

    assert!(pipeline.finish(ticket_b.seq(), Ok("<svg>b</svg>".to_owned())));
    assert!(!pipeline.finish(ticket_a.seq(), Ok("<svg>a</svg>".to_owned())));

    assert_eq!(pipeline.current().svg(), Some("<svg>b</svg>"));
}

#[test]
fn stale_failure_does_not_overwrite_newer_success() {
    let mut pipeline = RenderPipeline::new();

    let ticket_a = pipeline.begin("graph TD\nA-->").expect("ticket a");
    let ticket_b = pipeline.begin("graph TD\nA-->B").expect("ticket b");

    assert!(pipeline.finish(ticket_b.seq(), Ok(SVG.to_owned())));
    let stale = Err(CompileError::Compile { detail: "syntax".to_owned() });
    assert!(!pipeline.finish(ticket_a.seq(), stale));

    assert_eq!(pipeline.current().svg(), Some(SVG));
}

#[test]
fn blanking_the_source_invalidates_in_flight_renders() {
    let mut pipeline = RenderPipeline::new();

    let ticket = pipeline.begin("graph TD\nA-->B").expect("ticket");
    assert!(pipeline.begin("").is_none());

    assert!(!pipeline.finish(ticket.seq(), Ok(SVG.to_owned())));
    assert_eq!(pipeline.current(), &RenderResult::Pending);
}

#[test]
fn empty_compiler_output_counts_as_failure() {
    let mut pipeline = RenderPipeline::new();
    let ticket = pipeline.begin("graph TD\nA-->B").expect("ticket");

    assert!(pipeline.finish(ticket.seq(), Ok("   ".to_owned())));
    assert_eq!(
        pipeline.current(),
        &RenderResult::Failed { message: RENDER_FAILED_MESSAGE.to_owned() }
    );
}

#[test]
fn compile_timeout_maps_to_fixed_message() {
    let mut pipeline = RenderPipeline::new();
    let ticket = pipeline.begin("graph TD\nA-->B").expect("ticket");

    let outcome = Err(CompileError::Timeout { limit: Duration::from_secs(30) });
    assert!(pipeline.finish(ticket.seq(), outcome));

    assert_eq!(
        pipeline.current(),
        &RenderResult::Failed { message: RENDER_FAILED_MESSAGE.to_owned() }
    );
}

#[cfg(unix)]
#[tokio::test]
async fn stalled_compiler_times_out() {
    use std::os::unix::fs::PermissionsExt;

    use crate::store::tests::TempDir;

    let tmp = TempDir::new("stalled-compiler");
    let script = tmp.path().join("stall.sh");
    std::fs::write(&script, "#!/bin/sh\nsleep 5\n").expect("write script");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("make executable");

    let compiler = MmdcCompiler::with_program(script, CompilerOptions::default())
        .with_timeout(Duration::from_millis(50));

    let err = compiler.compile("graph TD\nA-->B").await.expect_err("timeout");
    assert!(matches!(err, CompileError::Timeout { .. }));
}

#[tokio::test]
async fn scripted_compiler_counts_calls() {
    let compiler = ScriptedCompiler::new([Ok(SVG.to_owned())]);

    let svg = compiler.compile("graph TD\nA-->B").await.expect("compile");
    assert_eq!(svg, SVG);
    assert_eq!(compiler.call_count(), 1);
}
