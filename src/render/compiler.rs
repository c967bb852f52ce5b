// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::process::Command;

const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(30);

static SCRATCH_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
pub enum CompileError {
    /// The compiler binary could not be started at all.
    Launch { program: PathBuf, source: io::Error },
    Io { path: PathBuf, source: io::Error },
    /// The compiler ran and rejected the input.
    Compile { detail: String },
    Timeout { limit: Duration },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch { program, source } => {
                write!(f, "cannot launch mermaid compiler {program:?}: {source}")
            }
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Compile { detail } => write!(f, "mermaid compile rejected input: {detail}"),
            Self::Timeout { limit } => write!(f, "mermaid compile timed out after {limit:?}"),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Launch { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Compile { .. } | Self::Timeout { .. } => None,
        }
    }
}

/// Compiles Mermaid source into serialized SVG markup.
#[async_trait]
pub trait DiagramCompiler: Send + Sync {
    async fn compile(&self, source: &str) -> Result<String, CompileError>;
}

/// One-time compiler configuration (theme, background). Applied when the
/// compiler is constructed, not per render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    pub theme: String,
    pub background: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { theme: "default".to_owned(), background: "white".to_owned() }
    }
}

/// Production compiler: spawns the Mermaid CLI (`mmdc`) per render and reads
/// the SVG it writes.
#[derive(Debug, Clone)]
pub struct MmdcCompiler {
    program: PathBuf,
    base_args: Vec<String>,
    timeout: Duration,
}

impl MmdcCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self::with_program("mmdc", options)
    }

    pub fn with_program(program: impl Into<PathBuf>, options: CompilerOptions) -> Self {
        // The argv prefix is fixed here once; every render reuses it.
        let base_args = vec![
            "--quiet".to_owned(),
            "--theme".to_owned(),
            options.theme,
            "--backgroundColor".to_owned(),
            options.background,
        ];
        Self { program: program.into(), base_args, timeout: DEFAULT_COMPILE_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn scratch_dir() -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let counter = SCRATCH_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "undine-render-{}-{nanos}-{counter}",
            std::process::id()
        ))
    }
}

#[async_trait]
impl DiagramCompiler for MmdcCompiler {
    async fn compile(&self, source: &str) -> Result<String, CompileError> {
        let dir = Self::scratch_dir();
        std::fs::create_dir_all(&dir)
            .map_err(|source| CompileError::Io { path: dir.clone(), source })?;

        let input_path = dir.join("input.mmd");
        let output_path = dir.join("output.svg");
        let result = self.compile_in(source, &input_path, &output_path).await;
        let _ = std::fs::remove_dir_all(&dir);
        result
    }
}

impl MmdcCompiler {
    async fn compile_in(
        &self,
        source: &str,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<String, CompileError> {
        std::fs::write(input_path, source)
            .map_err(|source| CompileError::Io { path: input_path.to_path_buf(), source })?;

        let run = Command::new(&self.program)
            .args(&self.base_args)
            .arg("--input")
            .arg(input_path)
            .arg("--output")
            .arg(output_path)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| CompileError::Timeout { limit: self.timeout })?
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => {
                    CompileError::Launch { program: self.program.clone(), source }
                }
                _ => CompileError::Io { path: self.program.clone(), source },
            })?;

        if !output.status.success() {
            let detail = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            let detail = if detail.is_empty() {
                format!("exit status {}", output.status)
            } else {
                detail
            };
            return Err(CompileError::Compile { detail });
        }

        std::fs::read_to_string(output_path)
            .map_err(|source| CompileError::Io { path: output_path.to_path_buf(), source })
    }
}
