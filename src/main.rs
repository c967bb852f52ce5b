// SPDX-FileCopyrightText: 2026 Undine contributors
// SPDX-License-Identifier: MIT

//! Undine CLI entrypoint.
//!
//! By default this runs the interactive TUI: editing on the left, preview
//! status on the right, a prompt line for AI generation. Generation calls
//! OpenAI directly with a locally stored key, or goes through a relay when
//! `--relay-url` is given.
//!
//! Use `--relay` to run the relay service instead; it reads the key from
//! `OPENAI_API_KEY` and exposes `POST /generate`.

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use undine::app::{worker, AppController, CredentialMode};
use undine::generate::{GenerationClient, OpenAiClient, RelayClient};
use undine::relay::RelayService;
use undine::render::{CompilerOptions, DiagramCompiler, MmdcCompiler};
use undine::store::{CredentialStore, DiagramLibrary};

const DEFAULT_RELAY_PORT: u16 = 8787;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--config-dir <dir>] [--library <dir>] [--relay-url <url>] [--mmdc <path>] [--theme <name>] [--preview <path>]\n  {program} --relay [--port <port>] [--model <name>] [--openai-url <url>]\n\nTUI mode (default) edits Mermaid source with a live preview and AI generation.\nThe OpenAI key is entered in settings (Ctrl+O) and stored under the config dir,\nor generation goes through a relay when --relay-url is given.\n\n--relay runs the relay service on 127.0.0.1:<port> (default {DEFAULT_RELAY_PORT});\nthe OpenAI key is read from the OPENAI_API_KEY environment variable."
    );
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CliOptions {
    relay: bool,
    config_dir: Option<String>,
    library_dir: Option<String>,
    relay_url: Option<String>,
    mmdc: Option<String>,
    theme: Option<String>,
    preview: Option<String>,
    port: Option<u16>,
    model: Option<String>,
    openai_url: Option<String>,
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--relay" => {
                if options.relay {
                    return Err(());
                }
                options.relay = true;
            }
            "--config-dir" => {
                if options.config_dir.is_some() {
                    return Err(());
                }
                options.config_dir = Some(args.next().ok_or(())?);
            }
            "--library" => {
                if options.library_dir.is_some() {
                    return Err(());
                }
                options.library_dir = Some(args.next().ok_or(())?);
            }
            "--relay-url" => {
                if options.relay_url.is_some() {
                    return Err(());
                }
                options.relay_url = Some(args.next().ok_or(())?);
            }
            "--mmdc" => {
                if options.mmdc.is_some() {
                    return Err(());
                }
                options.mmdc = Some(args.next().ok_or(())?);
            }
            "--theme" => {
                if options.theme.is_some() {
                    return Err(());
                }
                options.theme = Some(args.next().ok_or(())?);
            }
            "--preview" => {
                if options.preview.is_some() {
                    return Err(());
                }
                options.preview = Some(args.next().ok_or(())?);
            }
            "--port" => {
                if options.port.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                options.port = Some(raw.parse().map_err(|_| ())?);
            }
            "--model" => {
                if options.model.is_some() {
                    return Err(());
                }
                options.model = Some(args.next().ok_or(())?);
            }
            "--openai-url" => {
                if options.openai_url.is_some() {
                    return Err(());
                }
                options.openai_url = Some(args.next().ok_or(())?);
            }
            _ => return Err(()),
        }
    }

    if options.relay {
        // Relay mode has no TUI surfaces.
        if options.config_dir.is_some()
            || options.library_dir.is_some()
            || options.relay_url.is_some()
            || options.mmdc.is_some()
            || options.theme.is_some()
            || options.preview.is_some()
        {
            return Err(());
        }
    } else if options.port.is_some() || options.model.is_some() || options.openai_url.is_some() {
        return Err(());
    }

    Ok(options)
}

fn default_config_dir() -> PathBuf {
    if let Some(dir) = env::var_os("UNDINE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config").join("undine"),
        None => PathBuf::from(".undine"),
    }
}

fn main() {
    let result = (|| -> Result<(), Box<dyn Error>> {
        let mut args = env::args();
        let program = args.next().unwrap_or_else(|| "undine".to_owned());

        let options = match parse_options(args) {
            Ok(options) => options,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        if options.relay {
            return run_relay(options);
        }
        run_tui(options)
    })();

    if let Err(err) = result {
        eprintln!("undine: {err}");
        std::process::exit(1);
    }
}

fn run_relay(options: CliOptions) -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("UNDINE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut backend = OpenAiClient::new();
    if let Some(url) = options.openai_url {
        backend = backend.with_base_url(url);
    }
    if let Some(model) = options.model {
        backend = backend.with_model(model);
    }

    let api_key = env::var("OPENAI_API_KEY").ok();
    if api_key.as_deref().map_or(true, str::is_empty) {
        tracing::warn!("OPENAI_API_KEY is not set; generation requests will fail");
    }
    let service = Arc::new(RelayService::new(Arc::new(backend), api_key));
    let port = options.port.unwrap_or(DEFAULT_RELAY_PORT);

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "relay listening");

        axum::serve(listener, undine::relay::router(service))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        Ok::<(), Box<dyn Error>>(())
    })
}

fn run_tui(options: CliOptions) -> Result<(), Box<dyn Error>> {
    let config_dir = options.config_dir.map(PathBuf::from).unwrap_or_else(default_config_dir);
    std::fs::create_dir_all(&config_dir)?;

    // The terminal owns stdout/stderr, so the log goes to a file.
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config_dir.join("undine.log"))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("UNDINE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let compiler_options = CompilerOptions {
        theme: options.theme.unwrap_or_else(|| CompilerOptions::default().theme),
        ..CompilerOptions::default()
    };
    let compiler: Arc<dyn DiagramCompiler> = match options.mmdc {
        Some(program) => Arc::new(MmdcCompiler::with_program(program, compiler_options)),
        None => Arc::new(MmdcCompiler::new(compiler_options)),
    };

    let (client, mode): (Arc<dyn GenerationClient>, CredentialMode) = match options.relay_url {
        Some(url) => (Arc::new(RelayClient::new(url)), CredentialMode::Relay),
        None => (Arc::new(OpenAiClient::new()), CredentialMode::Direct),
    };

    let library_dir =
        options.library_dir.map(PathBuf::from).unwrap_or_else(|| config_dir.join("library"));
    let preview_path =
        options.preview.map(PathBuf::from).unwrap_or_else(|| config_dir.join("preview.svg"));

    let mut controller =
        AppController::new(mode).with_library(DiagramLibrary::new(library_dir));
    if mode == CredentialMode::Direct {
        controller = controller.with_credential_store(CredentialStore::new(&config_dir))?;
    }

    let (request_tx, request_rx) = tokio::sync::mpsc::unbounded_channel();
    let (event_tx, event_rx) = std::sync::mpsc::channel();

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async move {
        let worker_handle = tokio::spawn(worker::run(compiler, client, request_rx, event_tx));

        let tui_join = tokio::task::spawn_blocking(move || {
            undine::tui::run(controller, request_tx, event_rx, preview_path)
                .map_err(|err| err.to_string())
        })
        .await;

        // The TUI dropped its request sender, so the worker loop drains and
        // exits on its own.
        let _ = worker_handle.await;

        let tui_result = tui_join.map_err(|err| -> Box<dyn Error> { Box::new(err) })?;
        tui_result.map_err(|err| {
            Box::new(std::io::Error::other(err)) as Box<dyn Error>
        })?;
        Ok::<(), Box<dyn Error>>(())
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_options, CliOptions};

    #[test]
    fn parses_empty_args() {
        let options = parse_options(std::iter::empty()).expect("parse options");
        assert_eq!(options, CliOptions::default());
    }

    #[test]
    fn parses_relay_flag() {
        let options = parse_options(["--relay".to_owned()].into_iter()).expect("parse options");
        assert!(options.relay);
        assert_eq!(options.port, None);
    }

    #[test]
    fn parses_relay_with_port_and_model() {
        let options = parse_options(
            [
                "--relay".to_owned(),
                "--port".to_owned(),
                "9000".to_owned(),
                "--model".to_owned(),
                "gpt-4o".to_owned(),
            ]
            .into_iter(),
        )
        .expect("parse options");
        assert!(options.relay);
        assert_eq!(options.port, Some(9000));
        assert_eq!(options.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn parses_config_dir() {
        let options = parse_options(["--config-dir".to_owned(), "some/dir".to_owned()].into_iter())
            .expect("parse options");
        assert_eq!(options.config_dir.as_deref(), Some("some/dir"));
        assert!(!options.relay);
    }

    #[test]
    fn parses_relay_url() {
        let options = parse_options(
            ["--relay-url".to_owned(), "http://localhost:8787/generate".to_owned()].into_iter(),
        )
        .expect("parse options");
        assert_eq!(options.relay_url.as_deref(), Some("http://localhost:8787/generate"));
    }

    #[test]
    fn parses_mmdc_and_theme() {
        let options = parse_options(
            [
                "--mmdc".to_owned(),
                "/usr/local/bin/mmdc".to_owned(),
                "--theme".to_owned(),
                "dark".to_owned(),
            ]
            .into_iter(),
        )
        .expect("parse options");
        assert_eq!(options.mmdc.as_deref(), Some("/usr/local/bin/mmdc"));
        assert_eq!(options.theme.as_deref(), Some("dark"));
    }

    #[test]
    fn rejects_port_without_relay() {
        parse_options(["--port".to_owned(), "9000".to_owned()].into_iter()).unwrap_err();
    }

    #[test]
    fn rejects_model_without_relay() {
        parse_options(["--model".to_owned(), "gpt-4o".to_owned()].into_iter()).unwrap_err();
    }

    #[test]
    fn rejects_relay_with_tui_flags() {
        parse_options(
            ["--relay".to_owned(), "--config-dir".to_owned(), ".".to_owned()].into_iter(),
        )
        .unwrap_err();

        parse_options(
            ["--relay".to_owned(), "--relay-url".to_owned(), "http://x".to_owned()].into_iter(),
        )
        .unwrap_err();
    }

    #[test]
    fn rejects_unknown_args() {
        parse_options(["--nope".to_owned()].into_iter()).unwrap_err();
    }

    #[test]
    fn rejects_positional_args() {
        parse_options(["some/dir".to_owned()].into_iter()).unwrap_err();
    }

    #[test]
    fn rejects_duplicate_flags() {
        parse_options(["--relay".to_owned(), "--relay".to_owned()].into_iter()).unwrap_err();

        parse_options(
            [
                "--config-dir".to_owned(),
                ".".to_owned(),
                "--config-dir".to_owned(),
                "other".to_owned(),
            ]
            .into_iter(),
        )
        .unwrap_err();
    }

    #[test]
    fn rejects_missing_flag_value() {
        parse_options(["--config-dir".to_owned()].into_iter()).unwrap_err();
        parse_options(["--relay".to_owned(), "--port".to_owned()].into_iter()).unwrap_err();
    }

    #[test]
    fn rejects_non_numeric_port() {
        parse_options(
            ["--relay".to_owned(), "--port".to_owned(), "abc".to_owned()].into_iter(),
        )
        .unwrap_err();
    }
}
