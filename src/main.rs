//! Inline Blame - per-line git attribution from the command line
//!
//! Runs the same pipeline an editor host drives, once, against the real git
//! binary.
//!
//! # Usage
//! ```bash
//! inline-blame src/lib.rs --line 42                 # Print the inline annotation
//! inline-blame src/lib.rs --line 42 --json          # Print the raw blame record
//! inline-blame src/lib.rs -l 42 -c settings.json    # Use a settings file
//! inline-blame probe                                # Check for git
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inline_blame::config::StyleSettings;
use inline_blame::git::{GitRunner, ProcessRunner, check_git_availability};
use inline_blame::host::{
    AnnotationRenderer, ConfigSource, DocumentPosition, DocumentSnapshot, Host, StatusReporter,
    StatusSeverity, Workspace,
};
use inline_blame::{InlineBlame, Stage};

/// Inline Blame - show who last changed a line, and why
#[derive(Parser)]
#[command(name = "inline-blame")]
#[command(about = "Per-line git blame with pull request provenance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// File to blame
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// 1-based line number
    #[arg(short, long)]
    line: Option<u32>,

    /// JSON settings file, same keys as the editor configuration
    #[arg(short, long, value_name = "SETTINGS")]
    config: Option<PathBuf>,

    /// Print the blame record or error as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether git is available on PATH
    Probe,
}

/// Host that prints to the terminal. Annotations and status are collected and
/// printed once the pipeline has finished.
#[derive(Default)]
struct ConsoleHost {
    config: serde_json::Value,
    document: Option<DocumentSnapshot>,
    annotation: Mutex<Option<String>>,
    status: Mutex<Option<(String, String, StatusSeverity)>>,
}

impl AnnotationRenderer for ConsoleHost {
    fn render_inline_annotation(
        &self,
        _file: &Path,
        _position: DocumentPosition,
        text: &str,
        _style: &StyleSettings,
    ) {
        *self.annotation.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.to_string());
    }

    fn clear_annotations(&self, _file: &Path) {
        *self.annotation.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl StatusReporter for ConsoleHost {
    fn set_status(&self, text: &str, tooltip: &str, severity: StatusSeverity) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((text.to_string(), tooltip.to_string(), severity));
    }

    fn clear_status(&self) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn notify(&self, message: &str) {
        eprintln!("✗ {}", message);
    }
}

impl ConfigSource for ConsoleHost {
    fn snapshot(&self) -> serde_json::Value {
        self.config.clone()
    }
}

impl Workspace for ConsoleHost {
    fn active_document(&self) -> Option<DocumentSnapshot> {
        self.document.clone()
    }
}

fn read_config(path: Option<&Path>) -> anyhow::Result<serde_json::Value> {
    let Some(path) = path else {
        return Ok(serde_json::json!({}));
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn read_document(file: &Path, line: u32) -> anyhow::Result<DocumentSnapshot> {
    let file = fs::canonicalize(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let content =
        fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let lines: Vec<&str> = content.lines().collect();
    let line_text = line
        .checked_sub(1)
        .and_then(|index| lines.get(index as usize))
        .map(|text| text.to_string())
        .unwrap_or_default();

    Ok(DocumentSnapshot {
        editor: 1,
        file,
        line,
        version: 0,
        line_text,
        line_count: lines.len() as u32,
        is_dirty: false,
        is_untitled: false,
    })
}

async fn handle_probe(runner: &dyn GitRunner) -> ExitCode {
    if check_git_availability(runner).await {
        println!("✓ git is available");
        ExitCode::SUCCESS
    } else {
        println!("✗ git not found in PATH");
        ExitCode::FAILURE
    }
}

async fn handle_blame(cli: Cli, runner: Arc<dyn GitRunner>) -> anyhow::Result<ExitCode> {
    let (Some(file), Some(line)) = (cli.file.as_deref(), cli.line) else {
        eprintln!("Usage: inline-blame <FILE> --line <N> [--config <SETTINGS>] [--json]");
        eprintln!("       inline-blame probe");
        return Ok(ExitCode::FAILURE);
    };

    let document = read_document(file, line)?;
    let console = Arc::new(ConsoleHost {
        config: read_config(cli.config.as_deref())?,
        document: Some(document.clone()),
        ..ConsoleHost::default()
    });
    let host = Host {
        renderer: console.clone(),
        status: console.clone(),
        config: console.clone(),
        workspace: console.clone(),
    };

    let plugin = InlineBlame::activate(runner, host).await;
    let orchestrator = plugin.orchestrator();
    if !orchestrator.is_git_available() {
        return Ok(ExitCode::FAILURE);
    }

    if cli.json {
        let output = match orchestrator.blame_line(&document).await {
            Ok(record) => serde_json::to_string_pretty(&record)?,
            Err(e) => serde_json::to_string_pretty(&e)?,
        };
        println!("{}", output);
        return Ok(ExitCode::SUCCESS);
    }

    let stage = orchestrator.stage(document.editor);
    let annotation = console.annotation.lock().unwrap_or_else(|e| e.into_inner()).clone();
    let status = console.status.lock().unwrap_or_else(|e| e.into_inner()).clone();

    match annotation {
        Some(text) => println!("{}:{}:{}", document.file.display(), line, text),
        None => println!("{}:{}: (no blame information)", document.file.display(), line),
    }
    if let Some((text, tooltip, severity)) = status {
        println!("[{:?}] {}", severity, text);
        println!("  {}", tooltip.replace('\n', "\n  "));
    }

    Ok(if stage == Stage::Error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let runner: Arc<dyn GitRunner> = Arc::new(ProcessRunner::new());

    match cli.command {
        Some(Commands::Probe) => Ok(handle_probe(runner.as_ref()).await),
        None => handle_blame(cli, runner).await,
    }
}
