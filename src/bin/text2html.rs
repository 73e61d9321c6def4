//! CLI binary for edgequake-text2html.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `FormatConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_text2html::convert::{read_input, write_html};
use edgequake_text2html::{convert, ClassifierMode, FormatConfig, FormatOutput, StyleOverrides};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # Format a file (HTML on stdout)
  text2html scan.txt

  # Read from stdin, write to a file
  pbpaste | text2html - -o doc.html

  # Offline: local heuristic classifier only
  text2html --local-only scan.txt

  # Custom styles and a table of contents
  text2html --styles styles.json --toc paper.txt -o paper.html

  # Use a classification proxy instead of a local API key
  text2html --endpoint https://example.org/api/format scan.txt

  # Full structured output
  text2html --json scan.txt > output.json

STYLES FILE:
  {
    "h1":     { "color": "#1a237e" },
    "p":      { "font-size": "11pt" },
    "global": { "font-family": "Georgia, serif" }
  }
  Per-type declarations override the defaults; "global" is applied last
  to every element type.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  TEXT2HTML_*             Any flag below, e.g. TEXT2HTML_ENDPOINT

Without an API key or endpoint the local engine formats the text and the
status line says so.
"##;

/// Turn noisy OCR or chat-transcript text into styled HTML.
#[derive(Parser, Debug)]
#[command(
    name = "text2html",
    version,
    about = "Turn noisy OCR or chat-transcript text into styled, semantically tagged HTML",
    long_about = "Rebuild the structure of unstructured text (headings, lists, diagrams, tables, \
citations) and render it as styled HTML. Uses an LLM classifier when one is configured and \
falls back to deterministic local heuristics otherwise.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input text file, or `-` for stdin (default).
    input: Option<PathBuf>,

    /// Write HTML to this file instead of stdout.
    #[arg(short, long, env = "TEXT2HTML_OUTPUT")]
    output: Option<PathBuf>,

    /// Never call a remote classifier.
    #[arg(long, env = "TEXT2HTML_LOCAL_ONLY")]
    local_only: bool,

    /// HTTP classifier accepting {"text", "instruction"}.
    #[arg(long, env = "TEXT2HTML_ENDPOINT")]
    endpoint: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, …
    #[arg(
        long,
        env = "TEXT2HTML_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          A provider named here that cannot be configured is an error."
    )]
    provider: Option<String>,

    /// LLM model ID (default: gemini-2.5-flash).
    #[arg(long, env = "TEXT2HTML_MODEL")]
    model: Option<String>,

    /// JSON file of style overrides.
    #[arg(long, env = "TEXT2HTML_STYLES")]
    styles: Option<PathBuf>,

    /// Text alignment for every element (shorthand for global text-align).
    #[arg(long, env = "TEXT2HTML_ALIGN")]
    align: Option<String>,

    /// Prepend a table of contents built from h2/h3 headings.
    #[arg(long, env = "TEXT2HTML_TOC")]
    toc: bool,

    /// Text file with a custom classifier instruction.
    #[arg(long, env = "TEXT2HTML_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Remote classifier temperature (0.0–2.0).
    #[arg(long, env = "TEXT2HTML_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max tokens the remote classifier may generate.
    #[arg(long, env = "TEXT2HTML_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Remote classifier timeout in seconds.
    #[arg(long, env = "TEXT2HTML_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output structured JSON (FormatOutput) instead of HTML.
    #[arg(long, env = "TEXT2HTML_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "TEXT2HTML_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TEXT2HTML_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TEXT2HTML_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; INFO logs would
    // tear it apart.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let text = read_text(cli.input.as_ref()).await?;
    let config = build_config(&cli).await?;

    // ── Run formatting ───────────────────────────────────────────────────
    let spinner = show_progress.then(start_spinner);
    let result = convert(&text, &config).await;
    if let Some(ref bar) = spinner {
        bar.finish_and_clear();
    }
    let output = result.context("Formatting failed")?;

    if let Some(ref output_path) = cli.output {
        write_html(output_path, &output.html)
            .await
            .context("Failed to write output")?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.html.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.html.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet {
        print_summary(&output, cli.output.as_ref());
    }

    Ok(())
}

fn start_spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Formatting");
    bar.set_message("classifying structure…");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Status line plus counters on stderr.
fn print_summary(output: &FormatOutput, path: Option<&PathBuf>) {
    let mark = if output.used_fallback() {
        yellow("⚠")
    } else {
        green("✔")
    };
    eprintln!("{} {}", mark, bold(&output.status));
    let target = path
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "   {}{}",
        dim(&format!(
            "{} elements, {} diagrams/tables, {}ms",
            output.stats.elements, output.stats.extracted_payloads, output.stats.total_duration_ms
        )),
        target
    );
}

/// Read the input file, or stdin for `-` / no argument.
async fn read_text(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => read_input(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Map CLI args to `FormatConfig`.
async fn build_config(cli: &Cli) -> Result<FormatConfig> {
    let mut styles = match cli.styles {
        Some(ref path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read styles from {:?}", path))?;
            StyleOverrides::from_json(&json)
                .with_context(|| format!("Invalid styles file {:?}", path))?
        }
        None => StyleOverrides::new(),
    };
    if let Some(ref align) = cli.align {
        styles.set_global("text-align", align.clone());
    }

    let mut builder = FormatConfig::builder()
        .mode(if cli.local_only {
            ClassifierMode::LocalOnly
        } else {
            ClassifierMode::Auto
        })
        .styles(styles)
        .include_toc(cli.toc)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref url) = cli.endpoint {
        builder = builder.endpoint(url.clone());
    }
    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref path) = cli.instruction {
        let instruction = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(instruction);
    }

    builder.build().context("Invalid configuration")
}
