//! CLI binary for docintelli.
//!
//! A thin shim over the library crate: every subcommand drives one view of
//! an [`App`] and prints the result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docintelli::config::DEFAULT_BASE_URL;
use docintelli::export::{self, NOTES_DOCX_FILE_NAME};
use docintelli::{
    App, ClientConfig, DocIntelliError, FeatureFlags, MarkdownRenderer, NoopObserver,
    ProcessingObserver, ProcessingStep, RenderWarning, StepPacing, StepStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI step observer using indicatif ────────────────────────────────────────

/// Terminal rendering of the six processing steps: a bar counting finished
/// steps plus one log line per step as it completes.
struct CliStepObserver {
    bar: ProgressBar,
    /// Steps already printed as done.
    done: AtomicUsize,
    started: Instant,
}

impl CliStepObserver {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos}/{len} steps  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            done: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }
}

impl ProcessingObserver for CliStepObserver {
    fn on_start(&self, file_name: &str) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {file_name}…"))
        ));
    }

    fn on_steps(&self, steps: &[ProcessingStep]) {
        let done = steps
            .iter()
            .take_while(|s| s.status == StepStatus::Done)
            .count();
        let previous = self.done.swap(done, Ordering::SeqCst);
        if done > previous {
            for step in &steps[previous..done] {
                self.bar
                    .println(format!("  {} {}", green("✓"), step.name()));
            }
        }
        self.bar.set_position(done as u64);

        if let Some(current) = steps.iter().find(|s| s.status == StepStatus::InProgress) {
            let note = if current.is_ai_step() {
                dim(" (waiting for the service)")
            } else {
                String::new()
            };
            self.bar.set_message(format!("{}{note}", current.name()));
        }
    }

    fn on_complete(&self, markdown_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Markdown ready: {} bytes in {:.1}s",
            green("✔"),
            bold(&markdown_len.to_string()),
            self.started.elapsed().as_secs_f64()
        );
    }

    fn on_failure(&self, _error: &DocIntelliError) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # Convert a PDF and print the Markdown
  docintelli convert paper.pdf

  # OCR a scanned document without AI summarisation, save MD and DOCX
  docintelli --ocr --no-ai convert scan.pdf -o scan.md --docx scan.docx

  # List past conversions and reopen one
  docintelli history
  docintelli open SPASSIGN.pdf -o SPASSIGN.md --pdf SPASSIGN.pdf

  # Render Markdown with math to standalone HTML
  docintelli render notes.md -o notes.html

  # Scratchpad notes
  docintelli notes set "# Lecture 3"
  docintelli notes docx -o lecture.docx

ENVIRONMENT VARIABLES:
  DOCINTELLI_BASE_URL       Conversion service address (default http://127.0.0.1:9898)
  DOCINTELLI_TIMEOUT        Request timeout in seconds (default: none)
  DOCINTELLI_SESSION_DIR    Directory holding session notes
  DOCINTELLI_OCR            Enable OCR
  DOCINTELLI_NO_AI          Use /convert_raw instead of /convert
  RUST_LOG                  Override log filter (e.g. docintelli=debug)
"##;

/// Convert PDFs to Markdown through the DocIntelli service.
#[derive(Parser, Debug)]
#[command(
    name = "docintelli",
    version,
    about = "Convert PDFs to Markdown through the DocIntelli service",
    long_about = "Terminal front end for the DocIntelli conversion service: upload PDFs for \
conversion to Markdown (with OCR and AI summarisation), browse and reopen past conversions, \
render Markdown with math, and keep a scratchpad of notes exportable to DOCX.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Conversion service address.
    #[arg(long, global = true, env = "DOCINTELLI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds (default: no deadline).
    #[arg(long, global = true, env = "DOCINTELLI_TIMEOUT")]
    timeout: Option<u64>,

    /// Directory holding session-scoped notes.
    #[arg(long, global = true, env = "DOCINTELLI_SESSION_DIR")]
    session_dir: Option<PathBuf>,

    /// Largest accepted upload in MiB.
    #[arg(long, global = true, env = "DOCINTELLI_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: u64,

    /// Enable OCR for scanned documents.
    #[arg(long, global = true, env = "DOCINTELLI_OCR")]
    ocr: bool,

    /// Disable AI summarisation (uses the raw conversion endpoint).
    #[arg(long, global = true, env = "DOCINTELLI_NO_AI")]
    no_ai: bool,

    /// Skip the cosmetic pauses between processing steps.
    #[arg(long, global = true)]
    no_pacing: bool,

    /// Disable the step progress display.
    #[arg(long, global = true, env = "DOCINTELLI_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCINTELLI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCINTELLI_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF and convert it to Markdown.
    Convert {
        /// Local PDF file.
        input: PathBuf,
        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the rendered preview as HTML.
        #[arg(long)]
        html: Option<PathBuf>,
        /// Also export the result as DOCX.
        #[arg(long)]
        docx: Option<PathBuf>,
    },
    /// List past conversions, most recent first.
    History {
        /// Print the entries as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Reopen a past conversion by filename.
    Open {
        filename: String,
        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Save the original PDF.
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Write the rendered preview as HTML.
        #[arg(long)]
        html: Option<PathBuf>,
        /// Export the stored Markdown as DOCX.
        #[arg(long)]
        docx: Option<PathBuf>,
    },
    /// Render a Markdown file to sanitised HTML with typeset math.
    Render {
        input: PathBuf,
        /// Write HTML to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Session scratchpad notes.
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },
    /// Show the processing toggles.
    Settings {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum NotesAction {
    /// Print the notes.
    Show {
        /// Print the rendered HTML instead of the Markdown.
        #[arg(long)]
        html: bool,
    },
    /// Replace the notes with TEXT.
    Set { text: String },
    /// Replace the notes with the contents of a file.
    EditFile { path: PathBuf },
    /// Export the notes as DOCX (default: my-notes.docx).
    Docx {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Forget the saved notes.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs stay quiet while the step display is active.
    let show_progress =
        !cli.quiet && !cli.no_progress && matches!(cli.command, Command::Convert { .. });
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

    let config = build_config(&cli)?;
    let mut app = App::connect(config).context("Failed to set up the client")?;
    let quiet = cli.quiet;

    match cli.command {
        Command::Convert {
            input,
            output,
            html,
            docx,
        } => {
            run_convert(
                &mut app,
                &input,
                Targets {
                    markdown: output,
                    html,
                    docx,
                    pdf: None,
                },
                show_progress,
                quiet,
            )
            .await
        }
        Command::History { json } => run_history(&mut app, json).await,
        Command::Open {
            filename,
            output,
            pdf,
            html,
            docx,
        } => {
            run_open(
                &mut app,
                &filename,
                Targets {
                    markdown: output,
                    html,
                    docx,
                    pdf,
                },
                quiet,
            )
            .await
        }
        Command::Render { input, output } => run_render(&input, output.as_deref(), quiet).await,
        Command::Notes { action } => run_notes(&mut app, action, quiet).await,
        Command::Settings { json } => run_settings(&app, json),
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(cli.base_url.as_str())
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024))
        .default_flags(FeatureFlags {
            ocr: cli.ocr,
            ai_summarization: !cli.no_ai,
        });
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    if let Some(ref dir) = cli.session_dir {
        builder = builder.session_dir(dir.clone());
    }
    if cli.no_pacing {
        builder = builder.pacing(StepPacing::immediate());
    }
    builder.build().context("Invalid configuration")
}

/// Where to write the displayed document.
struct Targets {
    markdown: Option<PathBuf>,
    html: Option<PathBuf>,
    docx: Option<PathBuf>,
    pdf: Option<PathBuf>,
}

async fn run_convert(
    app: &mut App,
    input: &Path,
    targets: Targets,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    app.select_path(input)
        .await
        .with_context(|| format!("Cannot use '{}'", input.display()))?;

    let observer: Box<dyn ProcessingObserver> = if show_progress {
        Box::new(CliStepObserver::new(docintelli::StepKind::ALL.len()))
    } else {
        Box::new(NoopObserver)
    };
    let outcome = app.process(observer.as_ref()).await.map(str::to_string);
    if let Err(e) = outcome {
        if let Some(message) = app.conversion().error() {
            eprintln!("{} {}", red("✘"), message);
        }
        return Err(e).context("Conversion failed");
    }

    write_targets(app, targets, quiet).await
}

async fn run_open(app: &mut App, filename: &str, targets: Targets, quiet: bool) -> Result<()> {
    if let Err(e) = app.load_history_item(filename).await {
        if let Some(message) = app.notice() {
            eprintln!("{} {}", red("✘"), message);
        }
        return Err(e).with_context(|| format!("Failed to open '{filename}'"));
    }
    write_targets(app, targets, quiet).await
}

/// Shared tail of `convert` and `open`: the preview's download actions.
async fn write_targets(app: &mut App, targets: Targets, quiet: bool) -> Result<()> {
    let Some(doc) = app.display() else {
        anyhow::bail!("No document is displayed");
    };
    let markdown = doc.markdown.unwrap_or_default().to_string();
    let title = doc.filename.to_string();
    let pdf_url = doc.pdf_url.clone();

    match targets.markdown {
        Some(ref path) => {
            let path = app
                .export_markdown(Some(path))
                .await
                .context("Failed to save Markdown")?;
            report(quiet, "Markdown", &path);
        }
        None => print_stdout(&markdown)?,
    }

    if let Some(ref path) = targets.html {
        let rendered = app.rendered();
        print_warnings(&rendered.warnings, quiet);
        export::write_atomic(path, html_page(&title, &rendered.html).as_bytes())
            .await
            .context("Failed to save HTML")?;
        report(quiet, "HTML", path);
    }

    if let Some(ref path) = targets.pdf {
        let bytes = pdf_url
            .as_deref()
            .and_then(|url| app.registry().resolve(url))
            .map(|(bytes, _)| bytes)
            .context("The displayed document has no PDF")?;
        export::write_atomic(path, &bytes)
            .await
            .context("Failed to save PDF")?;
        report(quiet, "PDF", path);
    }

    if let Some(ref path) = targets.docx {
        if let Err(e) = app.export_docx(Some(path)).await {
            if let Some(message) = app.notice() {
                eprintln!("{} {}", red("✘"), message);
            }
            return Err(e).context("Failed to export DOCX");
        }
        report(quiet, "DOCX", path);
    }
    Ok(())
}

async fn run_history(app: &mut App, json: bool) -> Result<()> {
    if let Err(e) = app.load_history().await {
        if let Some(message) = app.history().error() {
            eprintln!("{} {}", red("✘"), message);
        }
        return Err(e).context("Could not list history");
    }
    let entries = app.history().entries();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(entries).context("Failed to serialise history")?
        );
        return Ok(());
    }
    if entries.is_empty() {
        println!("No conversions yet.");
        return Ok(());
    }
    for entry in entries {
        let when = entry
            .recorded_at()
            .map(|t| t.format("%b %e, %Y %H:%M").to_string())
            .unwrap_or_else(|| entry.timestamp.clone());
        let mut tags = Vec::new();
        if entry.ocr {
            tags.push(cyan("OCR"));
        }
        if let Some(kind) = entry.kind.as_deref() {
            tags.push(dim(kind));
        }
        println!(
            "{}  {}  {}",
            dim(&format!("{when:<19}")),
            bold(&entry.filename),
            tags.join(" ")
        );
    }
    Ok(())
}

async fn run_render(input: &Path, output: Option<&Path>, quiet: bool) -> Result<()> {
    let markdown = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let rendered = MarkdownRenderer::new().render(Some(&markdown));
    print_warnings(&rendered.warnings, quiet);

    match output {
        Some(path) => {
            let title = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            export::write_atomic(path, html_page(&title, &rendered.html).as_bytes())
                .await
                .context("Failed to save HTML")?;
            report(quiet, "HTML", path);
        }
        None => print_stdout(&rendered.html)?,
    }
    Ok(())
}

async fn run_notes(app: &mut App, action: NotesAction, quiet: bool) -> Result<()> {
    match action {
        NotesAction::Show { html } => {
            let notes = app.notes();
            if html {
                print_stdout(&notes.rendered().html)?;
            } else {
                print_stdout(notes.content())?;
            }
        }
        NotesAction::Set { text } => {
            app.notes_mut().edit(text).context("Failed to save notes")?;
        }
        NotesAction::EditFile { path } => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            app.notes_mut().edit(text).context("Failed to save notes")?;
        }
        NotesAction::Docx { output } => {
            let notes = app.notes_mut();
            if !notes.can_export_docx() {
                anyhow::bail!("The notes are empty; nothing to export");
            }
            let bytes = match notes.export_docx().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    if let Some(message) = notes.error() {
                        eprintln!("{} {}", red("✘"), message);
                    }
                    return Err(e).context("Failed to export notes");
                }
            };
            let path = export::output_path(output.as_deref(), NOTES_DOCX_FILE_NAME);
            export::write_atomic(&path, &bytes)
                .await
                .context("Failed to save DOCX")?;
            report(quiet, "DOCX", &path);
        }
        NotesAction::Clear => {
            app.notes_mut().discard().context("Failed to clear notes")?;
        }
    }
    Ok(())
}

fn run_settings(app: &App, json: bool) -> Result<()> {
    let toggles = app.settings().toggles(app.state().flags);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&toggles).context("Failed to serialise settings")?
        );
        return Ok(());
    }
    for toggle in toggles {
        let state = if toggle.enabled {
            green("on ")
        } else {
            dim("off")
        };
        println!("{}  {}  {}", state, bold(toggle.label), dim(toggle.section));
        println!("       {}", toggle.description);
    }
    Ok(())
}

// ── Output helpers ───────────────────────────────────────────────────────────

fn print_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn print_warnings(warnings: &[RenderWarning], quiet: bool) {
    if quiet {
        return;
    }
    for warning in warnings {
        eprintln!("{} {}", cyan("⚠"), warning);
    }
}

fn report(quiet: bool, what: &str, path: &Path) {
    if !quiet {
        eprintln!("{} {}  →  {}", green("✔"), what, bold(&path.display().to_string()));
    }
}

/// Standalone HTML page around a rendered preview.
fn html_page(title: &str, body: &str) -> String {
    let title = title
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}
