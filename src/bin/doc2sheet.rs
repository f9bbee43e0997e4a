//! CLI binary for edgequake-doc2sheet.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `VisionEngineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use edgequake_doc2sheet::engine::vision::VisionEngineConfig;
use edgequake_doc2sheet::{
    route_task, ConversionConfig, ConversionMode, ConversionOutput, ConversionProgressCallback,
    Converter, ProgressCallback, Upload,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the job's files plus a log line
/// per page. Files may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Staging");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            degraded: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_job_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn on_page_extracted(&self, file_num: usize, page_num: usize, blocks: usize) {
        self.bar.println(format!(
            "  {} File {file_num:>2} page {page_num:>3}  {}",
            green("✓"),
            dim(&format!("{blocks} blocks")),
        ));
    }

    fn on_unit_error(&self, file_num: usize, page_num: Option<usize>, error: &str) {
        self.degraded.fetch_add(1, Ordering::SeqCst);
        let location = match page_num {
            Some(p) => format!("File {file_num:>2} page {p:>3}"),
            None => format!("File {file_num:>2}"),
        };
        let msg: String = if error.chars().count() > 80 {
            let mut short: String = error.chars().take(79).collect();
            short.push('\u{2026}');
            short
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {location}  {}", red("✗"), red(&msg)));
    }

    fn on_fallback(&self, file_num: usize, lines: usize) {
        self.bar.println(format!(
            "  {} File {file_num:>2}  no tables, {} OCR lines",
            cyan("⚠"),
            lines
        ));
    }

    fn on_file_complete(&self, _file_num: usize, _total_files: usize) {
        self.bar.inc(1);
    }

    fn on_job_complete(&self, total_files: usize, sheets: usize) {
        self.bar.finish_and_clear();
        let degraded = self.degraded.load(Ordering::SeqCst);
        eprintln!(
            "{} {} file(s) → {} sheet(s){}",
            if degraded == 0 { green("✔") } else { cyan("⚠") },
            bold(&total_files.to_string()),
            bold(&sheets.to_string()),
            if degraded == 0 {
                String::new()
            } else {
                format!("  ({} degraded)", red(&degraded.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Standard conversion: one sheet per file
  doc2sheet convert invoice.png receipts.pdf

  # Every table on every page, copied to a local file
  doc2sheet convert --mode advanced scan.pdf -o scan.xlsx

  # Let the task description pick the mode
  doc2sheet convert --mode auto --task "scanned form with merged cells" form.jpg

  # Show which mode a task would use
  doc2sheet route "two handwritten pages"

  # Fetch a previous result by its file id
  doc2sheet download ADV_6f1c... -o result.xlsx

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium
"#;

/// Convert scanned documents and PDFs into formatted Excel workbooks.
#[derive(Parser, Debug)]
#[command(
    name = "doc2sheet",
    version,
    about = "Convert scanned documents and PDFs into formatted Excel workbooks",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2SHEET_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC2SHEET_QUIET")]
    quiet: bool,

    /// Directory where finished workbooks are kept.
    #[arg(long, global = true, env = "DOC2SHEET_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert files into one workbook.
    Convert(ConvertArgs),

    /// Print the mode a task description routes to, as JSON.
    Route {
        /// Free-text task description.
        task: String,
    },

    /// Copy a saved workbook out by its file id.
    Download {
        /// File id printed by `convert` (`<uuid>` or `ADV_<uuid>`).
        file_id: String,

        /// Destination path. Default: the configured download filename.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// Image or PDF files.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Decomposition mode.
    #[arg(long, env = "DOC2SHEET_MODE", value_enum, default_value = "standard")]
    mode: ModeArg,

    /// Task description used by `--mode auto`.
    #[arg(long, env = "DOC2SHEET_TASK", default_value = "")]
    task: String,

    /// Also copy the workbook to this path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Uploader identity recorded in the job log.
    #[arg(long, env = "DOC2SHEET_USER")]
    user: Option<String>,

    /// Directory where inputs are staged.
    #[arg(long, env = "DOC2SHEET_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// PDF pages analysed per file in standard mode.
    #[arg(long, env = "DOC2SHEET_STANDARD_PAGES", default_value_t = 2)]
    standard_pages: usize,

    /// PDF pages analysed per file in advanced mode (default: all).
    #[arg(long, env = "DOC2SHEET_ADVANCED_PAGES")]
    advanced_pages: Option<usize>,

    /// Longest edge of a rendered PDF page in pixels.
    #[arg(long, env = "DOC2SHEET_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Files processed concurrently.
    #[arg(short, long, env = "DOC2SHEET_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-page engine timeout in seconds.
    #[arg(long, env = "DOC2SHEET_PAGE_TIMEOUT")]
    page_timeout: Option<u64>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOC2SHEET_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens per page.
    #[arg(long, env = "DOC2SHEET_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries per engine call on LLM failure.
    #[arg(long, env = "DOC2SHEET_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Print the full ConversionOutput as JSON.
    #[arg(long, env = "DOC2SHEET_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOC2SHEET_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Standard,
    Advanced,
    Auto,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are hidden while the progress bar is active.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
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

    match cli.command {
        Command::Route { ref task } => {
            let decision = route_task(task);
            println!(
                "{}",
                serde_json::to_string_pretty(&decision).context("Failed to serialise decision")?
            );
        }
        Command::Download {
            ref file_id,
            ref output,
        } => {
            let config = ConversionConfig::builder()
                .output_dir(cli.output_dir.clone())
                .build()
                .context("Invalid configuration")?;
            let staging = edgequake_doc2sheet::job::Staging::new(
                config.upload_dir.clone(),
                config.output_dir.clone(),
            );
            let source = staging
                .resolve_download(file_id)
                .await
                .context("Download failed")?;
            let dest = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.download_filename));
            tokio::fs::copy(&source, &dest)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), bold(&dest.display().to_string()));
            }
        }
        Command::Convert(ref args) => {
            run_convert(&cli, args, show_progress).await?;
        }
    }

    Ok(())
}

async fn run_convert(cli: &Cli, args: &ConvertArgs, show_progress: bool) -> Result<()> {
    let mode = match args.mode {
        ModeArg::Standard => ConversionMode::Standard,
        ModeArg::Advanced => ConversionMode::Advanced,
        ModeArg::Auto => {
            let decision = route_task(&args.task);
            if !cli.quiet {
                eprintln!("{} {}", cyan("◆"), decision.message);
            }
            decision.mode
        }
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, args, progress_cb)?;
    let engine_config = VisionEngineConfig {
        model: args.model.clone(),
        provider_name: args.provider.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        max_retries: args.max_retries,
        ..Default::default()
    };
    let converter =
        Converter::with_vision_engine(config, engine_config).context("Failed to set up engine")?;

    let uploads = read_uploads(&args.files, args.user.as_deref()).await?;
    let output = converter
        .convert(mode, uploads)
        .await
        .context("Conversion failed")?;

    if let Some(ref dest) = args.output {
        tokio::fs::copy(&output.path, dest)
            .await
            .with_context(|| format!("Failed to copy workbook to {}", dest.display()))?;
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else {
        println!("{}", output.file_id);
        if !cli.quiet {
            print_summary(&output, args.output.as_deref());
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    cli: &Cli,
    args: &ConvertArgs,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .upload_dir(args.upload_dir.clone())
        .output_dir(cli.output_dir.clone())
        .standard_max_pages(args.standard_pages)
        .advanced_max_pages(args.advanced_pages)
        .max_rendered_pixels(args.max_pixels)
        .concurrency(args.concurrency);

    if let Some(secs) = args.page_timeout {
        builder = builder.page_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_uploads(paths: &[PathBuf], user: Option<&str>) -> Result<Vec<Upload>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let upload = Upload::new(name, bytes);
        uploads.push(match user {
            Some(u) => upload.with_user(u),
            None => upload,
        });
    }
    Ok(uploads)
}

fn print_summary(output: &ConversionOutput, copied_to: Option<&Path>) {
    let stats = &output.stats;
    eprintln!(
        "   {} sheets: {}",
        output.mode,
        dim(&output.sheet_names.join(", "))
    );
    eprintln!(
        "   {} pages  {} tables  {} text regions  {} fallback  {}ms",
        stats.pages, stats.tables, stats.text_regions, stats.fallback_files, stats.duration_ms
    );
    eprintln!(
        "   saved {}",
        bold(&output.path.display().to_string())
    );
    if let Some(dest) = copied_to {
        eprintln!("   copied to {}", bold(&dest.display().to_string()));
    }
}
