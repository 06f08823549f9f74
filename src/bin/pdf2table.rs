//! CLI binary for edgequake-pdf2table.
//!
//! `extract` runs the pipeline on one PDF and prints `{"data": [...]}`;
//! `serve` starts the HTTP endpoint.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2table::server::{self, AppState, ServerConfig};
use edgequake_pdf2table::{
    extract_tables, extract_to_file, ExtractionConfig, ExtractionStats, HeaderAlignment,
    PageSelection,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transactions from the first two pages (default), compact JSON on stdout
  pdf2table extract statement.pdf

  # Whole document, headerless continuation pages relabelled by position
  pdf2table extract --pages all --alignment by-position statement.pdf --pretty

  # Same, but only relabel fragments with the same column count as the header
  pdf2table extract --pages all --alignment by-position --schema-guard statement.pdf

  # Write to a file and print run statistics
  pdf2table extract statement.pdf -o rows.json --stats

  # HTTP service on 0.0.0.0:8000
  pdf2table serve
  curl -F "file=@statement.pdf;type=application/pdf" http://localhost:8000/process-pdf

ENVIRONMENT VARIABLES:
  PDF2TABLE_PAGES          Default page selection (all, 5, 1-2, 1,3,5)
  PDF2TABLE_ALIGNMENT      by-label or by-position
  PDF2TABLE_SCHEMA_GUARD   Refuse positional relabelling on width mismatch
  PDF2TABLE_PASSWORD       PDF user password
  PDF2TABLE_HOST / HOST    Bind address for `serve`
  PDF2TABLE_PORT / PORT    Bind port for `serve`
  PDFIUM_LIB_PATH          Path to an existing libpdfium, skips auto-download
  PDFIUM_AUTO_CACHE_DIR    Override the default pdfium cache directory
  RUST_LOG                 Override the log filter (e.g. edgequake_pdf2table=debug)
"#;

/// Extract transaction tables from PDF statements as JSON.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2table",
    version,
    about = "Extract transaction tables from PDF statements as JSON",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2TABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2TABLE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract tables from one PDF file or URL.
    Extract {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Write JSON to this file instead of stdout.
        #[arg(short, long, env = "PDF2TABLE_OUTPUT")]
        output: Option<PathBuf>,

        /// Pretty-print JSON on stdout.
        #[arg(long)]
        pretty: bool,

        /// Print run statistics as JSON on stderr.
        #[arg(long)]
        stats: bool,

        #[command(flatten)]
        extraction: ExtractionArgs,
    },

    /// Serve `POST /process-pdf` over HTTP.
    Serve {
        /// Bind address. Falls back to $HOST, then 0.0.0.0.
        #[arg(long, env = "PDF2TABLE_HOST")]
        host: Option<String>,

        /// Bind port. Falls back to $PORT, then 8000.
        #[arg(long, env = "PDF2TABLE_PORT")]
        port: Option<u16>,

        /// Largest accepted upload in MiB.
        #[arg(long, env = "PDF2TABLE_MAX_UPLOAD_MB", default_value_t = 50,
              value_parser = clap::value_parser!(u64).range(1..=1024))]
        max_upload_mb: u64,

        #[command(flatten)]
        extraction: ExtractionArgs,
    },
}

#[derive(Args, Debug)]
struct ExtractionArgs {
    /// Page selection: all, 5, 1-2, or 1,3,5.
    #[arg(long, env = "PDF2TABLE_PAGES", default_value = "1-2")]
    pages: String,

    /// How fragments without recognisable headers are treated.
    #[arg(long, env = "PDF2TABLE_ALIGNMENT", value_enum, default_value = "by-label")]
    alignment: AlignmentArg,

    /// With by-position, only relabel fragments as wide as the first header.
    #[arg(long, env = "PDF2TABLE_SCHEMA_GUARD")]
    schema_guard: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TABLE_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2TABLE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum AlignmentArg {
    ByLabel,
    ByPosition,
}

impl From<AlignmentArg> for HeaderAlignment {
    fn from(v: AlignmentArg) -> Self {
        match v {
            AlignmentArg::ByLabel => HeaderAlignment::ByLabel,
            AlignmentArg::ByPosition => HeaderAlignment::ByPosition,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ensure PDFium engine is available ───────────────────────────────────
    // First run downloads the library (~30 MB) into the pdfium-auto cache.
    if !pdfium_auto::is_pdfium_cached() {
        if !cli.quiet {
            eprintln!("{}", dim("Downloading PDF engine (first run only)…"));
        }
        pdfium_auto::ensure_pdfium_library(None).context("Failed to download PDFium engine")?;
    }

    match cli.command {
        Command::Extract {
            input,
            output,
            pretty,
            stats,
            extraction,
        } => {
            let config = build_config(&extraction)?;
            tokio::runtime::Runtime::new()
                .context("Failed to start tokio runtime")?
                .block_on(run_extract(&input, output, pretty, stats, cli.quiet, &config))
        }
        Command::Serve {
            host,
            port,
            max_upload_mb,
            extraction,
        } => {
            let config = build_config(&extraction)?;
            let defaults = ServerConfig::default();
            let server_config = ServerConfig {
                host: host
                    .or_else(|| std::env::var("HOST").ok())
                    .unwrap_or(defaults.host),
                port: match port {
                    Some(p) => p,
                    None => match std::env::var("PORT") {
                        Ok(p) => p.parse().with_context(|| format!("Invalid PORT value '{p}'"))?,
                        Err(_) => defaults.port,
                    },
                },
                max_upload_bytes: (max_upload_mb as usize) * 1024 * 1024,
            };

            let state = AppState::new(config, server_config.max_upload_bytes);
            actix_web::rt::System::new()
                .block_on(server::serve(server_config, state))
                .context("HTTP server failed")
        }
    }
}

async fn run_extract(
    input: &str,
    output: Option<PathBuf>,
    pretty: bool,
    print_stats: bool,
    quiet: bool,
    config: &ExtractionConfig,
) -> Result<()> {
    let stats = if let Some(ref output_path) = output {
        let stats = extract_to_file(input, output_path, config)
            .await
            .context("Extraction failed")?;

        if !quiet {
            eprintln!(
                "{}  {} records  {}ms  →  {}",
                green("✔"),
                stats.normalize.records,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        stats
    } else {
        let result = extract_tables(input, config).await.context("Extraction failed")?;

        let envelope = result.envelope();
        let json = if pretty {
            serde_json::to_string_pretty(&envelope)
        } else {
            serde_json::to_string(&envelope)
        }
        .context("Failed to serialise output")?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
        result.stats
    };

    if print_stats {
        print_stats_json(&stats)?;
    }
    Ok(())
}

fn print_stats_json(stats: &ExtractionStats) -> Result<()> {
    let json = serde_json::to_string_pretty(stats).context("Failed to serialise stats")?;
    eprintln!("{json}");
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(args: &ExtractionArgs) -> Result<ExtractionConfig> {
    let pages: PageSelection = args.pages.parse().context("Invalid --pages value")?;

    let mut builder = ExtractionConfig::builder()
        .pages(pages)
        .alignment(args.alignment.clone().into())
        .schema_guard(args.schema_guard)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }

    let config = builder.build().context("Invalid configuration")?;
    info!(
        "Pages {}, header alignment {}{}",
        config.pages,
        config.alignment,
        if config.schema_guard { " (schema guard on)" } else { "" }
    );
    Ok(config)
}
