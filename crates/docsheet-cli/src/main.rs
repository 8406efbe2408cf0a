use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use docsheet_ingest::{ExportFormat, Pipeline};

mod output;
mod settings;

use output::{ColorMode, DocReport, Outcome};
use settings::OcrFlags;

/// Convert citation exports, resumes and PDFs into spreadsheets
#[derive(Parser, Debug)]
#[command(name = "docsheet", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract records from documents and write one sheet per input
    Convert {
        /// .bib, .ris, .nbib, .enw, .xml or .pdf files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (single input only)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: xlsx, csv or json
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Directory for outputs (default: next to each input)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Documents processed at once (default: available cores)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Never fall back to OCR for PDFs without a text layer
        #[arg(long)]
        no_ocr: bool,

        /// Tesseract language, e.g. eng or eng+deu
        #[arg(long)]
        ocr_lang: Option<String>,

        /// Seconds before an OCR run is abandoned
        #[arg(long)]
        ocr_timeout: Option<u64>,

        /// Print the extracted records instead of writing files
        #[arg(long)]
        dry_run: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Show how each input would be classified
    Classify {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn color_mode(no_color: bool) -> ColorMode {
    ColorMode(!no_color && std::io::stdout().is_terminal())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Classify { inputs, no_color } => classify(&inputs, color_mode(no_color)),
        Command::Convert {
            inputs,
            output,
            format,
            out_dir,
            jobs,
            no_ocr,
            ocr_lang,
            ocr_timeout,
            dry_run,
            no_color,
        } => {
            let flags = OcrFlags {
                no_ocr,
                language: ocr_lang,
                timeout_secs: ocr_timeout,
            };
            convert(ConvertArgs {
                inputs,
                output,
                format,
                out_dir,
                jobs,
                flags,
                dry_run,
                color: color_mode(no_color),
            })
            .await
        }
    }
}

fn classify(inputs: &[PathBuf], color: ColorMode) -> anyhow::Result<ExitCode> {
    let mut stdout = std::io::stdout().lock();
    for input in inputs {
        let kind = docsheet_ingest::classify(input);
        output::print_classification(&mut stdout, input, kind, color)?;
    }
    Ok(ExitCode::SUCCESS)
}

struct ConvertArgs {
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    format: Option<ExportFormat>,
    out_dir: Option<PathBuf>,
    jobs: Option<usize>,
    flags: OcrFlags,
    dry_run: bool,
    color: ColorMode,
}

async fn convert(args: ConvertArgs) -> anyhow::Result<ExitCode> {
    if args.output.is_some() && args.inputs.len() > 1 {
        anyhow::bail!("--output can only be used with a single input; use --out-dir instead");
    }

    let file_config = docsheet_core::config_file::load_config();
    let ocr_config =
        settings::resolve_ocr_config(&file_config, &args.flags, |key| std::env::var(key).ok());
    let format = settings::resolve_format(args.format, args.output.as_deref(), &file_config);

    if let Some(dir) = &args.out_dir
        && !args.dry_run
    {
        std::fs::create_dir_all(dir)?;
    }

    let jobs = args
        .jobs
        .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(4)
        .max(1);
    tracing::info!(
        inputs = args.inputs.len(),
        jobs,
        format = format.extension(),
        ocr = ocr_config.enabled,
        "starting conversion"
    );

    let destinations = match &args.output {
        Some(path) => vec![path.clone()],
        None => settings::plan_outputs(&args.inputs, args.out_dir.as_deref(), format)?,
    };

    let pipeline = Arc::new(Pipeline::new(ocr_config));
    let semaphore = Arc::new(Semaphore::new(jobs));

    // Stop scheduling new documents on Ctrl+C; in-flight ones finish.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
            }
        });
    }

    let bar = if args.inputs.len() > 1 && std::io::stderr().is_terminal() {
        let bar = ProgressBar::new(args.inputs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.green/dim}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut handles = Vec::with_capacity(args.inputs.len());
    for (input, dest) in args.inputs.into_iter().zip(destinations) {
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        if interrupted.load(Ordering::SeqCst) {
            drop(permit);
            handles.push(tokio::spawn(async move {
                DocReport {
                    input,
                    outcome: Outcome::Skipped,
                }
            }));
            continue;
        }

        let pipeline = Arc::clone(&pipeline);
        let dry_run = args.dry_run;
        let bar = bar.clone();
        let task_input = input.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            bar.set_message(input.display().to_string());
            let outcome = if dry_run {
                Outcome::from_result(pipeline.extract(&input), Outcome::Previewed)
            } else {
                Outcome::from_result(pipeline.process(&input, &dest, format), Outcome::Written)
            };
            bar.inc(1);
            DocReport { input, outcome }
        });
        handles.push(tokio::spawn(async move {
            match task.await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(path = %task_input.display(), error = %e, "conversion task panicked");
                    DocReport {
                        input: task_input,
                        outcome: Outcome::Crashed(e.to_string()),
                    }
                }
            }
        }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        reports.push(handle.await?);
    }
    bar.finish_and_clear();

    let mut stdout = std::io::stdout().lock();
    for report in &reports {
        output::print_outcome(&mut stdout, report, args.color)?;
    }
    if reports.len() > 1 {
        output::print_summary(&mut stdout, &reports, args.color)?;
    }
    stdout.flush()?;

    if reports.iter().any(|r| r.outcome.is_failure()) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
