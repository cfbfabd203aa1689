//! Command line front end for layout-preserving PDF translation.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;
use translayout_core::{AppConfig, Device, DocumentTranslator, Lang};

/// Exit code reported after an interrupt, 128 + SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeviceOption {
    Auto,
    Cpu,
    Cuda,
    Mps,
}

impl From<DeviceOption> for Device {
    fn from(opt: DeviceOption) -> Self {
        match opt {
            DeviceOption::Auto => Self::Auto,
            DeviceOption::Cpu => Self::Cpu,
            DeviceOption::Cuda => Self::Cuda,
            DeviceOption::Mps => Self::Mps,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "translayout")]
#[command(author, version, about = "Translate PDF documents while preserving layout", long_about = None)]
struct Args {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output PDF file (default: <input>_translated.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source language code
    #[arg(short = 's', long, default_value = "en")]
    source: String,

    /// Target language code
    #[arg(short = 't', long, default_value = "hi")]
    target: String,

    /// Pages to translate, e.g. "all", "3", "2-5" or "1-3,7"
    #[arg(short = 'p', long, default_value = "all")]
    pages: String,

    /// Rasterization resolution for scanned documents
    #[arg(short = 'd', long, default_value_t = 200)]
    dpi: u32,

    /// Pages per OCR request
    #[arg(short = 'b', long, default_value_t = 4)]
    batch_size: usize,

    /// Compute device for the OCR models
    #[arg(long, value_enum, default_value = "auto")]
    device: DeviceOption,

    /// Translation API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// Translation API key
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Model name for the OpenAI-compatible API
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// OCR service endpoint
    #[arg(long)]
    ocr_endpoint: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    config.source_lang = Lang::new(&args.source);
    config.target_lang = Lang::new(&args.target);
    config.dpi = args.dpi;

    config.ocr.device = args.device.into();
    config.ocr.batch_pages = args.batch_size;
    if let Some(endpoint) = &args.ocr_endpoint {
        config.ocr.endpoint = endpoint.clone();
    }

    if let Some(api_base) = &args.api_base {
        config.translator.api_base = api_base.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.translator.api_key = Some(api_key.clone());
    }
    if let Some(model) = &args.model {
        config.translator.model = model.clone();
    }

    Ok(config)
}

fn default_output(input: &std::path::Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = input.extension().and_then(|e| e.to_str()).unwrap_or("pdf");
    input.with_file_name(format!("{stem}_translated.{ext}"))
}

fn stage_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(1);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

async fn run(args: Args) -> Result<()> {
    if args.input.extension().and_then(|e| e.to_str()) != Some("pdf") {
        warn!(
            "Input {} does not have a .pdf extension, attempting anyway",
            args.input.display()
        );
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));

    let config = build_config(&args)?;
    let translator =
        DocumentTranslator::new(config).context("Failed to initialize translator")?;

    let pb = stage_progress_bar();
    let pb_handle = pb.clone();
    #[allow(clippy::cast_possible_truncation)]
    let translator = translator.on_progress(Box::new(move |stage, current, total| {
        pb_handle.set_length(total as u64);
        pb_handle.set_position(current as u64);
        pb_handle.set_message(stage.to_string());
    }));

    translator
        .translate_file(&args.input, &output, &args.pages)
        .await
        .context(format!("Failed to translate {}", args.input.display()))?;

    pb.finish_with_message("Done");

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Translated PDF saved to: {}", output.display());
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tokio::select! {
        result = run(args) => {
            if let Err(e) = result {
                #[allow(clippy::print_stderr)]
                {
                    eprintln!("Error: {e:#}");
                }
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Interrupted");
            }
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}
