//! CLI binary for edgequake-intake.
//!
//! A thin shim over the library crate: `extract` prints records, `fill`
//! writes a form in one go, and `chat` drives the three-stage form flow from
//! stdin the way a chat front-end would.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_intake::{
    DocumentProcessor, IntakeConfig, Session, Stage, TemplateFiller, TextRecognizer,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the fields found in a passport photo
  intake extract passport.jpg

  # Several files, JSON output
  intake extract --json passport.pdf registration.jpg > fields.json

  # Fill the Kedr form straight away
  intake fill --company kedr --factory "Sawmill No. 3" passport.jpg registration.pdf -o out/

  # Interactive flow: /new_form, file paths, /done, company, factory name
  intake chat --forms-dir forms/

TEMPLATES:
  {forms-dir}/{company}_form.xlsx   template per company (required)
  {forms-dir}/{company}_logo.png    company logo (optional, inserted at C44)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  DOCINTAKE_PROVIDER      Provider name (openai, anthropic, gemini, ollama)
  DOCINTAKE_MODEL         Model ID
  DOCINTAKE_FORMS_DIR     Template directory
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise the system library)
  TESSDATA_PREFIX         Tesseract data directory (tesseract feature)

A .env file in the working directory is loaded at startup.
"#;

/// Extract passport and vehicle-registration fields and fill company forms.
#[derive(Parser, Debug)]
#[command(
    name = "intake",
    version,
    about = "Extract passport and vehicle-registration fields with Vision LLMs and fill company forms",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// LLM model ID (e.g. gpt-4o-mini, gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, global = true, env = "DOCINTAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "DOCINTAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF rendering DPI (72–600).
    #[arg(long, global = true, env = "DOCINTAKE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Directory holding `{company}_form.xlsx` templates.
    #[arg(long, global = true, env = "DOCINTAKE_FORMS_DIR", default_value = "forms")]
    forms_dir: PathBuf,

    /// Give up on the extraction call after this many seconds (default: wait).
    #[arg(long, global = true, env = "DOCINTAKE_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCINTAKE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCINTAKE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract fields from each input and print one record per file.
    Extract {
        /// Local files or HTTP/HTTPS URLs.
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Extract all inputs, merge them, and fill one company form.
    Fill {
        /// Issuing company id.
        #[arg(long)]
        company: String,

        /// Factory (vendor) name written into the form.
        #[arg(long)]
        factory: String,

        /// Local files or HTTP/HTTPS URLs.
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Directory for the filled form.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Drive the form flow interactively from stdin.
    Chat {
        /// Directory for filled forms.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.common.verbose {
        "debug"
    } else if cli.common.quiet {
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

    let config = build_config(&cli.common)?;
    let processor = DocumentProcessor::from_config(config, recognizer())
        .context("Failed to initialise the extraction client")?;
    let quiet = cli.common.quiet;

    match cli.command {
        Command::Extract { inputs, json } => run_extract(&processor, &inputs, json, quiet).await,
        Command::Fill {
            company,
            factory,
            inputs,
            output,
        } => run_fill(&processor, &company, &factory, &inputs, &output, quiet).await,
        Command::Chat { output } => run_chat(&processor, &output, quiet).await,
    }
}

/// Map CLI args to `IntakeConfig`.
fn build_config(args: &CommonArgs) -> Result<IntakeConfig> {
    let mut builder = IntakeConfig::builder()
        .dpi(args.dpi)
        .forms_dir(args.forms_dir.clone())
        .api_timeout_secs(args.api_timeout);
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    builder.build().context("Invalid configuration")
}

#[cfg(feature = "tesseract")]
fn recognizer() -> Option<Arc<dyn TextRecognizer>> {
    Some(Arc::new(
        edgequake_intake::pipeline::orient::TesseractRecognizer::default(),
    ))
}

#[cfg(not(feature = "tesseract"))]
fn recognizer() -> Option<Arc<dyn TextRecognizer>> {
    None
}

fn spinner(quiet: bool, message: String) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    Some(bar)
}

async fn run_extract(
    processor: &DocumentProcessor,
    inputs: &[String],
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mut entries = Vec::with_capacity(inputs.len());
    let mut failed = 0usize;

    for input in inputs {
        let bar = spinner(quiet || json, format!("Reading {input}…"));
        let result = processor.process_input(input).await;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        match result {
            Ok(record) => {
                if json {
                    entries.push(serde_json::json!({ "input": input, "record": record }));
                } else {
                    println!("{} {}", green("✓"), bold(input));
                    print!("{record}");
                    println!();
                }
            }
            Err(e) => {
                failed += 1;
                if json {
                    entries.push(serde_json::json!({ "input": input, "error": e.to_string() }));
                } else {
                    println!("{} {}  {}", red("✗"), bold(input), red(&e.to_string()));
                }
            }
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Failed to serialise records")?
        );
    } else if !quiet && inputs.len() > 1 {
        eprintln!(
            "{}",
            dim(&format!("{} of {} file(s) extracted", inputs.len() - failed, inputs.len()))
        );
    }
    Ok(())
}

async fn run_fill(
    processor: &DocumentProcessor,
    company: &str,
    factory: &str,
    inputs: &[String],
    out_dir: &Path,
    quiet: bool,
) -> Result<()> {
    let mut session = Session::new(processor.config().companies.clone());
    session.start();

    for input in inputs {
        let bar = spinner(quiet, format!("Reading {input}…"));
        let result = processor.process_input(input).await;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        match result {
            Ok(record) => {
                session.add_record(record)?;
            }
            Err(e) => {
                eprintln!("{} {}  {}", red("✗"), input, e);
                session.add_failure(e.to_string())?;
            }
        }
    }

    session.finish_files()?;
    session.choose_company(company)?;
    let request = session.enter_factory(factory)?;

    let filler = TemplateFiller::new(processor.config().template.clone());
    let path = filler
        .fill(&request.company.id, &request.record, out_dir)
        .with_context(|| format!("Failed to fill the {} form", request.company.label))?;
    println!("{} {}", green("✓"), path.display());
    Ok(())
}

async fn run_chat(processor: &DocumentProcessor, out_dir: &Path, quiet: bool) -> Result<()> {
    let mut session = Session::new(processor.config().companies.clone());
    let filler = TemplateFiller::new(processor.config().template.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Send /new_form to start a form, /cancel to drop it, /quit to exit.");

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        info!("[{}] {}", session.stage(), text);

        match text {
            "/quit" | "/exit" => break,
            "/start" => {
                println!("Send passport and vehicle registration files; I fill the company form.");
                continue;
            }
            "/new_form" => {
                session.start();
                println!("Please send the required documents. Send /done when you are finished.");
                continue;
            }
            "/cancel" => {
                session.reset();
                println!("Form cancelled.");
                continue;
            }
            _ => {}
        }

        match session.stage() {
            Stage::Idle => println!("Start a new form with /new_form"),

            Stage::CollectingFiles if text == "/done" => match session.finish_files() {
                Ok(_) => {
                    println!("{}", bold("📄 Extracted Data:"));
                    for (i, record) in session.records().iter().enumerate() {
                        println!("File {}:\n{}", i + 1, record);
                    }
                    println!("Choose issuing company:");
                    for company in session.companies() {
                        println!("  {}  {}", bold(&company.id), dim(&company.label));
                    }
                }
                Err(e) => println!("{}", e),
            },

            Stage::CollectingFiles => {
                let bar = spinner(quiet, format!("Reading {text}…"));
                let result = processor.process_input(text).await;
                if let Some(bar) = bar {
                    bar.finish_and_clear();
                }
                match result {
                    Ok(record) => {
                        let count = session.add_record(record)?;
                        println!(
                            "{} File received and processed ({count} so far). \
                             Send more files or /done when finished.",
                            green("✅")
                        );
                    }
                    Err(e) => {
                        println!("{} Error processing file: {}", red("❌"), e);
                        session.add_failure(e.to_string())?;
                    }
                }
            }

            Stage::ChoosingCompany => match session.choose_company(text) {
                Ok(company) => println!("Selected: {}\n\nNow enter factory name:", company.label),
                Err(e) => println!("{}", e),
            },

            Stage::EnteringFactory => match session.enter_factory(text) {
                Ok(request) => {
                    match filler.fill(&request.company.id, &request.record, out_dir) {
                        Ok(path) => println!(
                            "{} Filled form for {}: {}",
                            green("✅"),
                            request.record.get(edgequake_intake::Field::VendorName),
                            path.display()
                        ),
                        Err(e) => println!("{} Error processing forms: {}", red("❌"), e),
                    }
                }
                Err(e) => println!("{}", e),
            },
        }
    }

    if session.stage() != Stage::Idle {
        eprintln!("{}", dim(&format!("Unfinished form dropped ({}).", session.stage())));
    }
    Ok(())
}
