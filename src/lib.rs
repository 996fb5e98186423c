//! # edgequake-intake
//!
//! Extract passport and vehicle-registration fields from photos and PDFs
//! with a vision language model, then fill a per-company spreadsheet form.
//!
//! ## Why this crate?
//!
//! Driver paperwork arrives as phone photos taken at any angle and as
//! scanned PDFs. Rather than maintaining a field-level OCR pipeline, every
//! page is turned upright and handed to a VLM in a single request; the
//! model's JSON answer is folded into one canonical [`DocumentRecord`] where
//! every field is always present.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file / URL
//!  │
//!  ├─ 1. Input    classify by extension, download URLs
//!  ├─ 2. Render   rasterise PDF pages via pdfium (spawn_blocking)
//!  ├─ 3. Orient   EXIF tag, else OCR keyword scoring over 4 rotations
//!  ├─ 4. Encode   page → base64 ImageData
//!  ├─ 5. VLM      one call with the prompt and all pages
//!  └─ 6. Fold     strip fences, parse JSON, merge into DocumentRecord
//! ```
//!
//! A [`Session`] collects records over a conversation and a
//! [`TemplateFiller`] writes the final form.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_intake::{DocumentProcessor, IntakeConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let processor = DocumentProcessor::from_config(IntakeConfig::default(), None)?;
//!     let record = processor.process_file(Path::new("passport.jpg")).await?;
//!     println!("{}", record);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `intake` binary (clap + anyhow + tracing-subscriber) |
//! | `tesseract` | off     | OCR orientation fallback via libtesseract |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod session;
pub mod template;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CompanyConfig, IntakeConfig, IntakeConfigBuilder, OrientationConfig, TemplateConfig};
pub use error::{IntakeError, SessionError};
pub use extract::DocumentProcessor;
pub use pipeline::llm::{ExtractionClient, LlmExtractionClient};
pub use pipeline::orient::{OrientationDecision, OrientationDetector, Rotation, TextRecognizer};
pub use record::{DocumentRecord, Field, NOT_EXTRACTED};
pub use session::{FormRequest, Session, Stage};
pub use template::TemplateFiller;
