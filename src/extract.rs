//! Per-file extraction: the entry point that drives every pipeline stage.
//!
//! [`DocumentProcessor::process_file`] turns one passport / registration
//! file into exactly one [`DocumentRecord`], or an [`IntakeError`] saying why
//! it could not. Intermediate page images live in a `TempDir` owned by the
//! call, so they are removed on every exit path.

use crate::config::IntakeConfig;
use crate::error::IntakeError;
use crate::pipeline::input::{self, FileKind};
use crate::pipeline::llm::{ExtractionClient, LlmExtractionClient};
use crate::pipeline::orient::{OrientationDetector, TextRecognizer};
use crate::pipeline::{encode, normalize, preprocess, render};
use crate::prompts::DEFAULT_EXTRACTION_PROMPT;
use crate::record::DocumentRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Runs files through the extraction pipeline, one at a time.
#[derive(Clone)]
pub struct DocumentProcessor {
    client: Arc<dyn ExtractionClient>,
    detector: OrientationDetector,
    config: IntakeConfig,
}

impl DocumentProcessor {
    /// Build a processor around an already constructed client.
    pub fn new(
        client: Arc<dyn ExtractionClient>,
        detector: OrientationDetector,
        config: IntakeConfig,
    ) -> Self {
        Self {
            client,
            detector,
            config,
        }
    }

    /// Resolve the LLM provider from `config` and the environment.
    ///
    /// `recognizer` enables the OCR orientation fallback; without it only
    /// EXIF metadata is consulted.
    pub fn from_config(
        config: IntakeConfig,
        recognizer: Option<Arc<dyn TextRecognizer>>,
    ) -> Result<Self, IntakeError> {
        let client = LlmExtractionClient::from_config(&config)?;
        let detector = OrientationDetector::new(config.orientation.clone(), recognizer);
        Ok(Self::new(Arc::new(client), detector, config))
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Extract one local file.
    pub async fn process_file(&self, path: &Path) -> Result<DocumentRecord, IntakeError> {
        let start = Instant::now();
        info!("Processing: {}", path.display());

        // ── Step 1: Classify ─────────────────────────────────────────────
        let kind = input::file_kind(path).ok_or_else(|| IntakeError::UnsupportedFileType {
            path: path.to_path_buf(),
        })?;
        if !path.is_file() {
            return Err(IntakeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let workdir = TempDir::new()
            .map_err(|e| IntakeError::Internal(format!("Failed to create work dir: {}", e)))?;

        // ── Step 2: Page set ─────────────────────────────────────────────
        let pages: Vec<PathBuf> = match kind {
            FileKind::Pdf => render::render_pages(path, &self.config, workdir.path()).await?,
            FileKind::Image => vec![path.to_path_buf()],
        };
        debug!("{} page(s) to submit", pages.len());

        // ── Step 3: Orientation ──────────────────────────────────────────
        let pages = preprocess::prepare_pages(pages, &self.detector, workdir.path()).await;

        // ── Step 4: Encode ───────────────────────────────────────────────
        let mut images = Vec::with_capacity(pages.len());
        for page in &pages {
            let image = encode::encode_file(page).map_err(|e| IntakeError::UnreadableImage {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            images.push(image);
        }

        // ── Step 5: Extract ──────────────────────────────────────────────
        let prompt = self
            .config
            .extraction_prompt
            .as_deref()
            .unwrap_or(DEFAULT_EXTRACTION_PROMPT);
        let response = self.client.extract(prompt, images).await?;

        // ── Step 6: Normalise ────────────────────────────────────────────
        let record = normalize::normalize_response(&response)?;

        let missing = record.missing_fields();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
            debug!("Not extracted from {}: {}", path.display(), names.join(", "));
        }
        info!(
            "Processed {} ({} page(s)) in {:?}",
            path.display(),
            pages.len(),
            start.elapsed()
        );
        Ok(record)
    }

    /// Extract a local path or an HTTP(S) URL.
    pub async fn process_input(&self, input_str: &str) -> Result<DocumentRecord, IntakeError> {
        let resolved = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        self.process_file(resolved.path()).await
    }

    /// Extract several inputs strictly one after another.
    ///
    /// One result per input, in input order; a failure never stops the batch.
    pub async fn process_batch<S: AsRef<str>>(
        &self,
        inputs: &[S],
    ) -> Vec<Result<DocumentRecord, IntakeError>> {
        let mut results = Vec::with_capacity(inputs.len());
        for item in inputs {
            let result = self.process_input(item.as_ref()).await;
            if let Err(ref e) = result {
                warn!("{}: {}", item.as_ref(), e);
            }
            results.push(result);
        }
        results
    }
}
