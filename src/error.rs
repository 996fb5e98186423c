//! Error types for the edgequake-intake library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IntakeError`] — a file (or a form) could not be produced. Returned as
//!   `Err(IntakeError)` from [`crate::extract::DocumentProcessor`] and
//!   [`crate::template::TemplateFiller`]. The `Display` text is short enough
//!   to be shown to the user verbatim.
//!
//! * [`SessionError`] — the conversation was driven out of order (factory
//!   name before a company was picked, `/done` with no files). Nothing failed;
//!   the user is told what the flow expects next.
//!
//! Orientation and rotation problems are deliberately absent: they degrade to
//! "no rotation" inside the pipeline and are only logged.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the extraction and form-filling stages.
#[derive(Debug, Error)]
pub enum IntakeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The file extension is neither a PDF nor a supported raster format.
    #[error("Unsupported file type: '{path}'")]
    UnsupportedFileType { path: PathBuf },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// A page image could not be read or decoded for submission.
    #[error("Cannot read image '{path}': {detail}")]
    UnreadableImage { path: PathBuf, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open or render the document.
    #[error("Rasterisation failed for '{path}': {detail}")]
    RasterisationFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The extraction call itself failed (network, API, timeout).
    #[error("Extraction call failed: {message}")]
    ExternalCall { message: String },

    /// The model answered, but not with a structured record.
    #[error("Failed to parse extraction response: {detail}")]
    ResponseParse { detail: String },

    // ── Template errors ───────────────────────────────────────────────────
    /// No spreadsheet template exists for the requested company.
    #[error("Template file not found: '{path}'")]
    MissingTemplate { path: PathBuf },

    /// The template was found but could not be filled or saved.
    #[error("Failed to write form '{path}': {detail}")]
    TemplateWrite { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntakeError {
    /// True when the failure happened before any external call was made
    /// because of the input itself.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            IntakeError::UnsupportedFileType { .. }
                | IntakeError::FileNotFound { .. }
                | IntakeError::DownloadFailed { .. }
                | IntakeError::UnreadableImage { .. }
        )
    }
}

/// Misuse of the conversation flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The operation does not belong to the current stage.
    #[error("'{operation}' is not available now; expected: {expected}")]
    WrongStage {
        operation: &'static str,
        expected: &'static str,
    },

    /// `/done` was sent before any file was processed.
    #[error("No files were processed. Please send some files first.")]
    NoFiles,

    /// The company id is not one of the configured companies.
    #[error("Unknown company '{0}'")]
    UnknownCompany(String),

    /// The factory name was empty.
    #[error("Factory name cannot be empty. Please try again.")]
    EmptyFactoryName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_display_names_file() {
        let e = IntakeError::UnsupportedFileType {
            path: PathBuf::from("notes.docx"),
        };
        let msg = e.to_string();
        assert!(msg.contains("Unsupported file type"), "got: {msg}");
        assert!(msg.contains("notes.docx"));
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(IntakeError::UnsupportedFileType {
            path: PathBuf::from("a.txt")
        }
        .is_input_error());
        assert!(!IntakeError::ResponseParse {
            detail: "x".into()
        }
        .is_input_error());
    }

    #[test]
    fn unreadable_image_is_not_a_pdf_error() {
        let e = IntakeError::UnreadableImage {
            path: PathBuf::from("passport.jpg"),
            detail: "truncated".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("passport.jpg"), "got: {msg}");
        assert!(!msg.contains("Rasterisation"), "got: {msg}");
        assert!(e.is_input_error());
    }

    #[test]
    fn external_call_display_carries_message() {
        let e = IntakeError::ExternalCall {
            message: "connection reset".into(),
        };
        assert!(e.to_string().contains("connection reset"));
    }

    #[test]
    fn wrong_stage_display() {
        let e = SessionError::WrongStage {
            operation: "choose_company",
            expected: "files or /done",
        };
        assert!(e.to_string().contains("choose_company"));
        assert!(e.to_string().contains("/done"));
    }
}
