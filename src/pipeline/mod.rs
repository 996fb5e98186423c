//! Pipeline stages for document field extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without the others and without network access.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ orient/preprocess ──▶ encode ──▶ llm ──▶ normalize
//! (URL/path)  (pdfium)   (EXIF, OCR, rotate)   (base64)  (VLM)   (JSON → record)
//! ```
//!
//! 1. [`input`]      — classify the file, download URL inputs
//! 2. [`render`]     — rasterise every PDF page; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`orient`]     — decide each page's rotation (EXIF first, OCR second)
//! 4. [`preprocess`] — write upright copies of pages that need it
//! 5. [`encode`]     — base64-wrap each page for the multimodal request
//! 6. [`llm`]        — the single external call; the only stage with network
//!    I/O besides URL download
//! 7. [`normalize`]  — parse the response and fold it into one record

pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod orient;
pub mod preprocess;
pub mod render;
