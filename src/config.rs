//! Configuration types for document intake.
//!
//! All behaviour is controlled through [`IntakeConfig`], built via its
//! [`IntakeConfigBuilder`]. Policy constants (orientation keywords, the
//! rotation threshold, the template cell map, the company list) live here as
//! plain fields with defaults rather than literals scattered over the
//! pipeline.

use crate::error::IntakeError;
use crate::record::Field;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default vision model, cheap and good enough for passport fields.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for extraction and form filling.
///
/// # Example
/// ```rust
/// use edgequake_intake::IntakeConfig;
///
/// let config = IntakeConfig::builder()
///     .dpi(200)
///     .model("gpt-4o")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct IntakeConfig {
    /// Rendering DPI for PDF pages. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Cap on either rendered dimension in pixels. Default: 4000.
    ///
    /// 300 DPI on A4 gives 2480 × 3508 px; the cap only bites on oversized
    /// pages.
    pub max_rendered_pixels: u32,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the extraction call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 1024.
    pub max_tokens: usize,

    /// Optional timeout for the extraction call. Default: None (wait).
    pub api_timeout_secs: Option<u64>,

    /// Custom extraction prompt. If None, uses the built-in prompt.
    pub extraction_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Orientation detection policy.
    pub orientation: OrientationConfig,

    /// Companies the user may pick as form issuer.
    pub companies: Vec<CompanyConfig>,

    /// Spreadsheet template layout.
    pub template: TemplateConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 4000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 1024,
            api_timeout_secs: None,
            extraction_prompt: None,
            download_timeout_secs: 120,
            orientation: OrientationConfig::default(),
            companies: CompanyConfig::defaults(),
            template: TemplateConfig::default(),
        }
    }
}

impl fmt::Debug for IntakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("orientation", &self.orientation)
            .field("companies", &self.companies)
            .field("template", &self.template)
            .finish()
    }
}

impl IntakeConfig {
    /// Create a new builder for `IntakeConfig`.
    pub fn builder() -> IntakeConfigBuilder {
        IntakeConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Look up a configured company by id (case-insensitive).
    pub fn company(&self, id: &str) -> Option<&CompanyConfig> {
        let id = id.trim();
        self.companies.iter().find(|c| c.id.eq_ignore_ascii_case(id))
    }
}

/// Builder for [`IntakeConfig`].
#[derive(Debug)]
pub struct IntakeConfigBuilder {
    config: IntakeConfig,
}

impl IntakeConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn orientation(mut self, orientation: OrientationConfig) -> Self {
        self.config.orientation = orientation;
        self
    }

    pub fn rotation_threshold(mut self, threshold: f32) -> Self {
        self.config.orientation.rotation_threshold = threshold;
        self
    }

    pub fn companies(mut self, companies: Vec<CompanyConfig>) -> Self {
        self.config.companies = companies;
        self
    }

    pub fn forms_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.template.forms_dir = dir.into();
        self
    }

    pub fn template(mut self, template: TemplateConfig) -> Self {
        self.config.template = template;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IntakeConfig, IntakeError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(IntakeError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        let t = c.orientation.rotation_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(IntakeError::InvalidConfig(format!(
                "Rotation threshold must be within 0.0–1.0, got {}",
                t
            )));
        }
        if c.companies.is_empty() {
            return Err(IntakeError::InvalidConfig(
                "At least one company must be configured".into(),
            ));
        }
        for (i, company) in c.companies.iter().enumerate() {
            if company.id.trim().is_empty() {
                return Err(IntakeError::InvalidConfig("Company id cannot be empty".into()));
            }
            if c.companies[..i]
                .iter()
                .any(|other| other.id.eq_ignore_ascii_case(&company.id))
            {
                return Err(IntakeError::InvalidConfig(format!(
                    "Duplicate company id '{}'",
                    company.id
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Orientation ──────────────────────────────────────────────────────────

/// Keyword vocabularies and threshold for the OCR orientation heuristic.
///
/// Keywords are matched against upper-cased OCR text, so they must be upper
/// case themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationConfig {
    /// Markers of a passport page.
    pub passport_keywords: Vec<String>,
    /// Markers of a vehicle-registration certificate.
    pub plate_keywords: Vec<String>,
    /// Rotation happens only when confidence is strictly above this. Default: 0.5.
    pub rotation_threshold: f32,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            passport_keywords: owned(&[
                "PASSPORT",
                "PASPORT",
                "REPUBLIC",
                "SURNAME",
                "GIVEN NAMES",
                "NATIONALITY",
                "DATE OF BIRTH",
                "AUTHORITY",
                "DATE OF ISSUE",
                "P<",
            ]),
            plate_keywords: owned(&[
                "VEHICLE",
                "REGISTRATION",
                "CERTIFICATE",
                "TRANSPORT",
                "STATE NUMBER",
                "MODEL",
                "ENGINE",
                "CHASSIS",
                "BODY",
                "COLOR",
            ]),
            rotation_threshold: 0.5,
        }
    }
}

// ── Companies ────────────────────────────────────────────────────────────

/// A company that can issue the filled form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyConfig {
    /// Id used in template file names (`{id}_form.xlsx`).
    pub id: String,
    /// Human-readable label shown when asking the user to pick.
    pub label: String,
}

impl CompanyConfig {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// The three issuers the forms directory ships templates for.
    pub fn defaults() -> Vec<CompanyConfig> {
        vec![
            CompanyConfig::new("kedr", "Kedr"),
            CompanyConfig::new("chinwood", "Chinwood"),
            CompanyConfig::new("palisandr", "Palisandr"),
        ]
    }
}

// ── Template ─────────────────────────────────────────────────────────────

/// Where templates live and which cell receives which field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory holding `{company}_form.xlsx` and `{company}_logo.png`.
    pub forms_dir: PathBuf,
    /// Cell receiving today's date.
    pub issue_date_cell: String,
    /// Cell receiving the date the form stops being valid.
    pub valid_until_cell: String,
    /// Days between issue date and valid-until date. Default: 30.
    pub validity_days: i64,
    /// `chrono` format for both dates. Default: `%d/%m/%Y`.
    pub date_format: String,
    /// Cell → field assignments.
    pub cells: Vec<(String, Field)>,
    /// Range the company logo is anchored to. Default: `C44:D45`.
    pub logo_cell: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            forms_dir: PathBuf::from("forms"),
            issue_date_cell: "F10".into(),
            valid_until_cell: "F11".into(),
            validity_days: 30,
            date_format: "%d/%m/%Y".into(),
            cells: vec![
                ("L20".into(), Field::DriverName),
                ("E22".into(), Field::PassportSeries),
                ("J22".into(), Field::PassportNumber),
                ("E23".into(), Field::PassportAuthority),
                ("E24".into(), Field::PassportDateIssued),
                ("E25".into(), Field::NumberPlates),
                ("E28".into(), Field::VendorName),
            ],
            logo_cell: "C44:D45".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_constants() {
        let c = IntakeConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.orientation.rotation_threshold, 0.5);
        assert_eq!(c.model_or_default(), DEFAULT_MODEL);
        assert_eq!(c.companies.len(), 3);
        assert_eq!(c.template.cells.len(), Field::ALL.len());
    }

    #[test]
    fn builder_rejects_bad_dpi() {
        assert!(IntakeConfig::builder().dpi(50).build().is_err());
        assert!(IntakeConfig::builder().dpi(600).build().is_ok());
    }

    #[test]
    fn builder_rejects_out_of_range_threshold() {
        let err = IntakeConfig::builder().rotation_threshold(1.5).build();
        assert!(matches!(err, Err(IntakeError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_duplicate_companies() {
        let err = IntakeConfig::builder()
            .companies(vec![
                CompanyConfig::new("kedr", "Kedr"),
                CompanyConfig::new("KEDR", "Kedr again"),
            ])
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn company_lookup_is_case_insensitive() {
        let c = IntakeConfig::default();
        assert_eq!(c.company("Chinwood").map(|c| c.id.as_str()), Some("chinwood"));
        assert!(c.company("acme").is_none());
    }

    #[test]
    fn keywords_are_upper_case() {
        let o = OrientationConfig::default();
        for k in o.passport_keywords.iter().chain(o.plate_keywords.iter()) {
            assert_eq!(k, &k.to_uppercase());
        }
    }
}
