//! The extraction prompt sent with every document.
//!
//! Callers can override it via
//! [`crate::config::IntakeConfig::extraction_prompt`]; the constant here is
//! used only when no override is provided.

/// Default instruction for turning passport / vehicle-registration pages into
/// a JSON list of per-page records.
///
/// A single upload may mix a passport page and a registration page, so the
/// model is asked for one object per page rather than one merged object; the
/// normaliser folds them back together.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are reading identity and vehicle documents: passport pages and vehicle registration certificates.

Return a JSON array with one object per page image, in the order the images were given. Each object may contain only these keys:

{
  "driver_name": "full name from the passport: surname, given name and patronymic",
  "passport_series": "passport series",
  "passport_number": "passport number",
  "passport_authority": "issuing authority field from the passport",
  "passport_date_issued": "date of issue in DD/MM/YYYY format",
  "number_plates": "vehicle licence plate number(s) from the registration certificate, separated by /"
}

Rules:
- Only extract information that is clearly visible and readable.
- Omit a key, or set it to "N/A", when the value is not on that page.
- Return ONLY the JSON array. No commentary, no explanations."#;
