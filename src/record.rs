//! The canonical document record.
//!
//! Every extraction produces exactly one [`DocumentRecord`], and every
//! [`Field`] is always present in it: fields the model could not read carry
//! [`NOT_EXTRACTED`] instead of being absent. The template filler can then
//! look up any mapped field without a missing-key case.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Value stored for a field nobody managed to extract.
pub const NOT_EXTRACTED: &str = "N/A";

/// Canonical record keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    DriverName,
    PassportSeries,
    PassportNumber,
    PassportAuthority,
    PassportDateIssued,
    NumberPlates,
    /// Factory name entered during the conversation; never asked of the model.
    VendorName,
}

impl Field {
    /// All fields in template order.
    pub const ALL: [Field; 7] = [
        Field::DriverName,
        Field::PassportSeries,
        Field::PassportNumber,
        Field::PassportAuthority,
        Field::PassportDateIssued,
        Field::NumberPlates,
        Field::VendorName,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::DriverName => "driver_name",
            Field::PassportSeries => "passport_series",
            Field::PassportNumber => "passport_number",
            Field::PassportAuthority => "passport_authority",
            Field::PassportDateIssued => "passport_date_issued",
            Field::NumberPlates => "number_plates",
            Field::VendorName => "vendor_name",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| format!("unknown field '{}'", s))
    }
}

/// True when `value` carries real data (non-blank, not the sentinel).
pub fn is_meaningful(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && v != NOT_EXTRACTED
}

/// Field → value mapping with every field present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRecord {
    values: BTreeMap<Field, String>,
}

impl Default for DocumentRecord {
    fn default() -> Self {
        Self::empty()
    }
}

impl DocumentRecord {
    /// A record where every field is [`NOT_EXTRACTED`].
    pub fn empty() -> Self {
        Self {
            values: Field::ALL
                .iter()
                .map(|f| (*f, NOT_EXTRACTED.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        self.values
            .get(&field)
            .map(String::as_str)
            .unwrap_or(NOT_EXTRACTED)
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn is_extracted(&self, field: Field) -> bool {
        is_meaningful(self.get(field))
    }

    /// Fields still holding the sentinel.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| !self.is_extracted(*f))
            .collect()
    }

    /// Overwrite this record with every meaningful value from `other`.
    pub fn merge_from(&mut self, other: &DocumentRecord) {
        for field in Field::ALL {
            let value = other.get(field);
            if is_meaningful(value) {
                self.set(field, value.trim());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        Field::ALL.iter().map(move |f| (*f, self.get(*f)))
    }
}

impl fmt::Display for DocumentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (field, value) in self.iter() {
            writeln!(f, "{}: {}", field, value)?;
        }
        Ok(())
    }
}
