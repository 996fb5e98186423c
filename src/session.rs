//! The conversational form flow.
//!
//! A conversation moves through three stages after `/new_form`:
//!
//! ```text
//! Idle ──start──▶ CollectingFiles ──finish_files──▶ ChoosingCompany
//!   ▲                 │ add_record / add_failure          │ choose_company
//!   │                 ▼                                   ▼
//!   └──────────── enter_factory ◀──────────────── EnteringFactory
//! ```
//!
//! Every successfully extracted file is merged into one accumulated
//! [`DocumentRecord`]; `enter_factory` hands that record out as a
//! [`FormRequest`] and the session starts over. Nothing is shared between
//! sessions.

use crate::config::CompanyConfig;
use crate::error::SessionError;
use crate::record::{DocumentRecord, Field};
use std::fmt;
use tracing::debug;

/// Where the conversation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    CollectingFiles,
    ChoosingCompany,
    EnteringFactory,
}

impl Stage {
    /// What the user is expected to send in this stage.
    pub fn expects(self) -> &'static str {
        match self {
            Stage::Idle => "/new_form",
            Stage::CollectingFiles => "files or /done",
            Stage::ChoosingCompany => "a company",
            Stage::EnteringFactory => "a factory name",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::CollectingFiles => "collecting files",
            Stage::ChoosingCompany => "choosing company",
            Stage::EnteringFactory => "entering factory",
        };
        f.write_str(name)
    }
}

/// Everything needed to fill one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRequest {
    pub company: CompanyConfig,
    pub record: DocumentRecord,
}

/// One conversation's state.
#[derive(Debug, Clone)]
pub struct Session {
    companies: Vec<CompanyConfig>,
    stage: Stage,
    records: Vec<DocumentRecord>,
    failures: Vec<String>,
    accumulated: DocumentRecord,
    company: Option<CompanyConfig>,
}

impl Session {
    pub fn new(companies: Vec<CompanyConfig>) -> Self {
        Self {
            companies,
            stage: Stage::Idle,
            records: Vec::new(),
            failures: Vec::new(),
            accumulated: DocumentRecord::empty(),
            company: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn companies(&self) -> &[CompanyConfig] {
        &self.companies
    }

    /// The merge of every record added so far.
    pub fn accumulated(&self) -> &DocumentRecord {
        &self.accumulated
    }

    /// Per-file records, in the order they were added.
    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// `/new_form`: drop whatever was in progress and start collecting.
    pub fn start(&mut self) {
        self.reset();
        self.stage = Stage::CollectingFiles;
    }

    /// Add one extracted file. Returns the number of files processed so far.
    pub fn add_record(&mut self, record: DocumentRecord) -> Result<usize, SessionError> {
        self.require(Stage::CollectingFiles, "add_record")?;
        self.accumulated.merge_from(&record);
        self.records.push(record);
        debug!("Session holds {} record(s)", self.records.len());
        Ok(self.records.len())
    }

    /// Remember a file that could not be extracted.
    pub fn add_failure(&mut self, message: impl Into<String>) -> Result<(), SessionError> {
        self.require(Stage::CollectingFiles, "add_failure")?;
        self.failures.push(message.into());
        Ok(())
    }

    /// `/done`: stop collecting and move on to company selection.
    pub fn finish_files(&mut self) -> Result<&DocumentRecord, SessionError> {
        self.require(Stage::CollectingFiles, "finish_files")?;
        if self.records.is_empty() {
            return Err(SessionError::NoFiles);
        }
        self.stage = Stage::ChoosingCompany;
        Ok(&self.accumulated)
    }

    /// Pick the issuing company by id (case-insensitive).
    pub fn choose_company(&mut self, id: &str) -> Result<CompanyConfig, SessionError> {
        self.require(Stage::ChoosingCompany, "choose_company")?;
        let id = id.trim();
        let company = self
            .companies
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(id))
            .cloned()
            .ok_or_else(|| SessionError::UnknownCompany(id.to_string()))?;
        self.company = Some(company.clone());
        self.stage = Stage::EnteringFactory;
        Ok(company)
    }

    /// Enter the factory name; completes the flow and resets the session.
    pub fn enter_factory(&mut self, name: &str) -> Result<FormRequest, SessionError> {
        self.require(Stage::EnteringFactory, "enter_factory")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyFactoryName);
        }
        let Some(company) = self.company.take() else {
            return Err(SessionError::WrongStage {
                operation: "enter_factory",
                expected: Stage::ChoosingCompany.expects(),
            });
        };

        let mut record = std::mem::take(&mut self.accumulated);
        record.set(Field::VendorName, name);
        self.reset();
        Ok(FormRequest { company, record })
    }

    /// Back to idle with an empty accumulator.
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.records.clear();
        self.failures.clear();
        self.accumulated = DocumentRecord::empty();
        self.company = None;
    }

    fn require(&self, stage: Stage, operation: &'static str) -> Result<(), SessionError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(SessionError::WrongStage {
                operation,
                expected: self.stage.expects(),
            })
        }
    }
}
