//! Per-company spreadsheet form filling.
//!
//! Each company ships a template `{forms_dir}/{company}_form.xlsx`. Filling
//! writes the issue / valid-until dates and every mapped record field into
//! the first worksheet, anchors `{forms_dir}/{company}_logo.png` at the
//! configured logo range when the file exists, then saves a copy as
//! `{out_dir}/{company}_form_filled.xlsx`. The template itself is never
//! modified. `edit_xlsx` is used so the template's styles survive the round
//! trip.

use crate::config::TemplateConfig;
use crate::error::IntakeError;
use crate::record::{is_meaningful, DocumentRecord};
use chrono::{Duration, Local, NaiveDate};
use edit_xlsx::{Workbook, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fills company templates from a [`DocumentRecord`].
#[derive(Debug, Clone)]
pub struct TemplateFiller {
    config: TemplateConfig,
}

impl TemplateFiller {
    pub fn new(config: TemplateConfig) -> Self {
        Self { config }
    }

    pub fn template_path(&self, company: &str) -> PathBuf {
        self.config.forms_dir.join(format!("{}_form.xlsx", company))
    }

    pub fn logo_path(&self, company: &str) -> PathBuf {
        self.config.forms_dir.join(format!("{}_logo.png", company))
    }

    /// Fill the template for `company`, dated today.
    pub fn fill(
        &self,
        company: &str,
        record: &DocumentRecord,
        out_dir: &Path,
    ) -> Result<PathBuf, IntakeError> {
        self.fill_on(company, record, out_dir, Local::now().date_naive())
    }

    /// Fill the template for `company` with `issued` as the issue date.
    pub fn fill_on(
        &self,
        company: &str,
        record: &DocumentRecord,
        out_dir: &Path,
        issued: NaiveDate,
    ) -> Result<PathBuf, IntakeError> {
        let template = self.template_path(company);
        if !template.is_file() {
            return Err(IntakeError::MissingTemplate { path: template });
        }
        let output = out_dir.join(format!("{}_form_filled.xlsx", company));
        let write_failed = |detail: String| IntakeError::TemplateWrite {
            path: output.clone(),
            detail,
        };

        let mut workbook = Workbook::from_path(&template)
            .map_err(|e| write_failed(format!("cannot open template: {}", e)))?;
        let sheet = workbook
            .get_worksheet_mut(1)
            .map_err(|e| write_failed(format!("template has no worksheet: {}", e)))?;

        let valid_until = issued + Duration::days(self.config.validity_days);
        let dates = [
            (&self.config.issue_date_cell, issued),
            (&self.config.valid_until_cell, valid_until),
        ];
        for (cell, date) in dates {
            sheet
                .write_string(cell, date.format(&self.config.date_format).to_string())
                .map_err(|e| write_failed(format!("{}: {}", cell, e)))?;
        }

        for (cell, field) in &self.config.cells {
            let value = record.get(*field);
            if !is_meaningful(value) {
                warn!("Missing data for '{}'", field);
            }
            debug!("{} ← {} = {:?}", cell, field, value);
            sheet
                .write_string(cell, value.to_string())
                .map_err(|e| write_failed(format!("{}: {}", cell, e)))?;
        }

        let logo = self.logo_path(company);
        if logo.is_file() {
            sheet
                .insert_image(self.config.logo_cell.as_str(), &logo)
                .map_err(|e| write_failed(format!("logo {}: {}", logo.display(), e)))?;
            debug!("Logo anchored at {}", self.config.logo_cell);
        } else {
            warn!("Logo not found: {}", logo.display());
        }

        std::fs::create_dir_all(out_dir).map_err(|e| write_failed(e.to_string()))?;
        workbook
            .save_as(&output)
            .map_err(|e| write_failed(e.to_string()))?;

        info!("Filled form for '{}' → {}", company, output.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Field, NOT_EXTRACTED};
    use edit_xlsx::Read;

    fn filler(forms_dir: &Path) -> TemplateFiller {
        TemplateFiller::new(TemplateConfig {
            forms_dir: forms_dir.to_path_buf(),
            ..TemplateConfig::default()
        })
    }

    fn blank_template(forms_dir: &Path, company: &str) {
        let mut workbook = Workbook::new();
        workbook
            .get_worksheet_mut(1)
            .unwrap()
            .write_string(&"A1".to_string(), "Driver form".to_string())
            .unwrap();
        workbook
            .save_as(forms_dir.join(format!("{}_form.xlsx", company)))
            .unwrap();
    }

    fn zip_entries(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    fn text_at(path: &Path, cell: &str) -> Option<String> {
        let workbook = Workbook::from_path(path).unwrap();
        let sheet = workbook.get_worksheet(1).unwrap();
        sheet.read_cell(&cell.to_string()).ok().and_then(|c| c.text)
    }

    #[test]
    fn missing_template_is_fatal() {
        let forms = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let err = filler(forms.path())
            .fill("kedr", &DocumentRecord::empty(), out.path())
            .unwrap_err();
        match err {
            IntakeError::MissingTemplate { path } => {
                assert!(path.ends_with("kedr_form.xlsx"), "{}", path.display())
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fills_mapped_cells_and_dates() {
        let forms = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        blank_template(forms.path(), "kedr");

        let mut record = DocumentRecord::empty();
        record.set(Field::DriverName, "Ivanov Ivan Ivanovich");
        record.set(Field::PassportNumber, "AB1234567");
        record.set(Field::NumberPlates, "01A123BB/01A456CC");
        record.set(Field::VendorName, "Sawmill No. 3");

        let issued = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let path = filler(forms.path())
            .fill_on("kedr", &record, out.path(), issued)
            .unwrap();

        assert_eq!(path, out.path().join("kedr_form_filled.xlsx"));
        assert_eq!(text_at(&path, "F10").as_deref(), Some("15/01/2024"));
        assert_eq!(text_at(&path, "F11").as_deref(), Some("14/02/2024"));
        assert_eq!(text_at(&path, "L20").as_deref(), Some("Ivanov Ivan Ivanovich"));
        assert_eq!(text_at(&path, "J22").as_deref(), Some("AB1234567"));
        assert_eq!(text_at(&path, "E25").as_deref(), Some("01A123BB/01A456CC"));
        assert_eq!(text_at(&path, "E28").as_deref(), Some("Sawmill No. 3"));
        assert_eq!(text_at(&path, "E23").as_deref(), Some(NOT_EXTRACTED));
        assert_eq!(text_at(&path, "A1").as_deref(), Some("Driver form"));
    }

    #[test]
    fn template_is_left_untouched() {
        let forms = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        blank_template(forms.path(), "palisandr");
        let before = std::fs::read(forms.path().join("palisandr_form.xlsx")).unwrap();

        filler(forms.path())
            .fill("palisandr", &DocumentRecord::empty(), out.path())
            .unwrap();

        let after = std::fs::read(forms.path().join("palisandr_form.xlsx")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn logo_is_inserted_when_present() {
        let forms = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        blank_template(forms.path(), "kedr");
        image::RgbImage::from_pixel(16, 8, image::Rgb([20, 90, 40]))
            .save(forms.path().join("kedr_logo.png"))
            .unwrap();

        let path = filler(forms.path())
            .fill("kedr", &DocumentRecord::empty(), out.path())
            .unwrap();

        let entries = zip_entries(&path);
        assert!(entries.iter().any(|n| n.contains("xl/media/")), "{entries:?}");
        assert!(entries.iter().any(|n| n.contains("xl/drawings/")), "{entries:?}");

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let rels_name = entries
            .iter()
            .find(|n| n.contains("xl/drawings/_rels/"))
            .unwrap()
            .clone();
        let mut rels = String::new();
        std::io::Read::read_to_string(&mut archive.by_name(&rels_name).unwrap(), &mut rels).unwrap();
        assert!(rels.contains("../media/image"), "{rels}");
    }

    #[test]
    fn missing_logo_only_warns() {
        let forms = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        blank_template(forms.path(), "chinwood");

        let path = filler(forms.path())
            .fill("chinwood", &DocumentRecord::empty(), out.path())
            .unwrap();

        let entries = zip_entries(&path);
        assert!(!entries.iter().any(|n| n.contains("xl/media/")), "{entries:?}");
    }
}
