//! Page preprocessing: apply orientation decisions to the page set.
//!
//! Given the page images of one document, decide per page whether to rotate
//! it, and if so write an upright copy into the scoped work directory. The
//! returned list has the same length and order as the input; a page that
//! could not be rotated is submitted as the original.

use crate::pipeline::orient::{OrientationDetector, Rotation};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rotate pages as needed and return the paths to submit for extraction.
///
/// Runs the OCR/rotation work inside `spawn_blocking`.
pub async fn prepare_pages(
    pages: Vec<PathBuf>,
    detector: &OrientationDetector,
    workdir: &Path,
) -> Vec<PathBuf> {
    let detector = detector.clone();
    let workdir = workdir.to_path_buf();
    let fallback = pages.clone();

    match tokio::task::spawn_blocking(move || prepare_pages_blocking(&pages, &detector, &workdir))
        .await
    {
        Ok(prepared) => prepared,
        Err(e) => {
            warn!("Preprocessing task panicked, submitting pages as-is: {}", e);
            fallback
        }
    }
}

/// Blocking implementation of [`prepare_pages`].
pub fn prepare_pages_blocking(
    pages: &[PathBuf],
    detector: &OrientationDetector,
    workdir: &Path,
) -> Vec<PathBuf> {
    let threshold = detector.config().rotation_threshold;

    pages
        .iter()
        .enumerate()
        .map(|(idx, page)| {
            let decision = detector.detect_path(page);
            debug!(
                "Page {}: {}° (confidence {:.2})",
                idx + 1,
                decision.angle(),
                decision.confidence
            );

            if !decision.should_rotate(threshold) {
                return page.clone();
            }

            match rotate_file(page, decision.rotation, workdir, idx) {
                Ok(rotated) => {
                    info!("Page {}: rotated {}°", idx + 1, decision.angle());
                    rotated
                }
                Err(e) => {
                    warn!(
                        "Page {}: rotation failed, using original: {}",
                        idx + 1,
                        e
                    );
                    page.clone()
                }
            }
        })
        .collect()
}

/// Write a rotated PNG copy of `path` into `workdir`.
pub fn rotate_file(
    path: &Path,
    rotation: Rotation,
    workdir: &Path,
    idx: usize,
) -> Result<PathBuf, image::ImageError> {
    let img = image::open(path)?;
    let rotated = rotation.apply(&img);

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("page");
    let out = workdir.join(format!("{}_{}_rot{}.png", stem, idx, rotation.degrees()));
    rotated.save(&out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrientationConfig;
    use crate::pipeline::orient::{RecognitionError, TextRecognizer};
    use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
    use std::sync::Arc;

    /// Reads as a passport only when the page is landscape.
    struct LandscapeIsUpright;

    impl TextRecognizer for LandscapeIsUpright {
        fn recognize(&self, image: &DynamicImage) -> Result<String, RecognitionError> {
            let (w, h) = image.dimensions();
            Ok(if w > h { "PASSPORT SURNAME".into() } else { String::new() })
        }
    }

    fn write_portrait(dir: &Path) -> PathBuf {
        let path = dir.join("scan.png");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 40, Rgb([200, 200, 200])))
            .save(&path)
            .unwrap();
        path
    }

    fn config() -> OrientationConfig {
        OrientationConfig {
            passport_keywords: vec!["PASSPORT".into(), "SURNAME".into()],
            plate_keywords: vec!["VEHICLE".into()],
            rotation_threshold: 0.5,
        }
    }

    #[test]
    fn confident_page_is_rotated_into_workdir() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let page = write_portrait(src.path());
        let detector = OrientationDetector::new(config(), Some(Arc::new(LandscapeIsUpright)));

        let out = prepare_pages_blocking(&[page.clone()], &detector, work.path());
        assert_eq!(out.len(), 1);
        assert_ne!(out[0], page);
        assert!(out[0].starts_with(work.path()));
        assert_eq!(image::open(&out[0]).unwrap().dimensions(), (40, 20));
    }

    #[test]
    fn unknown_orientation_passes_original_through() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let page = write_portrait(src.path());
        let detector = OrientationDetector::exif_only(config());

        let out = prepare_pages_blocking(&[page.clone()], &detector, work.path());
        assert_eq!(out, vec![page]);
    }

    #[test]
    fn rotation_failure_falls_back_to_original() {
        let src = tempfile::tempdir().unwrap();
        let page = write_portrait(src.path());
        let detector = OrientationDetector::new(config(), Some(Arc::new(LandscapeIsUpright)));
        let missing_workdir = src.path().join("does/not/exist");

        let out = prepare_pages_blocking(&[page.clone()], &detector, &missing_workdir);
        assert_eq!(out, vec![page]);
    }

    #[tokio::test]
    async fn async_wrapper_keeps_order() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let a = write_portrait(src.path());
        let b = src.path().join("second.png");
        std::fs::copy(&a, &b).unwrap();
        let detector = OrientationDetector::exif_only(config());

        let out = prepare_pages(vec![a.clone(), b.clone()], &detector, work.path()).await;
        assert_eq!(out, vec![a, b]);
    }
}
