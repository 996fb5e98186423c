//! Orientation detection: decide how far to rotate a page before extraction.
//!
//! Phone photos of passports arrive sideways or upside down more often than
//! not. Two signals are consulted, in order:
//!
//! 1. **EXIF orientation** — when the camera recorded one of the four pure
//!    rotations it is trusted unconditionally (confidence 1.0).
//! 2. **OCR keyword score** — otherwise each of 0°, 90°, 180°, 270° is tried,
//!    the page text is recognised, and the rotation whose text contains the
//!    largest share of passport or registration keywords wins.
//!
//! Nothing here returns an error: a page we cannot reason about is simply
//! left as it is (`0°`, confidence `0.0`).

use crate::config::OrientationConfig;
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Clockwise rotation applied to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Candidates in evaluation order; the first maximum wins ties.
    pub const CANDIDATES: [Rotation; 4] = [
        Rotation::None,
        Rotation::Cw90,
        Rotation::Cw180,
        Rotation::Cw270,
    ];

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }

    pub fn apply(self, img: &DynamicImage) -> DynamicImage {
        match self {
            Rotation::None => img.clone(),
            Rotation::Cw90 => img.rotate90(),
            Rotation::Cw180 => img.rotate180(),
            Rotation::Cw270 => img.rotate270(),
        }
    }
}

/// Rotation to apply plus how sure we are about it (0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationDecision {
    pub rotation: Rotation,
    pub confidence: f32,
}

impl OrientationDecision {
    /// "No signal": leave the page alone.
    pub const UNKNOWN: OrientationDecision = OrientationDecision {
        rotation: Rotation::None,
        confidence: 0.0,
    };

    pub fn angle(&self) -> u16 {
        self.rotation.degrees()
    }

    /// True iff the page should actually be rotated.
    pub fn should_rotate(&self, threshold: f32) -> bool {
        self.rotation != Rotation::None && self.confidence > threshold
    }
}

/// Text recognition failed for a page.
#[derive(Debug, Error)]
#[error("text recognition failed: {0}")]
pub struct RecognitionError(pub String);

/// Plain-text OCR over an in-memory image.
///
/// Implementations are called from `spawn_blocking`, never from async code.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, RecognitionError>;
}

/// Detects page orientation from EXIF metadata, falling back to OCR.
#[derive(Clone)]
pub struct OrientationDetector {
    config: OrientationConfig,
    recognizer: Option<Arc<dyn TextRecognizer>>,
}

impl OrientationDetector {
    pub fn new(config: OrientationConfig, recognizer: Option<Arc<dyn TextRecognizer>>) -> Self {
        Self { config, recognizer }
    }

    /// EXIF only; pages without a usable tag are left unrotated.
    pub fn exif_only(config: OrientationConfig) -> Self {
        Self::new(config, None)
    }

    pub fn config(&self) -> &OrientationConfig {
        &self.config
    }

    /// Decide the rotation for the image file at `path`. Blocking.
    pub fn detect_path(&self, path: &Path) -> OrientationDecision {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!("Orientation: cannot read {}: {}", path.display(), e);
                return OrientationDecision::UNKNOWN;
            }
        };
        self.detect_bytes(&bytes)
    }

    /// Decide the rotation for an encoded image. Blocking.
    pub fn detect_bytes(&self, bytes: &[u8]) -> OrientationDecision {
        if let Some(decision) = exif_decision(bytes) {
            debug!("Orientation from EXIF: {}°", decision.angle());
            return decision;
        }
        if self.recognizer.is_none() {
            return OrientationDecision::UNKNOWN;
        }
        match image::load_from_memory(bytes) {
            Ok(img) => self.detect_by_text(&img),
            Err(e) => {
                warn!("Orientation: cannot decode image: {}", e);
                OrientationDecision::UNKNOWN
            }
        }
    }

    /// OCR heuristic over the four candidate rotations.
    pub fn detect_by_text(&self, img: &DynamicImage) -> OrientationDecision {
        let Some(recognizer) = self.recognizer.as_ref() else {
            return OrientationDecision::UNKNOWN;
        };

        let mut best = OrientationDecision::UNKNOWN;
        for rotation in Rotation::CANDIDATES {
            let rotated = rotation.apply(img);
            let text = match recognizer.recognize(&rotated) {
                Ok(t) => t,
                Err(e) => {
                    warn!("Orientation: {} at {}°", e, rotation.degrees());
                    return OrientationDecision::UNKNOWN;
                }
            };
            let score = keyword_score(&text, &self.config);
            debug!("Orientation candidate {}° scored {:.2}", rotation.degrees(), score);
            if score > best.confidence {
                best = OrientationDecision {
                    rotation,
                    confidence: score,
                };
            }
        }
        best
    }
}

/// Map the EXIF orientation tag to a decision.
///
/// Only the pure rotations are used (1, 3, 6, 8); mirrored variants and a
/// missing or unreadable tag return `None` so the caller falls back to OCR.
pub fn exif_decision(bytes: &[u8]) -> Option<OrientationDecision> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let value = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))?;
    exif_rotation(value).map(|rotation| OrientationDecision {
        rotation,
        confidence: 1.0,
    })
}

/// EXIF orientation value → clockwise rotation that makes the image upright.
pub fn exif_rotation(value: u32) -> Option<Rotation> {
    match value {
        1 => Some(Rotation::None),
        3 => Some(Rotation::Cw180),
        6 => Some(Rotation::Cw90),
        8 => Some(Rotation::Cw270),
        _ => None,
    }
}

/// Best keyword hit ratio of `text` against either vocabulary.
pub fn keyword_score(text: &str, config: &OrientationConfig) -> f32 {
    let upper = text.to_uppercase();
    let ratio = |keywords: &[String]| -> f32 {
        if keywords.is_empty() {
            return 0.0;
        }
        let hits = keywords
            .iter()
            .filter(|k| upper.contains(k.as_str()))
            .count();
        hits as f32 / keywords.len() as f32
    };
    ratio(&config.passport_keywords).max(ratio(&config.plate_keywords))
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// [`TextRecognizer`] backed by libtesseract.
#[cfg(feature = "tesseract")]
pub struct TesseractRecognizer {
    datapath: Option<String>,
    language: String,
}

#[cfg(feature = "tesseract")]
impl TesseractRecognizer {
    /// `language` uses tesseract syntax, e.g. `"eng+rus"`.
    pub fn new(datapath: Option<String>, language: impl Into<String>) -> Self {
        Self {
            datapath,
            language: language.into(),
        }
    }
}

#[cfg(feature = "tesseract")]
impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new(std::env::var("TESSDATA_PREFIX").ok(), "eng+rus")
    }
}

#[cfg(feature = "tesseract")]
impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<String, RecognitionError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| RecognitionError(e.to_string()))?;

        let mut tess = tesseract::Tesseract::new(self.datapath.as_deref(), Some(&self.language))
            .map_err(|e| RecognitionError(format!("init: {}", e)))?
            .set_image_from_mem(&png)
            .map_err(|e| RecognitionError(format!("set image: {}", e)))?;
        tess.get_text()
            .map_err(|e| RecognitionError(format!("get text: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::sync::Mutex;

    /// Returns scripted text per call, in order.
    struct Scripted {
        texts: Mutex<Vec<Result<String, RecognitionError>>>,
    }

    impl Scripted {
        fn new(texts: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                texts: Mutex::new(texts.into_iter().rev().map(|t| Ok(t.to_string())).collect()),
            })
        }
    }

    impl TextRecognizer for Scripted {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, RecognitionError> {
            self.texts
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    struct Failing;

    impl TextRecognizer for Failing {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, RecognitionError> {
            Err(RecognitionError("engine missing".into()))
        }
    }

    fn page() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 2, Rgb([255, 255, 255])))
    }

    fn small_config() -> OrientationConfig {
        OrientationConfig {
            passport_keywords: vec!["PASSPORT".into(), "SURNAME".into()],
            plate_keywords: vec!["VEHICLE".into(), "ENGINE".into(), "MODEL".into(), "BODY".into()],
            rotation_threshold: 0.5,
        }
    }

    #[test]
    fn exif_values_map_to_rotations() {
        assert_eq!(exif_rotation(1), Some(Rotation::None));
        assert_eq!(exif_rotation(3), Some(Rotation::Cw180));
        assert_eq!(exif_rotation(6), Some(Rotation::Cw90));
        assert_eq!(exif_rotation(8), Some(Rotation::Cw270));
        for mirrored in [2, 4, 5, 7, 0, 9] {
            assert_eq!(exif_rotation(mirrored), None);
        }
    }

    #[test]
    fn png_without_exif_gives_no_metadata_decision() {
        let mut buf = Vec::new();
        page()
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        assert!(exif_decision(&buf).is_none());
        assert!(exif_decision(b"not an image").is_none());
    }

    #[test]
    fn score_is_best_of_both_vocabularies() {
        let c = small_config();
        // passport 1/2, plates 3/4
        let s = keyword_score("passport vehicle engine model", &c);
        assert!((s - 0.75).abs() < f32::EPSILON);
        assert_eq!(keyword_score("", &c), 0.0);
    }

    #[test]
    fn empty_vocabulary_scores_zero() {
        let c = OrientationConfig {
            passport_keywords: vec![],
            plate_keywords: vec![],
            rotation_threshold: 0.5,
        };
        assert_eq!(keyword_score("PASSPORT", &c), 0.0);
    }

    #[test]
    fn picks_highest_scoring_rotation() {
        let ocr = Scripted::new(vec!["", "passport", "PASSPORT SURNAME", "surname"]);
        let d = OrientationDetector::new(small_config(), Some(ocr)).detect_by_text(&page());
        assert_eq!(d.rotation, Rotation::Cw180);
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn ties_go_to_first_candidate() {
        let ocr = Scripted::new(vec!["", "PASSPORT", "SURNAME", "PASSPORT"]);
        let d = OrientationDetector::new(small_config(), Some(ocr)).detect_by_text(&page());
        assert_eq!(d.angle(), 90);
        assert_eq!(d.confidence, 0.5);
    }

    #[test]
    fn no_matches_anywhere_is_unknown() {
        let ocr = Scripted::new(vec!["lorem", "ipsum", "dolor", "sit"]);
        let d = OrientationDetector::new(small_config(), Some(ocr)).detect_by_text(&page());
        assert_eq!(d, OrientationDecision::UNKNOWN);
        assert!(!d.should_rotate(0.5));
    }

    #[test]
    fn ocr_failure_is_unknown() {
        let d = OrientationDetector::new(small_config(), Some(Arc::new(Failing)))
            .detect_by_text(&page());
        assert_eq!(d, OrientationDecision::UNKNOWN);
    }

    #[test]
    fn no_recognizer_is_unknown() {
        let d = OrientationDetector::exif_only(small_config()).detect_by_text(&page());
        assert_eq!(d, OrientationDecision::UNKNOWN);
    }

    #[test]
    fn rotate_threshold_is_strict() {
        let at = |confidence| OrientationDecision {
            rotation: Rotation::Cw90,
            confidence,
        };
        assert!(at(0.51).should_rotate(0.5));
        assert!(!at(0.5).should_rotate(0.5));
        let upright = OrientationDecision {
            rotation: Rotation::None,
            confidence: 1.0,
        };
        assert!(!upright.should_rotate(0.5));
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let img = page();
        assert_eq!(Rotation::Cw90.apply(&img).dimensions(), (2, 4));
        assert_eq!(Rotation::Cw180.apply(&img).dimensions(), (4, 2));
        assert_eq!(Rotation::from_degrees(270), Some(Rotation::Cw270));
        assert_eq!(Rotation::from_degrees(45), None);
    }
    /// Reads passport text only on the second call, i.e. at 90°.
    struct CountingReader {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl TextRecognizer for CountingReader {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, RecognitionError> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(if n == 1 { "PASSPORT SURNAME".into() } else { String::new() })
        }
    }

    impl CountingReader {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: std::sync::atomic::AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    /// A JPEG whose APP1 segment carries a big-endian EXIF Orientation tag.
    fn jpeg_with_orientation(value: u16) -> Vec<u8> {
        let mut jpeg = Vec::new();
        page()
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
        app1.extend_from_slice(b"Exif\0\0");
        app1.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
        app1.extend_from_slice(&[0x00, 0x01]);
        app1.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        app1.extend_from_slice(&value.to_be_bytes());
        app1.extend_from_slice(&[0x00, 0x00]);
        app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn exif_orientation_wins_over_ocr() {
        for (value, angle) in [(1u16, 0u16), (3, 180), (6, 90), (8, 270)] {
            let reader = CountingReader::new();
            let detector = OrientationDetector::new(small_config(), Some(reader.clone()));

            let d = detector.detect_bytes(&jpeg_with_orientation(value));
            assert_eq!(d.angle(), angle, "EXIF {value}");
            assert_eq!(d.confidence, 1.0, "EXIF {value}");
            assert_eq!(reader.calls(), 0, "OCR consulted for EXIF {value}");
        }
    }

    #[test]
    fn exif_orientation_is_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, jpeg_with_orientation(8)).unwrap();
        let reader = CountingReader::new();

        let d = OrientationDetector::new(small_config(), Some(reader.clone())).detect_path(&path);
        assert_eq!(d.rotation, Rotation::Cw270);
        assert_eq!(d.confidence, 1.0);
        assert_eq!(reader.calls(), 0);
    }

    #[test]
    fn mirrored_exif_falls_through_to_ocr() {
        let reader = CountingReader::new();
        let detector = OrientationDetector::new(small_config(), Some(reader.clone()));

        let d = detector.detect_bytes(&jpeg_with_orientation(2));
        assert_eq!(reader.calls(), 4);
        assert_eq!(d.angle(), 90);
    }
}
