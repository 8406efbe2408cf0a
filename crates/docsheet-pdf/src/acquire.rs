//! Two-stage PDF text acquisition.
//!
//! Native text-layer extraction runs first. Only when it yields nothing
//! (empty, whitespace-only, or a backend error) is page 1 rasterized into a
//! per-call scratch directory and handed to the OCR engine. The scratch
//! directory is removed before [`TextAcquirer::acquire`] returns, on every
//! path.

use std::path::Path;

use docsheet_core::{OcrConfig, OcrEngine, PageRasterizer, PdfBackend, PdfStage};

/// Acquisition state. `Extracted` and `Empty` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Start,
    NativeText(String),
    NeedsOcr,
    Extracted { text: String, stage: PdfStage },
    Empty,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Extracted { .. } | Stage::Empty)
    }
}

/// Text acquired from a PDF, with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfText {
    pub text: String,
    pub stage: PdfStage,
}

impl PdfText {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            stage: PdfStage::None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stage == PdfStage::None
    }
}

/// Runs the native → OCR acquisition over borrowed collaborators.
pub struct TextAcquirer<'a> {
    backend: &'a dyn PdfBackend,
    rasterizer: &'a dyn PageRasterizer,
    ocr: &'a dyn OcrEngine,
    config: &'a OcrConfig,
}

impl<'a> TextAcquirer<'a> {
    pub fn new(
        backend: &'a dyn PdfBackend,
        rasterizer: &'a dyn PageRasterizer,
        ocr: &'a dyn OcrEngine,
        config: &'a OcrConfig,
    ) -> Self {
        Self {
            backend,
            rasterizer,
            ocr,
            config,
        }
    }

    /// Acquire the text of `pdf`. Never fails: a document with no text from
    /// either stage yields [`PdfText::empty`].
    pub fn acquire(&self, pdf: &Path) -> PdfText {
        let mut stage = Stage::Start;
        while !stage.is_terminal() {
            stage = self.advance(pdf, stage);
        }
        match stage {
            Stage::Extracted { text, stage } => PdfText { text, stage },
            _ => PdfText::empty(),
        }
    }

    /// Perform one transition.
    pub fn advance(&self, pdf: &Path, stage: Stage) -> Stage {
        match stage {
            Stage::Start => match self.backend.extract_text(pdf) {
                Ok(text) if !text.trim().is_empty() => Stage::NativeText(text),
                Ok(_) => {
                    tracing::debug!(pdf = %pdf.display(), "no text layer, falling back to OCR");
                    Stage::NeedsOcr
                }
                Err(e) => {
                    tracing::warn!(pdf = %pdf.display(), error = %e, "native extraction failed, falling back to OCR");
                    Stage::NeedsOcr
                }
            },
            Stage::NativeText(text) => Stage::Extracted {
                text,
                stage: PdfStage::Native,
            },
            Stage::NeedsOcr => match self.ocr_first_page(pdf) {
                Some(text) if !text.trim().is_empty() => Stage::Extracted {
                    text,
                    stage: PdfStage::Ocr,
                },
                _ => Stage::Empty,
            },
            terminal => terminal,
        }
    }

    /// Rasterize page 1 into a fresh scratch directory and OCR it.
    /// Failures are logged and reported as `None`.
    fn ocr_first_page(&self, pdf: &Path) -> Option<String> {
        if !self.config.enabled {
            tracing::debug!(pdf = %pdf.display(), "OCR disabled");
            return None;
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("docsheet-ocr-");
        let scratch = match &self.config.temp_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        };
        let scratch = match scratch {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(error = %e, "could not create OCR scratch directory");
                return None;
            }
        };

        let text = self.rasterize_and_recognize(pdf, scratch.path());

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(path = %scratch_path.display(), error = %e, "failed to remove OCR scratch directory");
        }
        text
    }

    fn rasterize_and_recognize(&self, pdf: &Path, scratch: &Path) -> Option<String> {
        let image = scratch.join("page-1.png");

        if let Err(e) = self
            .rasterizer
            .rasterize_first_page(pdf, self.config.dpi, &image)
        {
            tracing::warn!(pdf = %pdf.display(), error = %e, "rasterization failed");
            return None;
        }

        match self.ocr.recognize(&image) {
            Ok(text) => {
                tracing::debug!(pdf = %pdf.display(), chars = text.len(), "OCR complete");
                Some(text)
            }
            Err(e) => {
                tracing::warn!(pdf = %pdf.display(), error = %e, "OCR failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use docsheet_core::{BackendError, OcrError};

    struct FakeBackend {
        text: Result<String, ()>,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn with_text(text: &str) -> Self {
            Self {
                text: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                text: Err(()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PdfBackend for FakeBackend {
        fn extract_text(&self, _path: &Path) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.text
                .clone()
                .map_err(|_| BackendError::OpenError("corrupt".into()))
        }
    }

    #[derive(Default)]
    struct FakeRasterizer {
        fail: bool,
        calls: AtomicUsize,
        last_dest: Mutex<Option<PathBuf>>,
    }

    impl PageRasterizer for FakeRasterizer {
        fn rasterize_first_page(
            &self,
            _pdf: &Path,
            _dpi: u32,
            dest: &Path,
        ) -> Result<(), BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_dest.lock().unwrap() = Some(dest.to_path_buf());
            if self.fail {
                return Err(BackendError::RasterizeError("boom".into()));
            }
            std::fs::write(dest, b"not really a png")?;
            Ok(())
        }
    }

    struct FakeOcr {
        result: Result<String, ()>,
        calls: AtomicUsize,
        saw_image: Mutex<bool>,
    }

    impl FakeOcr {
        fn returning(text: &str) -> Self {
            Self {
                result: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                saw_image: Mutex::new(false),
            }
        }

        fn failing() -> Self {
            Self {
                result: Err(()),
                calls: AtomicUsize::new(0),
                saw_image: Mutex::new(false),
            }
        }
    }

    impl OcrEngine for FakeOcr {
        fn recognize(&self, image: &Path) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.saw_image.lock().unwrap() = image.exists();
            self.result.clone().map_err(|_| OcrError::Failed {
                status: "exit status: 1".into(),
                stderr: "bad image".into(),
            })
        }
    }

    fn pdf() -> &'static Path {
        Path::new("scan.pdf")
    }

    #[test]
    fn test_text_layer_skips_ocr() {
        let backend = FakeBackend::with_text("Experience\nEngineer");
        let raster = FakeRasterizer::default();
        let ocr = FakeOcr::returning("never used");
        let config = OcrConfig::default();

        let result = TextAcquirer::new(&backend, &raster, &ocr, &config).acquire(pdf());

        assert_eq!(result.stage, PdfStage::Native);
        assert_eq!(result.text, "Experience\nEngineer");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(raster.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_text_layer_runs_ocr_once_and_cleans_up() {
        let backend = FakeBackend::with_text("  \n\t ");
        let raster = FakeRasterizer::default();
        let ocr = FakeOcr::returning("Scanned words");
        let config = OcrConfig::default();

        let result = TextAcquirer::new(&backend, &raster, &ocr, &config).acquire(pdf());

        assert_eq!(result.stage, PdfStage::Ocr);
        assert_eq!(result.text, "Scanned words");
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
        assert!(*ocr.saw_image.lock().unwrap(), "OCR should see the rendered image");

        let image = raster.last_dest.lock().unwrap().clone().unwrap();
        assert!(!image.exists(), "temp image left behind: {}", image.display());
        assert!(!image.parent().unwrap().exists(), "scratch dir left behind");
    }

    #[test]
    fn test_ocr_failure_still_cleans_up() {
        let backend = FakeBackend::with_text("");
        let raster = FakeRasterizer::default();
        let ocr = FakeOcr::failing();
        let config = OcrConfig::default();

        let result = TextAcquirer::new(&backend, &raster, &ocr, &config).acquire(pdf());

        assert!(result.is_empty());
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
        let image = raster.last_dest.lock().unwrap().clone().unwrap();
        assert!(!image.exists());
        assert!(!image.parent().unwrap().exists());
    }

    #[test]
    fn test_rasterize_failure_skips_ocr() {
        let backend = FakeBackend::with_text("");
        let raster = FakeRasterizer {
            fail: true,
            ..Default::default()
        };
        let ocr = FakeOcr::returning("unused");
        let config = OcrConfig::default();

        let result = TextAcquirer::new(&backend, &raster, &ocr, &config).acquire(pdf());

        assert!(result.is_empty());
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
        let dest = raster.last_dest.lock().unwrap().clone().unwrap();
        assert!(!dest.parent().unwrap().exists());
    }

    #[test]
    fn test_backend_error_falls_back_to_ocr() {
        let backend = FakeBackend::failing();
        let raster = FakeRasterizer::default();
        let ocr = FakeOcr::returning("recovered");
        let config = OcrConfig::default();

        let result = TextAcquirer::new(&backend, &raster, &ocr, &config).acquire(pdf());
        assert_eq!(result.stage, PdfStage::Ocr);
        assert_eq!(result.text, "recovered");
    }

    #[test]
    fn test_blank_ocr_output_is_empty() {
        let backend = FakeBackend::with_text("");
        let raster = FakeRasterizer::default();
        let ocr = FakeOcr::returning("\n\n  ");
        let config = OcrConfig::default();

        let result = TextAcquirer::new(&backend, &raster, &ocr, &config).acquire(pdf());
        assert!(result.is_empty());
        assert_eq!(result, PdfText::empty());
    }

    #[test]
    fn test_ocr_disabled() {
        let backend = FakeBackend::with_text("");
        let raster = FakeRasterizer::default();
        let ocr = FakeOcr::returning("unused");
        let config = OcrConfig {
            enabled: false,
            ..OcrConfig::default()
        };

        let result = TextAcquirer::new(&backend, &raster, &ocr, &config).acquire(pdf());
        assert!(result.is_empty());
        assert_eq!(raster.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scratch_created_in_configured_dir() {
        let root = tempfile::tempdir().unwrap();
        let backend = FakeBackend::with_text("");
        let raster = FakeRasterizer::default();
        let ocr = FakeOcr::returning("text");
        let config = OcrConfig {
            temp_dir: Some(root.path().to_path_buf()),
            ..OcrConfig::default()
        };

        TextAcquirer::new(&backend, &raster, &ocr, &config).acquire(pdf());

        let dest = raster.last_dest.lock().unwrap().clone().unwrap();
        assert!(dest.starts_with(root.path()));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_advance_transitions() {
        let backend = FakeBackend::with_text("hello");
        let raster = FakeRasterizer::default();
        let ocr = FakeOcr::returning("");
        let config = OcrConfig::default();
        let acq = TextAcquirer::new(&backend, &raster, &ocr, &config);

        let s = acq.advance(pdf(), Stage::Start);
        assert_eq!(s, Stage::NativeText("hello".into()));
        let s = acq.advance(pdf(), s);
        assert_eq!(
            s,
            Stage::Extracted {
                text: "hello".into(),
                stage: PdfStage::Native
            }
        );
        assert!(s.is_terminal());
        assert_eq!(acq.advance(pdf(), Stage::Empty), Stage::Empty);
    }

    #[test]
    fn test_concurrent_calls_use_distinct_scratch_dirs() {
        let backend = FakeBackend::with_text("");
        let ocr = FakeOcr::returning("text");
        let config = OcrConfig::default();

        let dests: Vec<PathBuf> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let raster = FakeRasterizer::default();
                        TextAcquirer::new(&backend, &raster, &ocr, &config).acquire(pdf());
                        let dest = raster.last_dest.lock().unwrap().clone().unwrap();
                        dest
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut unique = dests.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), dests.len());
    }
}
