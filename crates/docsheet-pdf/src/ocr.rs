use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use docsheet_core::{OcrConfig, OcrEngine, OcrError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// OCR engine backed by the `tesseract` command-line tool.
///
/// Each [`recognize`](OcrEngine::recognize) call is one subprocess. The
/// process is killed if it outlives the configured timeout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            timeout,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            config.tesseract_path.clone(),
            config.language.clone(),
            config.timeout,
        )
    }

    /// Resolve the binary on `PATH` (or check an explicit path).
    pub fn locate(&self) -> Result<PathBuf, OcrError> {
        which::which(&self.binary)
            .map_err(|e| OcrError::Unavailable(format!("{}: {e}", self.binary.display())))
    }

    pub fn is_available(&self) -> bool {
        self.locate().is_ok()
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        let binary = self.locate()?;
        // tesseract appends `.txt` to the output base.
        let out_base = image.with_extension("");
        let out_file = out_base.with_extension("txt");
        // stderr is read back from a file once the process exits.
        let err_file = out_base.with_extension("stderr.log");
        let stderr_sink = std::fs::File::create(&err_file)?;

        let mut child = Command::new(&binary)
            .arg(image)
            .arg(&out_base)
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_sink))
            .spawn()
            .map_err(|e| OcrError::Spawn(format!("{}: {e}", binary.display())))?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                let _ = std::fs::remove_file(&err_file);
                tracing::warn!(image = %image.display(), timeout = ?self.timeout, "tesseract timed out");
                return Err(OcrError::Timeout(self.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stderr = std::fs::read(&err_file)
            .map(|b| String::from_utf8_lossy(&b).trim().to_string())
            .unwrap_or_default();
        if let Err(e) = std::fs::remove_file(&err_file) {
            tracing::debug!(path = %err_file.display(), error = %e, "could not remove tesseract log");
        }

        if !status.success() {
            return Err(OcrError::Failed {
                status: status.to_string(),
                stderr,
            });
        }

        let bytes = std::fs::read(&out_file)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        tracing::debug!(image = %image.display(), chars = text.len(), lang = %self.language, "tesseract finished");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_unavailable() {
        let engine = TesseractCli::new(
            "/nonexistent/bin/tesseract-docsheet",
            "eng",
            Duration::from_secs(1),
        );
        assert!(!engine.is_available());
        let err = engine.recognize(Path::new("page.png")).unwrap_err();
        assert!(matches!(err, OcrError::Unavailable(_)), "got {err:?}");
    }

    #[test]
    fn test_from_config() {
        let config = OcrConfig {
            language: "deu".into(),
            timeout: Duration::from_secs(5),
            ..OcrConfig::default()
        };
        let engine = TesseractCli::from_config(&config);
        assert_eq!(engine.language, "deu");
        assert_eq!(engine.timeout, Duration::from_secs(5));
        assert_eq!(engine.binary, PathBuf::from("tesseract"));
    }

    #[cfg(unix)]
    fn fake_tesseract(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-tesseract");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_tesseract(dir.path(), r#"printf 'lang=%s\n' "$4" > "$2.txt""#);
        let image = dir.path().join("page-1.png");
        std::fs::write(&image, b"png").unwrap();

        let engine = TesseractCli::new(bin, "fra", Duration::from_secs(10));
        let text = engine.recognize(&image).unwrap();
        assert_eq!(text.trim(), "lang=fra");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_tesseract(dir.path(), "echo 'cannot read image' >&2\nexit 3");
        let engine = TesseractCli::new(bin, "eng", Duration::from_secs(10));

        let err = engine.recognize(&dir.path().join("page-1.png")).unwrap_err();
        match err {
            OcrError::Failed { stderr, .. } => assert!(stderr.contains("cannot read image")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_stderr_does_not_stall() {
        let dir = tempfile::tempdir().unwrap();
        // Far more than a pipe buffer holds.
        let bin = fake_tesseract(
            dir.path(),
            r#"head -c 300000 /dev/zero | tr '\0' 'w' >&2
printf 'done' > "$2.txt""#,
        );
        let image = dir.path().join("page-1.png");
        std::fs::write(&image, b"png").unwrap();

        let engine = TesseractCli::new(bin, "eng", Duration::from_secs(10));
        let started = Instant::now();
        let text = engine.recognize(&image).unwrap();
        assert_eq!(text, "done");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!dir.path().join("page-1.stderr.log").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_process_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_tesseract(dir.path(), "sleep 5");
        let engine = TesseractCli::new(bin, "eng", Duration::from_millis(200));

        let started = Instant::now();
        let err = engine.recognize(&dir.path().join("page-1.png")).unwrap_err();
        assert!(matches!(err, OcrError::Timeout(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
