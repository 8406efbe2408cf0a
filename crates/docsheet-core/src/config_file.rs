use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::OcrConfig;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub ocr: Option<OcrSection>,
    pub export: Option<ExportSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrSection {
    pub enabled: Option<bool>,
    pub language: Option<String>,
    pub dpi: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub tesseract_path: Option<String>,
    pub temp_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSection {
    /// `xlsx`, `csv` or `json`.
    pub format: Option<String>,
}

/// Platform config directory path: `<config_dir>/docsheet/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("docsheet").join("config.toml"))
}

/// Load config by cascading CWD `.docsheet.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".docsheet.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let bo = base.ocr.unwrap_or_default();
    let oo = overlay.ocr.unwrap_or_default();
    let be = base.export.unwrap_or_default();
    let oe = overlay.export.unwrap_or_default();

    ConfigFile {
        ocr: Some(OcrSection {
            enabled: oo.enabled.or(bo.enabled),
            language: oo.language.or(bo.language),
            dpi: oo.dpi.or(bo.dpi),
            timeout_secs: oo.timeout_secs.or(bo.timeout_secs),
            tesseract_path: oo.tesseract_path.or(bo.tesseract_path),
            temp_dir: oo.temp_dir.or(bo.temp_dir),
        }),
        export: Some(ExportSection {
            format: oe.format.or(be.format),
        }),
    }
}

impl ConfigFile {
    /// Resolve the `[ocr]` section over [`OcrConfig::default`].
    pub fn ocr_config(&self) -> OcrConfig {
        let defaults = OcrConfig::default();
        let Some(ocr) = &self.ocr else {
            return defaults;
        };
        OcrConfig {
            enabled: ocr.enabled.unwrap_or(defaults.enabled),
            language: ocr.language.clone().unwrap_or(defaults.language),
            dpi: ocr.dpi.filter(|d| *d > 0).unwrap_or(defaults.dpi),
            timeout: ocr
                .timeout_secs
                .filter(|t| *t > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            tesseract_path: ocr
                .tesseract_path
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(defaults.tesseract_path),
            temp_dir: ocr.temp_dir.as_ref().map(PathBuf::from),
        }
    }

    pub fn export_format(&self) -> Option<&str> {
        self.export.as_ref().and_then(|e| e.format.as_deref())
    }
}
