use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use docsheet_core::OcrConfig;
use docsheet_core::config_file::ConfigFile;
use docsheet_reporting::ExportFormat;

/// OCR settings given on the command line. They beat the environment,
/// which beats the config file.
#[derive(Debug, Default, Clone)]
pub struct OcrFlags {
    pub no_ocr: bool,
    pub language: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Resolve OCR settings: config file, then `DOCSHEET_*` variables, then flags.
pub fn resolve_ocr_config(
    file: &ConfigFile,
    flags: &OcrFlags,
    env: impl Fn(&str) -> Option<String>,
) -> OcrConfig {
    let mut config = file.ocr_config();

    if let Some(lang) = env("DOCSHEET_OCR_LANG").filter(|v| !v.trim().is_empty()) {
        config.language = lang;
    }
    if let Some(secs) = env("DOCSHEET_OCR_TIMEOUT").and_then(|v| v.trim().parse::<u64>().ok())
        && secs > 0
    {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(bin) = env("DOCSHEET_TESSERACT").filter(|v| !v.trim().is_empty()) {
        config.tesseract_path = PathBuf::from(bin);
    }

    if flags.no_ocr {
        config.enabled = false;
    }
    if let Some(lang) = &flags.language {
        config.language = lang.clone();
    }
    if let Some(secs) = flags.timeout_secs.filter(|s| *s > 0) {
        config.timeout = Duration::from_secs(secs);
    }
    config
}

/// Pick the export format: explicit flag, then the `-o` extension, then the
/// config file, then XLSX.
pub fn resolve_format(
    flag: Option<ExportFormat>,
    output: Option<&Path>,
    file: &ConfigFile,
) -> ExportFormat {
    if let Some(format) = flag {
        return format;
    }
    if let Some(format) = output.and_then(ExportFormat::from_path) {
        return format;
    }
    match file.export_format().map(str::parse::<ExportFormat>) {
        Some(Ok(format)) => format,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "ignoring export format from config");
            ExportFormat::default()
        }
        None => ExportFormat::default(),
    }
}

/// `<out_dir or input dir>/<input stem>.<format extension>`.
pub fn output_path(input: &Path, out_dir: Option<&Path>, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{stem}.{}", format.extension());
    match out_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

/// `<out_dir or input dir>/<input file name>.<format extension>`, used when
/// the short name is shared with another input.
pub fn qualified_output_path(input: &Path, out_dir: Option<&Path>, format: ExportFormat) -> PathBuf {
    let name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{name}.{}", format.extension());
    match out_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

/// One destination per input. Inputs whose short names collide
/// (`refs.bib` and `refs.ris`) keep their extension in the output name;
/// anything still colliding is an error.
pub fn plan_outputs(
    inputs: &[PathBuf],
    out_dir: Option<&Path>,
    format: ExportFormat,
) -> anyhow::Result<Vec<PathBuf>> {
    let short: Vec<PathBuf> = inputs
        .iter()
        .map(|input| output_path(input, out_dir, format))
        .collect();
    let mut counts: HashMap<&Path, usize> = HashMap::new();
    for dest in &short {
        *counts.entry(dest.as_path()).or_default() += 1;
    }

    let planned: Vec<PathBuf> = inputs
        .iter()
        .zip(&short)
        .map(|(input, dest)| {
            if counts.get(dest.as_path()).copied().unwrap_or(0) > 1 {
                qualified_output_path(input, out_dir, format)
            } else {
                dest.clone()
            }
        })
        .collect();

    let mut seen = HashSet::new();
    for (input, dest) in inputs.iter().zip(&planned) {
        if !seen.insert(dest.as_path()) {
            anyhow::bail!(
                "{} would overwrite another output at {}",
                input.display(),
                dest.display()
            );
        }
    }
    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_ocr_defaults() {
        let config = resolve_ocr_config(&ConfigFile::default(), &OcrFlags::default(), env_from(&[]));
        assert_eq!(config, OcrConfig::default());
    }

    #[test]
    fn test_env_overrides_file_and_flags_override_env() {
        let file: ConfigFile =
            toml_from("[ocr]\nlanguage = \"fra\"\ntimeout_secs = 10\ntesseract_path = \"/opt/t\"\n");
        let env = env_from(&[("DOCSHEET_OCR_LANG", "deu"), ("DOCSHEET_OCR_TIMEOUT", "20")]);

        let config = resolve_ocr_config(&file, &OcrFlags::default(), &env);
        assert_eq!(config.language, "deu");
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.tesseract_path, PathBuf::from("/opt/t"));

        let flags = OcrFlags {
            no_ocr: true,
            language: Some("spa".into()),
            timeout_secs: Some(5),
        };
        let config = resolve_ocr_config(&file, &flags, &env);
        assert!(!config.enabled);
        assert_eq!(config.language, "spa");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bad_env_timeout_ignored() {
        let env = env_from(&[("DOCSHEET_OCR_TIMEOUT", "soon"), ("DOCSHEET_TESSERACT", "/usr/local/bin/tesseract")]);
        let config = resolve_ocr_config(&ConfigFile::default(), &OcrFlags::default(), env);
        assert_eq!(config.timeout, OcrConfig::default().timeout);
        assert_eq!(config.tesseract_path, PathBuf::from("/usr/local/bin/tesseract"));
    }

    #[test]
    fn test_format_precedence() {
        let file = toml_from("[export]\nformat = \"json\"\n");
        assert_eq!(
            resolve_format(Some(ExportFormat::Csv), Some(Path::new("o.xlsx")), &file),
            ExportFormat::Csv
        );
        assert_eq!(
            resolve_format(None, Some(Path::new("o.xlsx")), &file),
            ExportFormat::Xlsx
        );
        assert_eq!(resolve_format(None, None, &file), ExportFormat::Json);
        assert_eq!(
            resolve_format(None, None, &ConfigFile::default()),
            ExportFormat::Xlsx
        );
        let bad = toml_from("[export]\nformat = \"ods\"\n");
        assert_eq!(resolve_format(None, None, &bad), ExportFormat::Xlsx);
    }

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("in/refs.enw"), None, ExportFormat::Xlsx),
            PathBuf::from("in/refs.xlsx")
        );
        assert_eq!(
            output_path(Path::new("in/cv.pdf"), Some(Path::new("out")), ExportFormat::Csv),
            PathBuf::from("out/cv.csv")
        );
    }

    #[test]
    fn test_shared_stems_get_distinct_outputs() {
        let inputs = vec![
            PathBuf::from("in/refs.bib"),
            PathBuf::from("in/refs.ris"),
            PathBuf::from("in/cv.pdf"),
        ];
        let planned = plan_outputs(&inputs, None, ExportFormat::Xlsx).unwrap();
        assert_eq!(
            planned,
            vec![
                PathBuf::from("in/refs.bib.xlsx"),
                PathBuf::from("in/refs.ris.xlsx"),
                PathBuf::from("in/cv.xlsx"),
            ]
        );
    }

    #[test]
    fn test_unique_stems_keep_short_names() {
        let inputs = vec![PathBuf::from("a/refs.bib"), PathBuf::from("b/refs.bib")];
        let planned = plan_outputs(&inputs, None, ExportFormat::Csv).unwrap();
        assert_eq!(
            planned,
            vec![PathBuf::from("a/refs.csv"), PathBuf::from("b/refs.csv")]
        );
    }

    #[test]
    fn test_unresolvable_collision_is_rejected() {
        let inputs = vec![PathBuf::from("a/refs.bib"), PathBuf::from("b/refs.bib")];
        let err = plan_outputs(&inputs, Some(Path::new("out")), ExportFormat::Json).unwrap_err();
        assert!(err.to_string().contains("out/refs.bib.json"), "{err}");

        let repeated = vec![PathBuf::from("refs.ris"), PathBuf::from("refs.ris")];
        assert!(plan_outputs(&repeated, None, ExportFormat::Xlsx).is_err());
    }

    fn toml_from(s: &str) -> ConfigFile {
        toml::from_str(s).unwrap()
    }
}
