use crate::ocr::error::{OcrDiagnostics, OcrError};
use std::env;
use std::io;
use std::process::{Command, Output};

/// Languages the classical configurations depend on.
pub const REQUIRED_LANGUAGES: [&str; 2] = ["fra", "eng"];

/// Runs the `tesseract` command line tool to inspect the installation.
pub struct OcrHealthChecker {
    binary: String,
}

impl Default for OcrHealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrHealthChecker {
    pub fn new() -> Self {
        Self::with_binary("tesseract")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    /// A missing executable means Tesseract is not installed; any other
    /// spawn failure is reported as it is.
    fn run(&self, arg: &str) -> Result<Output, OcrError> {
        match Command::new(&self.binary).arg(arg).output() {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(OcrError::TesseractNotInstalled),
            result => Ok(result?),
        }
    }

    pub fn check_tesseract_installation(&self) -> Result<String, OcrError> {
        let output = self.run("--version")?;

        if !output.status.success() {
            return Err(OcrError::TesseractNotInstalled);
        }

        // Older releases print the version banner on stderr.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let version = stdout
            .lines()
            .chain(stderr.lines())
            .find(|line| !line.trim().is_empty())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(version)
    }

    pub fn get_available_languages(&self) -> Result<Vec<String>, OcrError> {
        let output = self.run("--list-langs")?;

        if !output.status.success() {
            return Err(OcrError::TesseractNotInstalled);
        }

        Ok(parse_language_list(&String::from_utf8_lossy(&output.stdout)))
    }

    pub fn check_language_data(&self, lang: &str) -> Result<(), OcrError> {
        let available = self.get_available_languages()?;
        if !available.iter().any(|l| l == lang) {
            return Err(OcrError::LanguageDataNotFound {
                lang: lang.to_string(),
            });
        }
        Ok(())
    }

    /// Required languages that are not installed.
    pub fn missing_required_languages(&self) -> Result<Vec<String>, OcrError> {
        let available = self.get_available_languages()?;
        Ok(REQUIRED_LANGUAGES
            .iter()
            .filter(|lang| !available.iter().any(|l| l == *lang))
            .map(|lang| lang.to_string())
            .collect())
    }

    pub fn get_diagnostics(&self, neural_backend_loaded: bool) -> OcrDiagnostics {
        let tesseract_version = self.check_tesseract_installation().ok();
        let available_languages = self.get_available_languages().unwrap_or_default();
        let tessdata_path = env::var("TESSDATA_PREFIX").ok();

        OcrDiagnostics {
            tesseract_version,
            available_languages,
            tessdata_path,
            neural_backend_loaded,
            pdf_rendering: pdf_rendering_available(),
        }
    }
}

#[cfg(feature = "pdf")]
fn pdf_rendering_available() -> bool {
    crate::ocr::decode::pdfium::is_available()
}

#[cfg(not(feature = "pdf"))]
fn pdf_rendering_available() -> bool {
    false
}

/// Parse `tesseract --list-langs` output, skipping its header line.
fn parse_language_list(output: &str) -> Vec<String> {
    let mut languages: Vec<String> = output
        .lines()
        .filter(|line| !line.starts_with("List of available languages"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    languages.sort();
    languages
}
