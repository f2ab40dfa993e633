use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Result, ScrapeError};

pub const DEFAULT_BASE_URL: &str = "https://www.felixcloutier.com";
pub const DEFAULT_INDEX_URL: &str = "https://www.felixcloutier.com/x86/";
pub const DEFAULT_OUTPUT: &str = "x86.json";
pub const DEFAULT_WORKERS: usize = 50;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_USER_AGENT: &str = "x86-scraper/1.0 (+https://github.com/user/x86-scraper)";

/// Run settings. Every field has a default so an empty config is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index_url: String,
    pub base_url: String,
    pub output: PathBuf,
    pub workers: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub discovery: DiscoveryProfile,
    pub extraction: ExtractionProfile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            discovery: DiscoveryProfile::default(),
            extraction: ExtractionProfile::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then `ISA_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("ISA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ScrapeError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ScrapeError::Config("workers must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ScrapeError::Config("timeout_secs must be at least 1".into()));
        }
        url::Url::parse(&self.index_url)
            .map_err(|e| ScrapeError::Config(format!("index_url {:?}: {}", self.index_url, e)))?;
        Ok(())
    }
}

/// Where the detail-page links live on the index page.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryProfile {
    pub section_header: String,
    pub sections: Vec<String>,
    pub section_keyword: String,
    pub link_selector: String,
    /// Hrefs starting with this are appended to `base_url` as-is.
    pub site_prefix: String,
}

impl Default for DiscoveryProfile {
    fn default() -> Self {
        Self {
            section_header: "h2".into(),
            sections: vec![
                "Core Instructions".into(),
                "SGX Instructions".into(),
                "SMX Instructions".into(),
                "VMX Instructions".into(),
                "Xeon Phi™ Instructions".into(),
            ],
            section_keyword: "instructions".into(),
            link_selector: "tr td:first-child a".into(),
            site_prefix: "/x86/".into(),
        }
    }
}

/// A free-text field taken from the blocks under a header with a given id.
#[derive(Debug, Clone, Deserialize)]
pub struct TextSection {
    pub field: String,
    pub header_id: String,
}

impl TextSection {
    fn new(field: &str, header_id: &str) -> Self {
        Self {
            field: field.into(),
            header_id: header_id.into(),
        }
    }
}

/// Selectors and labels for detail pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionProfile {
    pub title_selector: String,
    pub section_header: String,
    pub secondary_table_header_id: String,
    pub secondary_table_sentinel: String,
    pub text_sections: Vec<TextSection>,
    pub exceptions_class: String,
    /// Ordered (substring, mode key) pairs; first match wins.
    pub exception_modes: Vec<(String, String)>,
}

impl Default for ExtractionProfile {
    fn default() -> Self {
        Self {
            title_selector: "h1".into(),
            section_header: "h2".into(),
            secondary_table_header_id: "instruction-operand-encoding".into(),
            secondary_table_sentinel: "Op/En".into(),
            text_sections: vec![
                TextSection::new("descriptionText", "description"),
                TextSection::new("operationText", "operation"),
                TextSection::new("flagsAffectedText", "flags-affected"),
            ],
            exceptions_class: "exceptions".into(),
            exception_modes: [
                ("64-Bit Mode", "64BitMode"),
                ("Protected Mode", "protectedMode"),
                ("Real-Address Mode", "realAddressMode"),
                ("Virtual-8086 Mode", "virtual8086Mode"),
                ("Compatibility Mode", "compatibilityMode"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_target_felixcloutier() {
        let s = Settings::default();
        assert_eq!(s.index_url, DEFAULT_INDEX_URL);
        assert_eq!(s.workers, 50);
        assert_eq!(s.timeout(), Duration::from_secs(15));
        assert_eq!(s.discovery.sections.len(), 5);
        assert_eq!(s.extraction.text_sections[2].header_id, "flags-affected");
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "workers = 4\noutput = \"out.json\"\n\n[discovery]\nsite_prefix = \"/ref/\""
        )
        .unwrap();
        let s = Settings::load(Some(file.path())).unwrap();
        assert_eq!(s.workers, 4);
        assert_eq!(s.output, PathBuf::from("out.json"));
        assert_eq!(s.discovery.site_prefix, "/ref/");
        // untouched nested fields keep their defaults
        assert_eq!(s.discovery.section_keyword, "instructions");
    }

    #[test]
    fn zero_workers_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "workers = 0").unwrap();
        assert!(matches!(
            Settings::load(Some(file.path())),
            Err(ScrapeError::Config(_))
        ));
    }
}
