// src/config.rs
//! Optional YAML settings file. Every field has a default, so an empty file
//! (or none at all) is valid; command-line flags override what is loaded.
//!
//! ```yaml
//! tables: [Story Drifts, Story Forces]
//! formats: [csv, txt]
//! output_dir: out
//! catalog:
//!   attempts: 5
//!   delay_ms: 500
//! debug_log: true
//! plot:
//!   width: 1024
//!   height: 768
//!   grayscale: false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};
use tracing::info;

use crate::catalog::RetryPolicy;
use crate::export::ExportFormat;
use crate::extract::DEFAULT_TABLES;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub attempts: usize,
    pub delay_ms: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            attempts: RetryPolicy::DEFAULT_ATTEMPTS,
            delay_ms: RetryPolicy::DEFAULT_DELAY.as_millis() as u64,
        }
    }
}

impl CatalogSettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.delay_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSettings {
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            width: 900,
            height: 700,
            grayscale: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tables: Vec<String>,
    pub formats: Vec<ExportFormat>,
    pub output_dir: Option<PathBuf>,
    pub catalog: CatalogSettings,
    pub debug_log: bool,
    /// Rows shown by console previews.
    pub preview_rows: usize,
    pub plot: PlotSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tables: DEFAULT_TABLES.iter().map(|t| t.to_string()).collect(),
            formats: vec![ExportFormat::Csv],
            output_dir: None,
            catalog: CatalogSettings::default(),
            debug_log: false,
            preview_rows: 10,
            plot: PlotSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        let settings: Settings = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse settings file {:?}", path))?;
        info!(path = %path.display(), tables = settings.tables.len(), "settings loaded");
        Ok(settings)
    }

    /// Settings from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "formats: [csv, txt]\ncatalog:\n  attempts: 1\nplot:\n  grayscale: true")?;
        let settings = Settings::load(tmp.path())?;

        assert_eq!(settings.formats, vec![ExportFormat::Csv, ExportFormat::Txt]);
        assert_eq!(settings.tables.len(), 3);
        assert_eq!(settings.catalog.delay_ms, 200);
        // attempts are floored when turned into a policy
        assert_eq!(settings.catalog.policy().attempts, RetryPolicy::MIN_ATTEMPTS);
        assert!(settings.plot.grayscale);
        assert_eq!(settings.plot.width, 900);
        Ok(())
    }

    #[test]
    fn missing_path_gives_defaults() -> Result<()> {
        let settings = Settings::load_or_default(None)?;
        assert_eq!(settings, Settings::default());
        assert!(Settings::load("/no/such/settings.yaml").is_err());
        Ok(())
    }

    #[test]
    fn unknown_format_is_rejected() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "formats: [xlsx]")?;
        assert!(Settings::load(tmp.path()).is_err());
        Ok(())
    }
}
