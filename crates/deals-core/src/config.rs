use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::clock::{BusinessCalendar, CalendarError, DEFAULT_TIMEZONE};
use crate::model::opportunity::{OpportunityError, Probability};
use crate::model::reason::{DEFAULT_LOSS_REASONS, DEFAULT_WIN_REASONS, ReasonCatalog};

/// Directory holding the database and config of one project.
pub const PROJECT_DIR: &str = ".deals";

/// Environment variable that overrides `calendar.timezone`.
pub const TIMEZONE_ENV: &str = "DEALS_TZ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub reasons: ReasonsConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// IANA zone every civil date is resolved in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonsConfig {
    #[serde(default = "default_loss_reasons")]
    pub loss: Vec<String>,
    #[serde(default = "default_win_reasons")]
    pub win: Vec<String>,
}

impl Default for ReasonsConfig {
    fn default() -> Self {
        Self {
            loss: default_loss_reasons(),
            win: default_win_reasons(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Probability given to new opportunities when none is supplied.
    #[serde(default = "default_probability")]
    pub probability: i64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            probability: default_probability(),
        }
    }
}

impl ProjectConfig {
    /// # Errors
    ///
    /// Returns [`CalendarError`] if `calendar.timezone` is not an IANA zone.
    pub fn calendar(&self) -> Result<BusinessCalendar, CalendarError> {
        BusinessCalendar::parse(&self.calendar.timezone)
    }

    #[must_use]
    pub fn reason_catalog(&self) -> ReasonCatalog {
        ReasonCatalog::from_codes(self.reasons.loss.as_slice(), self.reasons.win.as_slice())
    }

    /// # Errors
    ///
    /// Returns [`OpportunityError::ProbabilityOutOfRange`] for values outside 0..=100.
    pub fn default_probability(&self) -> Result<Probability, OpportunityError> {
        Probability::try_from(self.defaults.probability)
    }

    /// Apply a timezone override such as the value of `DEALS_TZ`.
    #[must_use]
    pub fn with_timezone_override(mut self, timezone: Option<&str>) -> Self {
        if let Some(tz) = timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
            self.calendar.timezone = tz.to_string();
        }
        self
    }
}

#[must_use]
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join("config.toml")
}

/// Read `.deals/config.toml`, falling back to defaults when absent.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Project config with environment overrides applied.
///
/// # Errors
///
/// See [`load_project_config`].
pub fn resolve_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let env_tz = std::env::var(TIMEZONE_ENV).ok();
    Ok(load_project_config(project_root)?.with_timezone_override(env_tz.as_deref()))
}

/// Write the default config file unless one already exists.
///
/// # Errors
///
/// Fails on I/O errors or if the config cannot be serialized.
pub fn write_default_config(project_root: &Path) -> Result<PathBuf> {
    let path = config_path(project_root);
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content =
        toml::to_string_pretty(&ProjectConfig::default()).context("Failed to serialize config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_loss_reasons() -> Vec<String> {
    DEFAULT_LOSS_REASONS.iter().map(|code| (*code).to_string()).collect()
}

fn default_win_reasons() -> Vec<String> {
    DEFAULT_WIN_REASONS.iter().map(|code| (*code).to_string()).collect()
}

const fn default_probability() -> i64 {
    10
}
