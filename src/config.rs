//! Certificate configuration
//!
//! A [`CertificateConfig`] starts from fixed defaults and is then overridden,
//! in order, by a list of [`ConfigOption`]s. Nothing here validates values:
//! an empty common name or a `not_after` in the past ends up in the
//! certificate exactly as configured.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result};

/// Common name used when none is configured
pub const DEFAULT_COMMON_NAME: &str = "localhost";

/// Organization used when none is configured
pub const DEFAULT_ORGANIZATION: &str = "self-signed";

/// Default validity horizon, in calendar years from generation time
pub const DEFAULT_VALIDITY_YEARS: i32 = 10;

/// Certificate generation configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateConfig {
    /// Subject common name, also the single subject alternative name
    pub common_name: String,
    /// Subject organization; omitted from the subject when `None`
    pub organization: Option<String>,
    /// End of the validity window
    pub not_after: OffsetDateTime,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            common_name: DEFAULT_COMMON_NAME.to_string(),
            organization: Some(DEFAULT_ORGANIZATION.to_string()),
            not_after: add_years(OffsetDateTime::now_utc(), DEFAULT_VALIDITY_YEARS),
        }
    }
}

impl CertificateConfig {
    /// Defaults overridden by `opts`, applied in order
    pub fn from_options<I>(opts: I) -> Self
    where
        I: IntoIterator<Item = ConfigOption>,
    {
        let mut config = Self::default();
        for opt in opts {
            opt.apply(&mut config);
        }
        config
    }

    /// Set common name
    pub fn common_name(mut self, common_name: impl Into<String>) -> Self {
        self.common_name = common_name.into();
        self
    }

    /// Set organization
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Drop the organization from the subject
    pub fn without_organization(mut self) -> Self {
        self.organization = None;
        self
    }

    /// Set the end of the validity window
    pub fn not_after(mut self, not_after: OffsetDateTime) -> Self {
        self.not_after = not_after;
        self
    }
}

/// A single override applied on top of the defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOption {
    CommonName(String),
    Organization(String),
    NoOrganization,
    NotAfter(OffsetDateTime),
}

impl ConfigOption {
    /// Apply this override to `config`
    pub fn apply(self, config: &mut CertificateConfig) {
        match self {
            ConfigOption::CommonName(cn) => config.common_name = cn,
            ConfigOption::Organization(org) => config.organization = Some(org),
            ConfigOption::NoOrganization => config.organization = None,
            ConfigOption::NotAfter(t) => config.not_after = t,
        }
    }
}

/// Override the common name
pub fn common_name(common_name: impl Into<String>) -> ConfigOption {
    ConfigOption::CommonName(common_name.into())
}

/// Override the organization
pub fn organization(organization: impl Into<String>) -> ConfigOption {
    ConfigOption::Organization(organization.into())
}

/// Override the end of the validity window
pub fn not_after(not_after: OffsetDateTime) -> ConfigOption {
    ConfigOption::NotAfter(not_after)
}

/// Shift `t` by whole calendar years.
///
/// Feb 29 lands on Mar 1 when the target year has no leap day.
pub fn add_years(t: OffsetDateTime, years: i32) -> OffsetDateTime {
    let year = t.year() + years;
    match t.replace_year(year) {
        Ok(shifted) => shifted,
        Err(_) => t
            .replace_day(28)
            .and_then(|d| d.replace_year(year))
            .map(|d| d + Duration::days(1))
            .unwrap_or_else(|_| t + Duration::days(365 * i64::from(years))),
    }
}

/// On-disk configuration (TOML); every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub common_name: Option<String>,
    pub organization: Option<String>,
    #[serde(default)]
    pub no_organization: bool,
    /// RFC 3339 timestamp
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub not_after: Option<OffsetDateTime>,
}

impl ConfigFile {
    /// Parse a TOML document
    pub fn parse(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(Error::Config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::parse(&source)
    }

    /// Overrides described by this file, in field order
    pub fn options(&self) -> Vec<ConfigOption> {
        let mut opts = Vec::new();
        if let Some(cn) = &self.common_name {
            opts.push(common_name(cn.clone()));
        }
        if let Some(org) = &self.organization {
            opts.push(organization(org.clone()));
        }
        if self.no_organization {
            opts.push(ConfigOption::NoOrganization);
        }
        if let Some(t) = self.not_after {
            opts.push(not_after(t));
        }
        opts
    }
}

/// `<config_dir>/selfsigned/selfsigned.toml`, when the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("selfsigned").join("selfsigned.toml"))
}
