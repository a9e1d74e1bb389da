//! Optional settings file for the command-line front end.
//!
//! ```toml
//! [paths]
//! db_path = "%AppData%/YACReader/library.ydb"
//! xml_path = "$HOME/ComicRack/ComicDb.xml"
//!
//! [options]
//! show_query = true
//! overwrite_all = false
//! ```
//!
//! Settings are only read; command-line flags take precedence.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Matches `%VAR%`, `${VAR}` and `$VAR` references.
static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%([A-Za-z_][A-Za-z0-9_]*)%|\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid env reference pattern")
});

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub options: OptionSettings,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    pub db_path: Option<String>,
    pub xml_path: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptionSettings {
    pub show_query: bool,
    pub overwrite_all: bool,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid settings file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        self.paths.db_path.as_deref().map(expand_path)
    }

    pub fn xml_path(&self) -> Option<PathBuf> {
        self.paths.xml_path.as_deref().map(expand_path)
    }
}

/// Expand environment references; unknown variables are left untouched.
pub fn expand_path(path: &str) -> PathBuf {
    expand_with(path, |name| std::env::var(name).ok())
}

fn expand_with(path: &str, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    let expanded = ENV_REFERENCE.replace_all(path, |caps: &Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str());
        lookup(name).unwrap_or_else(|| caps[0].to_string())
    });
    PathBuf::from(expanded.into_owned())
}
