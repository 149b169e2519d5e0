use std::path::Path;

use crate::error::Error;
use crate::rewrite::{DEFAULT_TAGGABLE, RenderOptions};

/// File name of the project configuration.
pub const CONFIG_FILE_NAME: &str = ".mdxref.toml";

/// Project configuration loaded from `.mdxref.toml`.
/// Include/exclude patterns are path prefixes applied to chapter files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Persist the bibliography cache between runs.
    pub cache: bool,
    /// Render citations as links to reference-list anchors.
    pub citation_links: bool,
    /// Prefixes of chapter paths to skip.
    exclude: Vec<String>,
    /// Prefixes of chapter paths to scan; empty means everything.
    include: Vec<String>,
    /// Enumerations whose references render parenthesized.
    pub taggable: Vec<String>,
}

/// Raw TOML structure for `.mdxref.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct MdxrefTomlConfig {
    /// See [`Config::cache`].
    cache: Option<bool>,
    /// See [`Config::citation_links`].
    #[serde(default)]
    citation_links: bool,
    /// See [`Config::exclude`].
    #[serde(default)]
    exclude: Vec<String>,
    /// See [`Config::include`].
    #[serde(default)]
    include: Vec<String>,
    /// See [`Config::taggable`].
    taggable: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            cache: true,
            citation_links: false,
            exclude: Vec::new(),
            include: Vec::new(),
            taggable: DEFAULT_TAGGABLE.iter().map(|s| return (*s).to_string()).collect(),
        };
    }
}

impl Config {
    /// Load config from `.mdxref.toml` in the given directory.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; a config the
    /// user wrote is never silently replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(CONFIG_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };

        let raw: MdxrefTomlConfig = toml::from_str(&content)?;
        let defaults = Self::default();
        return Ok(Self {
            cache: raw.cache.unwrap_or(defaults.cache),
            citation_links: raw.citation_links,
            exclude: raw.exclude,
            include: raw.include,
            taggable: raw.taggable.unwrap_or(defaults.taggable),
        });
    }

    /// Rendering options derived from this config.
    pub fn render_options(&self) -> RenderOptions {
        return RenderOptions {
            citation_links: self.citation_links,
            taggable: self.taggable.clone(),
        };
    }

    /// Check whether a chapter file should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}
