//! Bibliography cache persistence: parsing, serialization, and ordering enforcement.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bibtex::BibEntry;
use crate::error::Error;
use crate::freshness::{BibInfo, Freshness};

/// File name of the cache, written next to the document.
pub const CACHE_FILE_NAME: &str = ".mdxref.cache";

/// The cache file as a whole. Entries are sorted by key.
/// Constructed only via `CacheFile::from_info()` or `CacheFile::parse()`,
/// both of which guarantee the ordering.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheFile {
    /// Parsed entries, strictly sorted by citation key.
    #[serde(default)]
    pub entries: Vec<BibEntry>,
    /// Entity tag of the cached version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Last-modified token of the cached version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Source path or URL the entries came from.
    pub src: String,
}

impl CacheFile {
    /// Snapshot a loaded bibliography. `BTreeMap` iteration already yields
    /// entries in key order.
    pub fn from_info(info: &BibInfo) -> Self {
        return Self {
            entries: info.entries.values().cloned().collect(),
            etag: info.freshness.etag.clone(),
            last_modified: info.freshness.last_modified.clone(),
            src: info.src.clone(),
        };
    }

    /// Turn the snapshot back into the in-memory cache.
    pub fn into_info(self) -> BibInfo {
        return BibInfo {
            entries: self.entries.into_iter().map(|e| return (e.key.clone(), e)).collect(),
            freshness: Freshness {
                etag: self.etag,
                last_modified: self.last_modified,
            },
            src: self.src,
        };
    }

    /// Parse a cache file from TOML content.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the content is not valid TOML,
    /// or `Error::CacheCorrupt` if entries are not strictly sorted.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let cache: Self = toml::from_str(content)?;
        enforce_cache_entry_ordering(&cache.entries)?;
        return Ok(cache);
    }

    /// Read and parse the cache from disk. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` for read failures other than not-found,
    /// `Error::TomlDe` if the content is invalid TOML,
    /// or `Error::CacheCorrupt` if entries are not sorted.
    pub fn read(path: &Path) -> Result<Option<Self>, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content).map(Some);
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` if serialization fails.
    pub fn serialize(&self) -> Result<String, Error> {
        return Ok(toml::to_string_pretty(self)?);
    }

    /// Write the cache to disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` if serialization fails,
    /// or `Error::Io` if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), Error> {
        let content = self.serialize()?;
        std::fs::write(path, content)?;
        return Ok(());
    }
}

/// Validate that cache entries are strictly sorted by key.
///
/// # Errors
///
/// Returns `Error::CacheCorrupt` if any adjacent pair is out of order or repeated.
fn enforce_cache_entry_ordering(entries: &[BibEntry]) -> Result<(), Error> {
    for pair in entries.windows(2) {
        let [first, second] = pair else {
            continue;
        };
        if first.key >= second.key {
            return Err(Error::CacheCorrupt {
                reason: format!("entries not sorted: `{}` >= `{}`", first.key, second.key),
            });
        }
    }
    return Ok(());
}
