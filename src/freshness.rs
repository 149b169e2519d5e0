//! Freshness checking and reloading for the bibliography source.
//!
//! A refresh does a full load when the source path changed, otherwise a
//! metadata-only probe whose freshness token decides whether to reload.
//! Nothing in the cached [`BibInfo`] changes unless every I/O step succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};
use std::time::UNIX_EPOCH;

use regex::Regex;
use tracing::{debug, info};

use crate::bibtex::{BibEntry, EntryParser};
use crate::error::Error;

/// `scheme://` prefix marking a remote source.
static REMOTE_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"(?i)^[a-z]+://").expect("valid regex"));

/// Entity tag and last-modified stamp of one version of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Freshness {
    /// `ETag` header value, remote sources only.
    pub etag: Option<String>,
    /// `Last-Modified` header, or the file modification time for local sources.
    pub last_modified: Option<String>,
}

impl Freshness {
    /// Whether two tokens describe the same version. Entity tags win when
    /// both sides have one; otherwise last-modified stamps are compared.
    pub fn matches(&self, other: &Self) -> bool {
        if let (Some(mine), Some(theirs)) = (&self.etag, &other.etag) {
            return mine == theirs;
        }
        return self.last_modified == other.last_modified;
    }
}

/// Full content of a source plus its freshness token.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    /// Raw bibliography text.
    pub content: String,
    /// Token captured with the content.
    pub freshness: Freshness,
}

/// Reads bibliography sources: a full load and a metadata-only probe.
pub trait SourceFetcher {
    /// Fetch content and freshness token.
    ///
    /// # Errors
    ///
    /// Returns `Error::BibliographyFetch` for a non-success remote status or
    /// `Error::BibliographyNotFound` for a missing local file.
    fn fetch(&self, src: &str) -> Result<LoadedSource, Error>;

    /// Fetch only the freshness token.
    ///
    /// # Errors
    ///
    /// Same conditions as [`SourceFetcher::fetch`].
    fn probe(&self, src: &str) -> Result<Freshness, Error>;
}

/// Remote sources over HTTP: GET for loads, HEAD for probes.
#[derive(Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Check status and pull the freshness headers from a response.
    fn freshness_of(
        method: &'static str,
        url: &str,
        resp: &reqwest::blocking::Response,
    ) -> Result<Freshness, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::BibliographyFetch {
                method,
                status: status.to_string(),
                url: url.to_string(),
            });
        }
        let header = |name: reqwest::header::HeaderName| {
            return resp
                .headers()
                .get(name)
                .and_then(|v| return v.to_str().ok())
                .map(str::to_string);
        };
        return Ok(Freshness {
            etag: header(reqwest::header::ETAG),
            last_modified: header(reqwest::header::LAST_MODIFIED),
        });
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, src: &str) -> Result<LoadedSource, Error> {
        let resp = self.client.get(src).send()?;
        let freshness = Self::freshness_of("GET", src, &resp)?;
        let content = resp.text()?;
        return Ok(LoadedSource { content, freshness });
    }

    fn probe(&self, src: &str) -> Result<Freshness, Error> {
        let resp = self.client.head(src).send()?;
        return Self::freshness_of("HEAD", src, &resp);
    }
}

/// Local sources, resolved against the document's directory.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    base: PathBuf,
}

impl LocalFetcher {
    /// Resolve relative `src:` paths against `base`.
    pub fn new(base: &Path) -> Self {
        return Self { base: base.to_path_buf() };
    }

    /// Modification time as nanoseconds since the Unix epoch.
    fn freshness_at(path: &Path) -> Result<Freshness, Error> {
        let meta = match std::fs::metadata(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::BibliographyNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(m) => m,
        };
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| return t.duration_since(UNIX_EPOCH).ok())
            .map(|d| return d.as_nanos().to_string());
        return Ok(Freshness {
            etag: None,
            last_modified,
        });
    }

    fn resolve(&self, src: &str) -> PathBuf {
        return self.base.join(src);
    }
}

impl SourceFetcher for LocalFetcher {
    fn fetch(&self, src: &str) -> Result<LoadedSource, Error> {
        let path = self.resolve(src);
        let freshness = Self::freshness_at(&path)?;
        let content = std::fs::read_to_string(&path)?;
        return Ok(LoadedSource { content, freshness });
    }

    fn probe(&self, src: &str) -> Result<Freshness, Error> {
        return Self::freshness_at(&self.resolve(src));
    }
}

/// Dispatches on the source form: `scheme://` goes remote, anything else local.
///
/// The HTTP client is built on the first remote request and reused after that.
#[derive(Debug)]
pub struct SourceRouter {
    local: LocalFetcher,
    remote: OnceLock<HttpFetcher>,
}

impl SourceRouter {
    /// Router whose local paths resolve against `base`.
    pub fn new(base: &Path) -> Self {
        return Self {
            local: LocalFetcher::new(base),
            remote: OnceLock::new(),
        };
    }

    fn pick(&self, src: &str) -> &dyn SourceFetcher {
        if is_remote(src) {
            return self.remote.get_or_init(|| {
                debug!("creating HTTP client");
                return HttpFetcher::default();
            });
        }
        return &self.local;
    }
}

impl SourceFetcher for SourceRouter {
    fn fetch(&self, src: &str) -> Result<LoadedSource, Error> {
        return self.pick(src).fetch(src);
    }

    fn probe(&self, src: &str) -> Result<Freshness, Error> {
        return self.pick(src).probe(src);
    }
}

/// Whether `src` names a remote resource.
pub fn is_remote(src: &str) -> bool {
    return REMOTE_SOURCE.is_match(src);
}

/// The document's bibliography: which source it came from, the token of the
/// loaded version, and the parsed entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibInfo {
    /// Parsed entries keyed by citation key.
    pub entries: BTreeMap<String, BibEntry>,
    /// Token of the loaded version.
    pub freshness: Freshness,
    /// Source path or URL; empty before the first load.
    pub src: String,
}

impl BibInfo {
    /// Forget the source and its entries.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Bring the cache up to date with `src`.
    ///
    /// Returns `true` when entries were (re)loaded. A probe or load failure
    /// propagates and leaves the cache exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error for failed probes or loads.
    pub fn refresh(
        &mut self,
        src: &str,
        fetcher: &dyn SourceFetcher,
        parser: &dyn EntryParser,
    ) -> Result<bool, Error> {
        if self.src != src {
            info!(src, previous = %self.src, "loading bibliography");
            self.reload(src, fetcher, parser)?;
            return Ok(true);
        }

        let probed = fetcher.probe(src)?;
        if probed.matches(&self.freshness) {
            debug!(src, "bibliography unchanged");
            return Ok(false);
        }

        info!(src, "bibliography changed, reloading");
        self.reload(src, fetcher, parser)?;
        return Ok(true);
    }

    fn reload(&mut self, src: &str, fetcher: &dyn SourceFetcher, parser: &dyn EntryParser) -> Result<(), Error> {
        let loaded = fetcher.fetch(src)?;
        let entries = parser.parse(&loaded.content);
        debug!(src, entries = entries.len(), "bibliography parsed");
        *self = Self {
            entries,
            freshness: loaded.freshness,
            src: src.to_string(),
        };
        return Ok(());
    }
}
