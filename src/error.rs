/// Crate-level error types for mdxref diagnostics.
use std::path::PathBuf;

/// All errors in mdxref carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the file, URL, unit, or reason.
///
/// Markup problems are never errors: undefined references and duplicate
/// labels render as in-band warning markers instead.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A remote bibliography source answered with a non-success status.
    #[error("could not fetch bibliography at {url}: {method} request failed with {status}")]
    BibliographyFetch {
        /// HTTP method of the failed request (`GET` or `HEAD`).
        method: &'static str,
        /// Status line of the response, e.g. `404 Not Found`.
        status: String,
        /// Source URL as written in the `src:` line.
        url: String,
    },

    /// A local bibliography source does not exist.
    #[error("bibliography not found: {}", path.display())]
    BibliographyNotFound {
        /// Resolved path of the missing source.
        path: PathBuf,
    },

    /// Bibliography cache file exists but cannot be trusted.
    #[error("bibliography cache corrupt: {reason}")]
    CacheCorrupt {
        /// Description of the corruption.
        reason: String,
    },

    /// The document path does not exist.
    #[error("document not found: {}", path.display())]
    DocumentNotFound {
        /// Path that was given.
        path: PathBuf,
    },

    /// Transport-level HTTP failure (DNS, TLS, connection reset).
    #[error("http: {0}")]
    Http(
        /// The wrapped client error.
        #[from]
        reqwest::Error,
    ),

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON parsing or serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// Notebook JSON parsed but does not have the nbformat shape.
    #[error("malformed notebook {}: {reason}", path.display())]
    NotebookMalformed {
        /// Notebook file.
        path: PathBuf,
        /// What was missing or mistyped.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// TOML serialization failed.
    #[error("toml serialize: {0}")]
    TomlSer(
        /// The wrapped TOML serialization error.
        #[from]
        toml::ser::Error,
    ),

    /// An edit named a unit that is not part of the document.
    #[error("unit not in document: `{id}`")]
    UnitNotInDocument {
        /// Identifier of the unknown unit.
        id: String,
    },

    /// The document path is neither a notebook, a Markdown file, nor a directory.
    #[error("unsupported document: {}", path.display())]
    UnsupportedDocument {
        /// Path that was given.
        path: PathBuf,
    },

    /// The filesystem watcher could not be set up.
    #[error("watch: {0}")]
    Watch(
        /// The wrapped watcher error.
        #[from]
        notify::Error,
    ),
}
