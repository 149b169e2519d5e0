use crate::error::Error;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// something to do about it, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::BibliographyFetch { method, status, url } => render_bibliography_fetch(method, status, url),
        Error::BibliographyNotFound { path } => render_bibliography_not_found(&path.display().to_string()),
        Error::CacheCorrupt { reason } => render_cache_corrupt(reason),
        Error::UnitNotInDocument { id } => render_unit_not_in_document(id),
        Error::UnsupportedDocument { path } => render_unsupported_document(&path.display().to_string()),
        _ => render_generic(e),
    };
}

fn render_generic(e: &Error) -> String {
    return match e {
        Error::DocumentNotFound { path } => format!("\
# Error: Document Not Found

`{}` does not exist.
", path.display()),

        Error::Http(e) => format!("\
# Error: HTTP

{e}
"),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),

        Error::Json(e) => format!("\
# Error: Invalid JSON

{e}
"),

        Error::NotebookMalformed { path, reason } => format!("\
# Error: Malformed Notebook

`{}`: {reason}
", path.display()),

        Error::TomlDe(e) => format!("\
# Error: Invalid TOML

{e}

## Fix

Check `.mdxref.toml` next to the document.
"),

        Error::TomlSer(e) => format!("\
# Error: TOML Serialization

{e}
"),

        // Already handled in render_error, but need exhaustive match.
        _ => format!("\
# Error

{e}
"),
    };
}

fn render_bibliography_fetch(method: &str, status: &str, url: &str) -> String {
    return format!("\
# Error: Bibliography Unavailable

`{method} {url}` answered `{status}`.

Existing references were left as they were.

## Fix

Check the `src:` line of the `::: bibliography` block.
");
}

fn render_bibliography_not_found(path: &str) -> String {
    return format!("\
# Error: Bibliography Not Found

`{path}` does not exist.

## Fix

`src:` paths are resolved relative to the document's directory.
");
}

fn render_cache_corrupt(reason: &str) -> String {
    return format!("\
# Error: Bibliography Cache Corrupt

{reason}

## Fix

Delete the cache and render again:

    rm .mdxref.cache
");
}

fn render_unit_not_in_document(id: &str) -> String {
    return format!("\
# Error: Unknown Unit

Unit `{id}` is not part of the document. The document structure changed;
a full rescan is required.
");
}

fn render_unsupported_document(path: &str) -> String {
    return format!(
        "\
# Error: Unsupported Document

`{path}` is not a notebook, Markdown file, or directory.

## Supported documents

- `.ipynb`: one unit per cell
- `.md`: a single unit
- a directory: one unit per `.md` file, in path order
"
    );
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn fetch_failure_names_request_and_status() {
        let md = render_error(&Error::BibliographyFetch {
            method: "HEAD",
            status: "404 Not Found".to_string(),
            url: "https://example.com/a.bib".to_string(),
        });
        assert!(md.starts_with("# Error: Bibliography Unavailable"));
        assert!(md.contains("`HEAD https://example.com/a.bib` answered `404 Not Found`"));
    }

    #[test]
    fn generic_errors_still_get_a_heading() {
        let md = render_error(&Error::UnitNotInDocument { id: "cell-3".to_string() });
        assert!(md.contains("Unit `cell-3`"));
        let md = render_error(&Error::Io(std::io::Error::other("boom")));
        assert!(md.starts_with("# Error: I/O"));
    }
}
