use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Source position reported alongside a GraphQL error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u64,
    pub column: u64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// Errors raised while fetching and aggregating digest data.
///
/// Every variant is fatal to the call that produced it; nothing in the
/// crate retries.
#[derive(Debug, Error)]
pub enum DigestError {
    /// The API answered with a top-level `message` (bad credentials, rate
    /// limiting and the like).
    #[error("GitHub API error: {0}")]
    Transport(String),

    /// The API answered with a non-empty `errors` array.
    #[error("GraphQL error: {message}{}{}", fmt_path(.path), fmt_location(.location))]
    Query {
        message: String,
        path: Option<String>,
        location: Option<Location>,
    },

    /// `data` was present but null.
    #[error("GraphQL query returned null")]
    EmptyResult,

    /// A malformed identifier, rejected before any request is made.
    #[error("{0}")]
    Validation(String),

    /// The response did not have the shape the query promised.
    #[error("unexpected response shape at '{path}': {message}")]
    Shape { path: String, message: String },

    /// The HTTP client failed before the API could answer.
    #[error("request failed: {0}")]
    Http(String),

    #[error("cannot write '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn fmt_path(path: &Option<String>) -> String {
    path.as_ref()
        .map(|p| format!(" @{p}"))
        .unwrap_or_default()
}

fn fmt_location(location: &Option<Location>) -> String {
    location.map(|loc| format!(", {loc}")).unwrap_or_default()
}
