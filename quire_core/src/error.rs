//! Error types for quire_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using quire_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, hashing or publishing packages.
///
/// Integrity mismatches are not errors: `verify()` reports them as `false`.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the path resolver or table store, propagated unchanged.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Unknown tag, hash, namespace or entry.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// A hash prefix matched more than one stored manifest.
    #[error("Ambiguous hash prefix {prefix}: matches {}", .matches.join(", "))]
    AmbiguousPrefix {
        prefix: String,
        matches: Vec<String>,
    },

    /// Graph configuration is incomplete or inconsistent.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// A value violates a codec field's declared option contract.
    #[error("Schema error on field {field}: {reason}")]
    Schema { field: String, reason: String },

    /// A resource was hashed without any hash source.
    #[error("No hash source for {path}")]
    NoHashSource { path: String },

    /// Invalid multihash or hex digest.
    #[error("Invalid hash: {reason}")]
    InvalidHash { reason: String },

    /// Algorithm name or prefix is not registered.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// Invalid tag or namespace name.
    #[error("Invalid name: {reason}")]
    InvalidName { reason: String },

    /// Locator could not be parsed.
    #[error("Invalid locator {locator}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    /// Locator scheme is not handled by this resolver.
    #[error("Unsupported scheme {scheme} in {locator}")]
    UnsupportedScheme { scheme: String, locator: String },

    /// A stored artifact could not be decoded.
    #[error("Corrupted artifact at {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// JSON (de)serialization failure.
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create a NotFound error.
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Create an AmbiguousPrefix error.
    pub fn ambiguous_prefix(prefix: impl Into<String>, matches: Vec<String>) -> Self {
        Error::AmbiguousPrefix {
            prefix: prefix.into(),
            matches,
        }
    }

    /// Create a Configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Error::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a Schema error.
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a NoHashSource error.
    pub fn no_hash_source(path: impl Into<String>) -> Self {
        Error::NoHashSource { path: path.into() }
    }

    /// Create an InvalidHash error.
    pub fn invalid_hash(reason: impl Into<String>) -> Self {
        Error::InvalidHash {
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Create an InvalidName error.
    pub fn invalid_name(reason: impl Into<String>) -> Self {
        Error::InvalidName {
            reason: reason.into(),
        }
    }

    /// Create an InvalidLocator error.
    pub fn invalid_locator(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidLocator {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedScheme error.
    pub fn unsupported_scheme(scheme: impl Into<String>, locator: impl Into<String>) -> Self {
        Error::UnsupportedScheme {
            scheme: scheme.into(),
            locator: locator.into(),
        }
    }

    /// Create a Corrupted error.
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for lookups a caller can retry with a fuller key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::AmbiguousPrefix { .. })
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a glob/path error
        match err.io_error() {
            Some(io_err) => Error::Io {
                source: std::io::Error::new(io_err.kind(), io_err.to_string()),
            },
            None => Error::Io {
                source: std::io::Error::other(err.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(Error::not_found("tag", "nope").is_not_found());
        assert!(Error::ambiguous_prefix("12", vec!["1220aa".into(), "1220ab".into()]).is_not_found());
        assert!(!Error::configuration("missing child kind").is_not_found());
        assert!(!Error::schema("hash", "expected string").is_not_found());
    }

    #[test]
    fn test_ambiguous_message_lists_matches() {
        let err = Error::ambiguous_prefix("12", vec!["1220aa".into(), "1220ab".into()]);
        let msg = err.to_string();
        assert!(msg.contains("1220aa"));
        assert!(msg.contains("1220ab"));
    }
}
