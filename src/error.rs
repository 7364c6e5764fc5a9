//! # Error Handling
//!
//! This module defines the centralized error type for `bundlekit`. It uses
//! the `thiserror` library to create an `Error` enum covering every
//! anticipated failure mode, with messages that name the offending bundle,
//! file or URL.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. The first group of variants forms the
//!   user-facing taxonomy (missing resources, overwrite guards, integrity
//!   failures, bundle graph errors, partial pruning). The rest wrap parse,
//!   network and extraction failures plus errors from third-party crates.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Every error reaches the command boundary unchanged, where it is logged and
//! turned into a non-zero exit status.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for bundlekit operations
#[derive(Error, Debug)]
pub enum Error {
    /// A named resource (bundle, file, directory) does not exist.
    #[error("{what} does not exist: {}", path.display())]
    NotFound { what: String, path: PathBuf },

    /// A directory was expected but is missing or is not a directory.
    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// A destructive-overwrite guard tripped.
    #[error("Refusing to overwrite existing path: {}{}", path.display(), reason.as_ref().map(|r| format!(" ({})", r)).unwrap_or_default())]
    AlreadyExists {
        path: PathBuf,
        /// Why the existing path blocks the operation, if it is not obvious
        reason: Option<String>,
    },

    /// A path that must be a regular file is something else.
    #[error("Not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    /// Local archive bytes do not match the declared digest.
    #[error("Hash mismatch for {}: expected {algorithm} {expected}, got {actual}", path.display())]
    HashMismatch {
        path: PathBuf,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// A bundle depends on itself, directly or through its ancestors.
    #[error("Dependency cycle detected at bundle \"{bundle}\": {cycle}")]
    ResolutionCycle { bundle: String, cycle: String },

    /// A bundle declares a parent that does not exist.
    #[error("Bundle \"{bundle}\" depends on missing bundle \"{dependency}\"")]
    MissingDependency { bundle: String, dependency: String },

    /// Some declared pruning paths were not present in the tree.
    #[error("{missing} pruning path(s) were not found in the tree")]
    PartialPruneFailure { missing: usize },

    /// A bundle descriptor is malformed.
    #[error("Bundle metadata error for \"{bundle}\": {message}")]
    BundleMeta { bundle: String, message: String },

    /// A bundle component file could not be parsed.
    #[error("Configuration parsing error in {}: {message}{}", file.display(), hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        file: PathBuf,
        message: String,
        /// Optional hint for how to fix the file
        hint: Option<String>,
    },

    /// A path spec is absolute, escapes its root or is otherwise unusable.
    #[error("Invalid path \"{path}\": {message}")]
    InvalidPath { path: String, message: String },

    /// A download failed.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// An archive could not be unpacked.
    #[error("Extraction of archive \"{archive}\" failed: {message}")]
    Extraction { archive: String, message: String },

    /// Domain substitution could not be applied or reverted.
    #[error("Domain substitution error for {}: {message}", path.display())]
    Substitution { path: PathBuf, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A JSON (de)serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Error::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    /// Shorthand for [`Error::AlreadyExists`] without a reason.
    pub fn already_exists(path: impl Into<PathBuf>) -> Self {
        Error::AlreadyExists {
            path: path.into(),
            reason: None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
