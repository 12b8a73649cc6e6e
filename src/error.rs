//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `ci-compose` library. It uses the `thiserror` library to create a
//! comprehensive `Error` enum that covers all anticipated failure modes,
//! providing clear and descriptive error messages.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors that can
//!   occur during a resolution pass. Each variant corresponds to a specific
//!   type of error and includes contextual information to aid in debugging.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the library to simplify function signatures and ensure
//!   type safety.
//!
//! Every variant is terminal for the resolution attempt in which it occurs:
//! the pipeline never performs a partial or best-effort merge. The caller is
//! expected to surface the error to the end user as a configuration failure,
//! not to retry.

use thiserror::Error;

/// Main error type for configuration composition
#[derive(Error, Debug)]
pub enum Error {
    /// An include entry matched zero or more than one location kinds.
    ///
    /// Each include must populate exactly one of the `remote`, `local`,
    /// `template`, or `project` fields after normalization.
    #[error("Each include must use a single type of definition: {location}")]
    AmbiguousSpecification { location: String },

    /// The same (location, project, sha) tuple was included more than once
    /// within a single resolution pass.
    #[error("Include `{location}` was already included")]
    DuplicateInclude { location: String },

    /// The expansion set reached its configured capacity.
    ///
    /// Raised independent of whether the offending entry is a duplicate; the
    /// budget check runs before the membership check.
    #[error("Maximum of {max} nested includes are allowed")]
    TooManyIncludes { max: usize },

    /// The running byte total of fetched configuration files exceeded the
    /// configured ceiling.
    #[error("Total size of combined configuration files exceeds the limit of {max_bytes} bytes")]
    TotalSizeExceeded { max_bytes: usize },

    /// The wall-clock deadline for the whole resolution elapsed.
    #[error("Resolving the configuration took longer than the allowed time limit")]
    Timeout,

    /// A resolved file failed a basic validity check (fetch failure, missing
    /// path, bad ref, non-mapping content). Carries the accessor's
    /// human-readable message.
    #[error("{message}")]
    File { message: String },

    /// Interpolation of a parameterized file failed. Carries at most the
    /// first three collected stage errors, joined by ", ".
    #[error("Interpolation failed: {message}")]
    Interpolation { message: String },

    /// The include declaration itself could not be understood.
    ///
    /// This error includes the specific parsing issue and optionally a hint
    /// about how to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
