//! # CI Configuration Composition Library
//!
//! This library resolves, deduplicates, fetches, interpolates, and
//! deep-merges externally referenced CI configuration fragments into a
//! single aggregate configuration mapping. It is designed to be used by
//! the `ci-compose` command-line tool but can also be embedded in a
//! pipeline-creation service.
//!
//! ## Quick Example
//!
//! ```
//! use ci_compose::location;
//! use ci_compose::variables::Variables;
//!
//! let include: serde_yaml::Value = serde_yaml::from_str(
//!     r#"
//!     - "https://example.com/ci.yml"
//!     - local: templates/build.yml
//!     "#,
//! )
//! .unwrap();
//!
//! let specs = location::normalize(&include, &Variables::new()).unwrap();
//! assert_eq!(specs.len(), 2);
//! assert!(specs[0].remote.is_some());
//! assert!(specs[1].local.is_some());
//! ```
//!
//! ## Core Concepts
//!
//! The library is built around a few key concepts:
//!
//! - **Locations (`location`)**: raw `include` declarations normalized into
//!   canonical specs — remote URL, repository-local path, named template,
//!   or cross-project file — with variable expansion and `rules` filtering.
//! - **Execution Context (`context`)**: the per-resolution state. A shared
//!   `ResolutionSession` carries the expansion set (duplicate and budget
//!   guard), the monotonic deadline, the bounded remote-fetch pool, and the
//!   fetched-byte budget; a lightweight `Context` view carries the current
//!   project, sha, user, and variables, and derives siblings via `mutate`.
//! - **Resolution (`resolver`)**: each spec classifies into exactly one
//!   location kind and fetches its content through the collaborator seams
//!   in `fetch`.
//! - **Interpolation (`interpolation`)**: files declaring a `spec.inputs`
//!   header have `$[[ inputs.NAME ]]` placeholders substituted with
//!   validated caller-supplied arguments before parsing.
//! - **Merging (`processor`, `merge`)**: resolved files deep-merge in
//!   declaration order, inline values merge last, and the `include` key is
//!   stripped from the result.
//!
//! ## Execution Flow
//!
//! The main entry point is [`processor::Processor`], which executes the
//! following high-level steps:
//!
//! 1.  **Mapping**: normalize the `include` declaration, drop entries whose
//!     rules do not match, and guard each entry against the duplicate and
//!     budget limits.
//! 2.  **Resolution**: classify each entry and fetch its content, with
//!     remote fetches overlapped through the bounded request pool.
//! 3.  **Interpolation**: substitute validated inputs into parameterized
//!     files.
//! 4.  **Merging**: deep-merge everything, inline configuration last.
//!
//! Every failure is terminal for the resolution attempt; see
//! [`error::Error`] for the taxonomy.

pub mod context;
pub mod error;
pub mod fetch;
pub mod interpolation;
pub mod location;
pub mod mapper;
pub mod merge;
pub mod processor;
pub mod resolver;
pub mod variables;

#[cfg(test)]
mod merge_proptest;
