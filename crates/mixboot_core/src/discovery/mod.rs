//! Static discovery of installed units and their patch toggles.
//!
//! # Responsibility
//! - Locate candidate archives on disk and through dependency coordinates.
//! - Recover unit identifiers and toggle declarations from manifests and
//!   class-file markers, without loading any code.
//! - Serve presence queries from a once-built index.
//!
//! # Invariants
//! - Failures are isolated per archive and per class entry.
//! - The presence index is built at most once per owner.

pub mod classfile;
pub mod extractor;
pub mod manifest;
pub mod markers;
pub mod presence;
pub mod repository;
mod locator;

pub use locator::ArtifactLocator;
