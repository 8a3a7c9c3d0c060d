//! Shared data model for discovery and patch decisions.
//!
//! # Responsibility
//! - Define candidate artifacts and their origin.
//! - Define toggle descriptors and compatibility constraints recovered from
//!   static markers.
//!
//! # Invariants
//! - Descriptors recovered from markers go through `ToggleDescriptor::new`,
//!   which drops declarations without a field name or without any resource.
//!   Fields stay public, so hand-built descriptors carry no such check.

pub mod artifact;
pub mod toggle;
