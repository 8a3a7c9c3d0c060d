//! Seam to the external patch-application engine.
//!
//! # Responsibility
//! - Describe what the scheduler needs from the engine: loading a
//!   descriptor and invoking versioned recompute entry points.
//! - Provide recompute strategies ordered from newest to oldest engine.
//!
//! # Invariants
//! - An adapter runs only when the engine exposes every entry point it needs.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Internal engine entry points used to force recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecomputeEntryPoint {
    /// Re-select descriptors for the current environment.
    SelectForEnvironment,
    /// Prepare selected descriptors with the engine's extension set.
    PrepareWithExtensions,
    /// Prepare selected descriptors, older signature.
    Prepare,
}

impl RecomputeEntryPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectForEnvironment => "select(env)",
            Self::PrepareWithExtensions => "prepare(env, extensions)",
            Self::Prepare => "prepare(env)",
        }
    }
}

impl Display for RecomputeEntryPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    MissingEntryPoint(RecomputeEntryPoint),
    Invocation {
        entry_point: RecomputeEntryPoint,
        detail: String,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEntryPoint(entry_point) => {
                write!(f, "engine does not expose {entry_point}")
            }
            Self::Invocation {
                entry_point,
                detail,
            } => write!(f, "engine call {entry_point} failed: {detail}"),
        }
    }
}

impl Error for EngineError {}

/// What the boot core consumes from the patch-application engine.
pub trait PatchEngine {
    /// Hands one descriptor name to the engine.
    fn load_descriptor(&mut self, name: &str);
    fn has_entry_point(&self, entry_point: RecomputeEntryPoint) -> bool;
    fn invoke_entry_point(&mut self, entry_point: RecomputeEntryPoint) -> Result<(), EngineError>;
}

/// One way of forcing the engine to recompute its active descriptor set.
pub trait RecomputeAdapter {
    /// Engine generation this adapter targets, for logs and reports.
    fn name(&self) -> &'static str;

    /// Entry points invoked in order.
    fn entry_points(&self) -> &[RecomputeEntryPoint];

    fn supports(&self, engine: &dyn PatchEngine) -> bool {
        self.entry_points()
            .iter()
            .all(|entry_point| engine.has_entry_point(*entry_point))
    }

    fn recompute(&self, engine: &mut dyn PatchEngine) -> Result<(), EngineError> {
        for entry_point in self.entry_points() {
            engine.invoke_entry_point(*entry_point)?;
        }
        Ok(())
    }
}

/// Adapter backed by a fixed entry-point sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointAdapter {
    name: &'static str,
    entry_points: Vec<RecomputeEntryPoint>,
}

impl EntryPointAdapter {
    pub fn new(name: &'static str, entry_points: Vec<RecomputeEntryPoint>) -> Self {
        Self { name, entry_points }
    }
}

impl RecomputeAdapter for EntryPointAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn entry_points(&self) -> &[RecomputeEntryPoint] {
        &self.entry_points
    }
}

/// Known adapters, newest engine first.
pub fn default_adapters() -> Vec<Box<dyn RecomputeAdapter>> {
    vec![
        Box::new(EntryPointAdapter::new(
            "engine-0.8.4",
            vec![
                RecomputeEntryPoint::SelectForEnvironment,
                RecomputeEntryPoint::PrepareWithExtensions,
            ],
        )),
        Box::new(EntryPointAdapter::new(
            "engine-0.8",
            vec![
                RecomputeEntryPoint::SelectForEnvironment,
                RecomputeEntryPoint::Prepare,
            ],
        )),
    ]
}
