//! Two-hook application of queued descriptors.
//!
//! # Responsibility
//! - On `BeforeUnitConstruction`, load enabled early descriptors.
//! - On `AfterUnitVisibility`, load enabled late descriptors, release the
//!   registry, then force the engine to recompute.
//!
//! # Invariants
//! - Hooks are accepted once each, early first.
//! - A rejected descriptor is never loaded and its predicates never run.
//! - Recompute failure or an unsupported engine is fatal.

use crate::boot::engine::{default_adapters, EngineError, PatchEngine, RecomputeAdapter};
use crate::registry::{PatchRegistry, Phase, Predicate, RegistryError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Host lifecycle points the core reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootHook {
    /// Host is about to construct its extension units.
    BeforeUnitConstruction,
    /// Unit binaries are visible to class loading, none resolved yet.
    AfterUnitVisibility,
}

impl BootHook {
    pub fn phase(self) -> Phase {
        match self {
            Self::BeforeUnitConstruction => Phase::Early,
            Self::AfterUnitVisibility => Phase::Late,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeUnitConstruction => "before_unit_construction",
            Self::AfterUnitVisibility => "after_unit_visibility",
        }
    }
}

impl Display for BootHook {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStage {
    AwaitingEarly,
    AwaitingLate,
    Finished,
}

impl SchedulerStage {
    fn expected_hook(self) -> Option<BootHook> {
        match self {
            Self::AwaitingEarly => Some(BootHook::BeforeUnitConstruction),
            Self::AwaitingLate => Some(BootHook::AfterUnitVisibility),
            Self::Finished => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    UnexpectedHook {
        hook: BootHook,
        stage: SchedulerStage,
    },
    UnsupportedEngineVersion {
        attempted: Vec<&'static str>,
    },
    EngineFailure {
        adapter: &'static str,
        source: EngineError,
    },
    Registry(RegistryError),
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedHook { hook, stage } => {
                write!(f, "hook {hook} is not expected at stage {stage:?}")
            }
            Self::UnsupportedEngineVersion { attempted } => write!(
                f,
                "patch engine exposes no known recompute entry point (tried: {})",
                attempted.join(", ")
            ),
            Self::EngineFailure { adapter, source } => {
                write!(f, "patch engine recompute via {adapter} failed: {source}")
            }
            Self::Registry(err) => write!(f, "registry error: {err}"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EngineFailure { source, .. } => Some(source),
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistryError> for SchedulerError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

/// Outcome of one hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub loaded: Vec<String>,
    pub rejected: Vec<String>,
    pub disabled: Vec<String>,
    pub adapter: Option<&'static str>,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            loaded: Vec::new(),
            rejected: Vec::new(),
            disabled: Vec::new(),
            adapter: None,
        }
    }
}

/// Drives the registry through the two host hooks.
pub struct PhaseScheduler {
    stage: SchedulerStage,
    adapters: Vec<Box<dyn RecomputeAdapter>>,
}

impl Default for PhaseScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseScheduler {
    pub fn new() -> Self {
        Self::with_adapters(default_adapters())
    }

    /// Scheduler trying `adapters` in order after the late phase.
    pub fn with_adapters(adapters: Vec<Box<dyn RecomputeAdapter>>) -> Self {
        Self {
            stage: SchedulerStage::AwaitingEarly,
            adapters,
        }
    }

    pub fn stage(&self) -> SchedulerStage {
        self.stage
    }

    pub fn on_hook(
        &mut self,
        hook: BootHook,
        registry: &mut PatchRegistry,
        engine: &mut dyn PatchEngine,
    ) -> Result<PhaseReport, SchedulerError> {
        if self.stage.expected_hook() != Some(hook) {
            error!(
                "event=boot_hook module=scheduler status=error hook={} stage={:?} error=unexpected_hook",
                hook, self.stage
            );
            return Err(SchedulerError::UnexpectedHook {
                hook,
                stage: self.stage,
            });
        }

        info!("event=boot_hook module=scheduler status=start hook={}", hook);
        let mut report = apply_phase(hook.phase(), registry, engine);

        match hook {
            BootHook::BeforeUnitConstruction => {
                self.stage = SchedulerStage::AwaitingLate;
            }
            BootHook::AfterUnitVisibility => {
                self.stage = SchedulerStage::Finished;
                registry.release()?;
                report.adapter = Some(self.recompute(engine)?);
            }
        }

        info!(
            "event=boot_hook module=scheduler status=ok hook={} loaded={} rejected={} disabled={}",
            hook,
            report.loaded.len(),
            report.rejected.len(),
            report.disabled.len()
        );
        Ok(report)
    }

    fn recompute(&self, engine: &mut dyn PatchEngine) -> Result<&'static str, SchedulerError> {
        let mut attempted = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            attempted.push(adapter.name());
            if !adapter.supports(&*engine) {
                info!(
                    "event=engine_recompute module=scheduler status=skip adapter={}",
                    adapter.name()
                );
                continue;
            }
            return match adapter.recompute(engine) {
                Ok(()) => {
                    info!(
                        "event=engine_recompute module=scheduler status=ok adapter={}",
                        adapter.name()
                    );
                    Ok(adapter.name())
                }
                Err(source) => {
                    error!(
                        "event=engine_recompute module=scheduler status=error adapter={} error={}",
                        adapter.name(),
                        source
                    );
                    Err(SchedulerError::EngineFailure {
                        adapter: adapter.name(),
                        source,
                    })
                }
            };
        }
        error!(
            "event=engine_recompute module=scheduler status=error attempted=\"{}\" error=unsupported_engine",
            attempted.join(",")
        );
        Err(SchedulerError::UnsupportedEngineVersion { attempted })
    }
}

fn apply_phase(
    phase: Phase,
    registry: &PatchRegistry,
    engine: &mut dyn PatchEngine,
) -> PhaseReport {
    let mut report = PhaseReport::new(phase);
    for (name, predicates) in registry.entries(phase) {
        if registry.is_rejected(name) {
            info!(
                "event=descriptor_apply module=scheduler status=skip phase={} resource=\"{}\" detail=rejected",
                phase, name
            );
            report.rejected.push(name.clone());
            continue;
        }
        if combine_votes(phase, name, predicates) {
            info!(
                "event=descriptor_apply module=scheduler status=ok phase={} resource=\"{}\"",
                phase, name
            );
            engine.load_descriptor(name);
            report.loaded.push(name.clone());
        } else {
            report.disabled.push(name.clone());
        }
    }
    report
}

/// OR over all votes, stopping at the first `true`. An unresolved vote
/// counts as `false`.
fn combine_votes(phase: Phase, name: &str, predicates: &[Predicate]) -> bool {
    for predicate in predicates {
        match predicate() {
            Some(true) => return true,
            Some(false) => {}
            None => warn!(
                "event=descriptor_vote module=scheduler status=warn phase={} resource=\"{}\" detail=unresolved_vote",
                phase, name
            ),
        }
    }
    false
}
