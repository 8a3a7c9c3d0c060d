//! Process boot state owned by one explicit context.
//!
//! # Responsibility
//! - Own the registry, scheduler, settings store, presence index and
//!   compatibility counter for one boot.
//! - Expose the collaborator API and forward host hooks to the scheduler.
//!
//! # Invariants
//! - Discovered toggles are applied exactly once, no later than the early hook.
//! - Settings and presence are shared with predicates through `Rc` and never
//!   mutated after construction.

use crate::boot::engine::PatchEngine;
use crate::boot::scheduler::{BootHook, PhaseReport, PhaseScheduler, SchedulerError};
use crate::boot::toggles::{ToggleApplier, ToggleSummary};
use crate::compat::CompatibilityEvaluator;
use crate::config::BootConfig;
use crate::discovery::presence::{UnitPresence, UnitPresenceIndex};
use crate::model::toggle::ToggleClass;
use crate::registry::{PatchRegistry, Phase, Predicate, RegistryError};
use crate::settings::SettingsStore;
use log::info;
use std::rc::Rc;

/// Receiver of host lifecycle hooks.
pub trait LifecycleListener {
    fn on_hook(
        &mut self,
        hook: BootHook,
        engine: &mut dyn PatchEngine,
    ) -> Result<PhaseReport, SchedulerError>;
}

pub struct BootContext {
    config: BootConfig,
    settings: Rc<SettingsStore>,
    presence: Rc<UnitPresenceIndex>,
    compat: CompatibilityEvaluator,
    registry: PatchRegistry,
    scheduler: PhaseScheduler,
    discovered_applied: Option<ToggleSummary>,
}

impl BootContext {
    /// Context over the filesystem described by `config`.
    pub fn new(config: BootConfig) -> Self {
        let presence = UnitPresenceIndex::from_config(&config);
        Self::with_parts(config, presence, PhaseScheduler::new())
    }

    pub fn with_parts(
        config: BootConfig,
        presence: UnitPresenceIndex,
        scheduler: PhaseScheduler,
    ) -> Self {
        let settings = SettingsStore::new(config.settings_dir_path());
        let compat = CompatibilityEvaluator::new(config.compat_override.clone());
        Self {
            config,
            settings: Rc::new(settings),
            presence: Rc::new(presence),
            compat,
            registry: PatchRegistry::new(),
            scheduler,
            discovered_applied: None,
        }
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn enqueue(
        &mut self,
        phase: Phase,
        resource: &str,
        predicate: Option<Predicate>,
    ) -> Result<(), RegistryError> {
        self.registry.enqueue(phase, resource, predicate)
    }

    pub fn enqueue_with<F>(
        &mut self,
        phase: Phase,
        resource: &str,
        predicate: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Option<bool> + 'static,
    {
        self.registry.enqueue_with(phase, resource, predicate)
    }

    pub fn enqueue_enabled(
        &mut self,
        phase: Phase,
        resource: &str,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        self.registry.enqueue_enabled(phase, resource, enabled)
    }

    pub fn enqueue_all<I, S>(&mut self, phase: Phase, resources: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.registry.enqueue_all(phase, resources)
    }

    pub fn reject(&mut self, resource: &str) -> Result<(), RegistryError> {
        self.registry.reject(resource)
    }

    /// Whether `unit_id` was found by discovery. Triggers discovery on first use.
    pub fn is_unit_present(&self, unit_id: &str) -> bool {
        self.presence.present(unit_id)
    }

    /// Shared presence handle for predicates evaluated at hook time.
    pub fn presence(&self) -> Rc<UnitPresenceIndex> {
        Rc::clone(&self.presence)
    }

    pub fn settings(&self) -> Rc<SettingsStore> {
        Rc::clone(&self.settings)
    }

    /// Read-only view of queued state.
    pub fn registry(&self) -> &PatchRegistry {
        &self.registry
    }

    /// Applies a toggle schema supplied at runtime instead of discovered.
    pub fn apply_toggle_class(&mut self, class: &ToggleClass) -> ToggleSummary {
        let applier = ToggleApplier {
            settings: &self.settings,
            presence: &*self.presence,
            compat: &self.compat,
        };
        applier.apply(class, &mut self.registry)
    }

    /// Applies every discovered toggle class. Later calls return the first
    /// summary without side effects.
    pub fn apply_discovered_toggles(&mut self) -> ToggleSummary {
        if let Some(summary) = self.discovered_applied {
            return summary;
        }
        let presence = Rc::clone(&self.presence);
        let applier = ToggleApplier {
            settings: &self.settings,
            presence: &*presence,
            compat: &self.compat,
        };
        let mut summary = ToggleSummary::default();
        for class in presence.toggle_classes() {
            summary.merge(applier.apply(class, &mut self.registry));
        }
        info!(
            "event=toggle_apply module=toggles status=ok classes={} toggles={} enqueued={} warnings={}",
            presence.toggle_classes().len(),
            summary.toggles_seen,
            summary.enqueued,
            self.compat.warning_count()
        );
        self.discovered_applied = Some(summary);
        summary
    }

    pub fn warning_count(&self) -> u32 {
        self.compat.warning_count()
    }

    pub fn warning_summary(&self) -> Option<String> {
        self.compat.warning_summary()
    }

    pub fn on_hook(
        &mut self,
        hook: BootHook,
        engine: &mut dyn PatchEngine,
    ) -> Result<PhaseReport, SchedulerError> {
        if hook == BootHook::BeforeUnitConstruction {
            self.apply_discovered_toggles();
        }
        self.scheduler.on_hook(hook, &mut self.registry, engine)
    }
}

impl LifecycleListener for BootContext {
    fn on_hook(
        &mut self,
        hook: BootHook,
        engine: &mut dyn PatchEngine,
    ) -> Result<PhaseReport, SchedulerError> {
        BootContext::on_hook(self, hook, engine)
    }
}
