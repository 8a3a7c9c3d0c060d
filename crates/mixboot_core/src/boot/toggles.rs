//! Turns declared toggles into registry submissions.

use crate::compat::{CompatibilityEvaluator, ToggleSubject};
use crate::discovery::presence::UnitPresence;
use crate::model::toggle::ToggleClass;
use crate::registry::{PatchRegistry, Phase};
use crate::settings::SettingsStore;
use log::{error, info};

/// Counters for one application pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToggleSummary {
    pub toggles_seen: usize,
    pub switched_off: usize,
    pub disabled_by_compat: usize,
    pub enqueued: usize,
}

impl ToggleSummary {
    pub fn merge(&mut self, other: ToggleSummary) {
        self.toggles_seen += other.toggles_seen;
        self.switched_off += other.switched_off;
        self.disabled_by_compat += other.disabled_by_compat;
        self.enqueued += other.enqueued;
    }
}

/// Borrowed collaborators needed to resolve toggles.
pub struct ToggleApplier<'a> {
    pub settings: &'a SettingsStore,
    pub presence: &'a dyn UnitPresence,
    pub compat: &'a CompatibilityEvaluator,
}

impl ToggleApplier<'_> {
    /// Enqueues the descriptors of every toggle that ends up enabled.
    pub fn apply(&self, class: &ToggleClass, registry: &mut PatchRegistry) -> ToggleSummary {
        let mut summary = ToggleSummary::default();
        for toggle in &class.toggles {
            summary.toggles_seen += 1;
            let requested = self.settings.get_boolean(
                &class.settings_unit,
                &toggle.field_name,
                toggle.default_value,
            );
            if !requested {
                summary.switched_off += 1;
                continue;
            }

            let subject = ToggleSubject {
                settings_unit: &class.settings_unit,
                field_name: &toggle.field_name,
            };
            let enabled = self.compat.evaluate(
                self.settings,
                self.presence,
                subject,
                &toggle.constraints,
                requested,
            );
            if !enabled {
                summary.disabled_by_compat += 1;
                continue;
            }

            info!(
                "event=toggle_apply module=toggles status=ok unit={} field=\"{}\" class={}",
                class.settings_unit, toggle.field_name, class.class_name
            );
            let targets = [
                (Phase::Early, toggle.early_resource.as_deref()),
                (Phase::Late, toggle.late_resource.as_deref()),
            ];
            for (phase, resource) in targets {
                let Some(resource) = resource else {
                    continue;
                };
                match registry.enqueue_enabled(phase, resource, true) {
                    Ok(()) => summary.enqueued += 1,
                    Err(err) => error!(
                        "event=toggle_apply module=toggles status=error unit={} field=\"{}\" error={}",
                        class.settings_unit, toggle.field_name, err
                    ),
                }
            }
        }
        summary
    }
}
