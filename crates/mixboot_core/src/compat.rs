//! Cross-unit compatibility checks for patch toggles.
//!
//! # Responsibility
//! - Compare each constraint's desired presence against discovered units.
//! - Count mismatches for a user-facing summary.
//!
//! # Invariants
//! - When the override setting is on, no constraint is evaluated and the
//!   warning counter is untouched.
//! - Each mismatch increments the counter by exactly one.

use crate::config::SettingKey;
use crate::discovery::presence::UnitPresence;
use crate::model::toggle::CompatConstraint;
use crate::settings::SettingsStore;
use log::{error, warn};
use once_cell::unsync::OnceCell;
use std::cell::Cell;

/// Identifies the toggle being checked, for log lines.
#[derive(Debug, Clone, Copy)]
pub struct ToggleSubject<'a> {
    pub settings_unit: &'a str,
    pub field_name: &'a str,
}

/// Constraint evaluator with a process-lifetime warning counter.
#[derive(Debug)]
pub struct CompatibilityEvaluator {
    override_key: SettingKey,
    override_active: OnceCell<bool>,
    warnings: Cell<u32>,
}

impl CompatibilityEvaluator {
    pub fn new(override_key: SettingKey) -> Self {
        Self {
            override_key,
            override_active: OnceCell::new(),
            warnings: Cell::new(0),
        }
    }

    /// Whether the global override disables every check. Looked up once.
    pub fn checks_overridden(&self, settings: &SettingsStore) -> bool {
        *self.override_active.get_or_init(|| {
            let active =
                settings.get_boolean(&self.override_key.unit, &self.override_key.field, false);
            if active {
                warn!(
                    "event=compat_override module=compat status=warn unit={} field=\"{}\" detail=all_checks_skipped",
                    self.override_key.unit, self.override_key.field
                );
            }
            active
        })
    }

    /// Returns the final enablement after applying `constraints`.
    pub fn evaluate(
        &self,
        settings: &SettingsStore,
        presence: &dyn UnitPresence,
        subject: ToggleSubject<'_>,
        constraints: &[CompatConstraint],
        should_enable: bool,
    ) -> bool {
        if self.checks_overridden(settings) {
            return should_enable;
        }

        let mut enabled = should_enable;
        for constraint in constraints {
            if constraint.desired_presence == presence.present(&constraint.target_unit) {
                continue;
            }
            self.warnings.set(self.warnings.get() + 1);
            let relation = if constraint.desired_presence {
                "without"
            } else {
                "with"
            };
            if constraint.disable_on_mismatch {
                enabled = false;
                error!(
                    "event=compat_check module=compat status=error unit={} field=\"{}\" relation={} target={} action=disabled reason=\"{}\"",
                    subject.settings_unit,
                    subject.field_name,
                    relation,
                    constraint.target_unit,
                    constraint.reason
                );
            } else {
                warn!(
                    "event=compat_check module=compat status=warn unit={} field=\"{}\" relation={} target={} action=kept reason=\"{}\"",
                    subject.settings_unit,
                    subject.field_name,
                    relation,
                    constraint.target_unit,
                    constraint.reason
                );
            }
        }
        enabled
    }

    pub fn warning_count(&self) -> u32 {
        self.warnings.get()
    }

    /// Short notice for the host to surface, `None` when nothing mismatched.
    pub fn warning_summary(&self) -> Option<String> {
        match self.warning_count() {
            0 => None,
            count => Some(format!(
                "mixboot found {count} possible patch compatibility problems, check the log"
            )),
        }
    }
}
