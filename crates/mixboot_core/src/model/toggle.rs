//! Patch toggle declarations recovered from toggle-class markers.
//!
//! # Invariants
//! - `field_name` is non-empty.
//! - At least one of `early_resource` / `late_resource` is present, and a
//!   present resource is never an empty string.

/// Reason text used when a compatibility marker omits one.
pub const DEFAULT_COMPAT_REASON: &str = "Undefined";

/// Presence rule attached to one toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatConstraint {
    /// Unit that must be present (or absent).
    pub target_unit: String,
    /// `true` treats the target as a dependency, `false` as an incompatibility.
    pub desired_presence: bool,
    /// On mismatch, `true` forces the toggle off; `false` only warns.
    pub disable_on_mismatch: bool,
    pub reason: String,
}

/// One boolean setting that switches one or two patch resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleDescriptor {
    pub field_name: String,
    pub early_resource: Option<String>,
    pub late_resource: Option<String>,
    pub default_value: bool,
    pub constraints: Vec<CompatConstraint>,
}

impl ToggleDescriptor {
    /// Builds a descriptor, or `None` when the declaration is unusable.
    ///
    /// Empty resource names are normalized to absent.
    pub fn new(
        field_name: impl Into<String>,
        early_resource: Option<String>,
        late_resource: Option<String>,
        default_value: bool,
        constraints: Vec<CompatConstraint>,
    ) -> Option<Self> {
        let field_name = field_name.into();
        if field_name.is_empty() {
            return None;
        }
        let early_resource = early_resource.filter(|value| !value.is_empty());
        let late_resource = late_resource.filter(|value| !value.is_empty());
        if early_resource.is_none() && late_resource.is_none() {
            return None;
        }
        Some(Self {
            field_name,
            early_resource,
            late_resource,
            default_value,
            constraints,
        })
    }
}

/// All toggles declared by one marked class, bound to one settings unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleClass {
    /// Settings store unit, i.e. `config/<settings_unit>.cfg`.
    pub settings_unit: String,
    /// Internal class name the declaration came from, for log lines.
    pub class_name: String,
    pub toggles: Vec<ToggleDescriptor>,
}
