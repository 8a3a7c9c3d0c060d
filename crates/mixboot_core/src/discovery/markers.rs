//! Declarative markers recognized on parsed class files.
//!
//! Markers are matched by their annotation type descriptor. Nothing here
//! resolves or loads the annotation types themselves.

use crate::discovery::classfile::{Annotation, ClassFile, ClassFileResult, ElementValue};
use crate::model::toggle::{CompatConstraint, ToggleClass, ToggleDescriptor, DEFAULT_COMPAT_REASON};

pub const UNIT_MARKER: &str = "Lnet/minecraftforge/fml/common/Mod;";
pub const CONFIG_NAME_MARKER: &str = "Lnet/minecraftforge/common/config/Config$Name;";
pub const TOGGLE_CLASS_MARKER: &str = "Lfermiumbooter/annotations/MixinConfig;";
pub const TOGGLE_MARKER: &str = "Lfermiumbooter/annotations/MixinConfig$MixinToggle;";
pub const COMPAT_MARKER: &str = "Lfermiumbooter/annotations/MixinConfig$CompatHandling;";
pub const COMPAT_CONTAINER_MARKER: &str =
    "Lfermiumbooter/annotations/MixinConfig$CompatHandlingContainer;";

/// Recognized marker kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Class declares an extension unit; `modid` carries the identifier.
    DeclaresUnit,
    /// Class groups patch toggles; `name` selects the settings unit.
    ToggleClass,
    /// Field carries its persisted setting name in `value`.
    ConfigName,
    Toggle,
    Compat,
    /// Repeated `Compat` markers wrapped in `value`.
    CompatContainer,
}

impl Marker {
    pub fn descriptor(self) -> &'static str {
        match self {
            Self::DeclaresUnit => UNIT_MARKER,
            Self::ToggleClass => TOGGLE_CLASS_MARKER,
            Self::ConfigName => CONFIG_NAME_MARKER,
            Self::Toggle => TOGGLE_MARKER,
            Self::Compat => COMPAT_MARKER,
            Self::CompatContainer => COMPAT_CONTAINER_MARKER,
        }
    }

    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        match descriptor {
            UNIT_MARKER => Some(Self::DeclaresUnit),
            TOGGLE_CLASS_MARKER => Some(Self::ToggleClass),
            CONFIG_NAME_MARKER => Some(Self::ConfigName),
            TOGGLE_MARKER => Some(Self::Toggle),
            COMPAT_MARKER => Some(Self::Compat),
            COMPAT_CONTAINER_MARKER => Some(Self::CompatContainer),
            _ => None,
        }
    }
}

/// What one class contributes to discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMetadata {
    pub unit_id: Option<String>,
    pub toggle_class: Option<ToggleClass>,
}

/// Reads unit and toggle markers from one parsed class.
///
/// Field annotations are only decoded for boolean fields, and only when the
/// class carries a toggle-class marker with a non-empty name.
pub fn inspect_class(class: &ClassFile) -> ClassFileResult<ClassMetadata> {
    let mut metadata = ClassMetadata::default();
    let mut settings_unit = None;

    for annotation in &class.annotations {
        match Marker::from_descriptor(&annotation.type_descriptor) {
            Some(Marker::DeclaresUnit) => {
                metadata.unit_id = annotation
                    .string("modid")
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
            }
            Some(Marker::ToggleClass) => {
                settings_unit = annotation.string("name").map(str::to_string);
            }
            _ => {}
        }
    }

    let Some(settings_unit) = settings_unit.filter(|value| !value.is_empty()) else {
        return Ok(metadata);
    };

    let mut toggles = Vec::new();
    for field in class.fields.iter().filter(|field| field.is_boolean()) {
        let annotations = field.annotations(&class.constant_pool)?;
        if let Some(descriptor) = toggle_from_field(&annotations) {
            toggles.push(descriptor);
        }
    }

    metadata.toggle_class = Some(ToggleClass {
        settings_unit,
        class_name: class.this_class.clone(),
        toggles,
    });
    Ok(metadata)
}

fn toggle_from_field(annotations: &[Annotation]) -> Option<ToggleDescriptor> {
    let mut config_name = None;
    let mut toggle = None;
    let mut compat = Vec::new();

    for annotation in annotations {
        match Marker::from_descriptor(&annotation.type_descriptor) {
            Some(Marker::ConfigName) => config_name = Some(annotation),
            Some(Marker::Toggle) => toggle = Some(annotation),
            Some(Marker::Compat) => compat.push(annotation),
            Some(Marker::CompatContainer) => collect_nested_compat(annotation, &mut compat),
            _ => {}
        }
    }

    let field_name = config_name?.string("value")?.to_string();
    let toggle = toggle?;
    let constraints = compat.into_iter().filter_map(constraint_from).collect();

    ToggleDescriptor::new(
        field_name,
        toggle.string("earlyMixin").map(str::to_string),
        toggle.string("lateMixin").map(str::to_string),
        toggle.boolean("defaultValue").unwrap_or(false),
        constraints,
    )
}

fn collect_nested_compat<'a>(container: &'a Annotation, out: &mut Vec<&'a Annotation>) {
    for value in container.elements.values() {
        let ElementValue::Array(items) = value else {
            continue;
        };
        for item in items {
            if let ElementValue::Annotation(nested) = item {
                if Marker::from_descriptor(&nested.type_descriptor) == Some(Marker::Compat) {
                    out.push(nested);
                }
            }
        }
    }
}

fn constraint_from(annotation: &Annotation) -> Option<CompatConstraint> {
    let target_unit = annotation
        .string("modid")
        .filter(|value| !value.is_empty())?
        .to_string();
    Some(CompatConstraint {
        target_unit,
        desired_presence: annotation.boolean("desired").unwrap_or(true),
        disable_on_mismatch: annotation.boolean("disableMixin").unwrap_or(true),
        reason: annotation
            .string("reason")
            .unwrap_or(DEFAULT_COMPAT_REASON)
            .to_string(),
    })
}
