//! Boot-time patch toggle core for mixboot.
//! Decides which patch descriptors reach the engine, and in which phase.

pub mod boot;
pub mod compat;
pub mod config;
pub mod discovery;
pub mod logging;
pub mod model;
pub mod registry;
pub mod settings;

pub use boot::{
    BootContext, BootHook, LifecycleListener, PatchEngine, PhaseReport, PhaseScheduler,
    RecomputeEntryPoint, SchedulerError,
};
pub use compat::CompatibilityEvaluator;
pub use config::{BootConfig, ConfigError};
pub use discovery::presence::{DiscoveryReport, UnitPresence, UnitPresenceIndex};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::toggle::{CompatConstraint, ToggleClass, ToggleDescriptor};
pub use registry::{PatchRegistry, Phase, Predicate, RegistryError};
pub use settings::SettingsStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
