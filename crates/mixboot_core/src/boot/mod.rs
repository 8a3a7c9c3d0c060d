//! Boot orchestration: toggles, registry phases and engine recompute.

pub mod context;
pub mod engine;
pub mod scheduler;
pub mod toggles;

pub use context::{BootContext, LifecycleListener};
pub use engine::{
    default_adapters, EngineError, EntryPointAdapter, PatchEngine, RecomputeAdapter,
    RecomputeEntryPoint,
};
pub use scheduler::{BootHook, PhaseReport, PhaseScheduler, SchedulerError, SchedulerStage};
pub use toggles::ToggleSummary;
