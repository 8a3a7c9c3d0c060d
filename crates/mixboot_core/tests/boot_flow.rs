mod common;

use common::{toggle_class, unit_class, write_jar, write_settings, ToggleSpec};
use mixboot_core::boot::{EngineError, EntryPointAdapter, RecomputeAdapter};
use mixboot_core::{
    BootConfig, BootContext, BootHook, DiscoveryReport, LifecycleListener, PatchEngine,
    Phase, PhaseScheduler, RecomputeEntryPoint, SchedulerError, UnitPresence, UnitPresenceIndex,
};
use std::collections::BTreeSet;

struct RecordingEngine {
    exposed: BTreeSet<RecomputeEntryPoint>,
    failing: Option<RecomputeEntryPoint>,
    loaded: Vec<String>,
    invoked: Vec<RecomputeEntryPoint>,
}

impl RecordingEngine {
    fn exposing(entry_points: &[RecomputeEntryPoint]) -> Self {
        Self {
            exposed: entry_points.iter().copied().collect(),
            failing: None,
            loaded: Vec::new(),
            invoked: Vec::new(),
        }
    }

    fn current() -> Self {
        Self::exposing(&[
            RecomputeEntryPoint::SelectForEnvironment,
            RecomputeEntryPoint::PrepareWithExtensions,
            RecomputeEntryPoint::Prepare,
        ])
    }
}

impl PatchEngine for RecordingEngine {
    fn load_descriptor(&mut self, name: &str) {
        self.loaded.push(name.to_string());
    }

    fn has_entry_point(&self, entry_point: RecomputeEntryPoint) -> bool {
        self.exposed.contains(&entry_point)
    }

    fn invoke_entry_point(&mut self, entry_point: RecomputeEntryPoint) -> Result<(), EngineError> {
        self.invoked.push(entry_point);
        if self.failing == Some(entry_point) {
            return Err(EngineError::Invocation {
                entry_point,
                detail: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

fn prebuilt_context(units: &[&str]) -> (tempfile::TempDir, BootContext) {
    let dir = tempfile::tempdir().expect("temp dir");
    let report = DiscoveryReport {
        unit_ids: units.iter().map(|unit| unit.to_string()).collect(),
        ..DiscoveryReport::default()
    };
    let context = BootContext::with_parts(
        BootConfig::for_game_dir(dir.path()),
        UnitPresenceIndex::prebuilt(report),
        PhaseScheduler::new(),
    );
    (dir, context)
}

#[test]
fn late_phase_loads_only_enabled_unrejected_descriptors() {
    let (_dir, mut context) = prebuilt_context(&[]);
    context
        .enqueue_enabled(Phase::Late, "mixins.a.json", true)
        .expect("enqueue a");
    context
        .enqueue_enabled(Phase::Late, "mixins.b.json", true)
        .expect("enqueue b");
    context.reject("mixins.b.json").expect("reject b");
    let mut engine = RecordingEngine::current();

    let early = context
        .on_hook(BootHook::BeforeUnitConstruction, &mut engine)
        .expect("early hook");
    assert!(early.loaded.is_empty());
    assert!(early.adapter.is_none());

    let late = context
        .on_hook(BootHook::AfterUnitVisibility, &mut engine)
        .expect("late hook");
    assert_eq!(engine.loaded, vec!["mixins.a.json".to_string()]);
    assert_eq!(late.rejected, vec!["mixins.b.json".to_string()]);
    assert_eq!(late.adapter, Some("engine-0.8.4"));

    let registry = context.registry();
    assert!(registry.is_released());
    assert!(registry.entries(Phase::Early).is_empty());
    assert!(registry.entries(Phase::Late).is_empty());
    assert!(registry.rejections().is_empty());
    assert!(context
        .enqueue_enabled(Phase::Late, "mixins.c.json", true)
        .is_err());
}

#[test]
fn early_rejection_prevents_loading() {
    let (_dir, mut context) = prebuilt_context(&[]);
    context
        .enqueue_enabled(Phase::Early, "x", true)
        .expect("enqueue x");
    context.reject("x").expect("reject x");
    let mut engine = RecordingEngine::current();

    let report = context
        .on_hook(BootHook::BeforeUnitConstruction, &mut engine)
        .expect("early hook");
    assert!(engine.loaded.is_empty());
    assert_eq!(report.rejected, vec!["x".to_string()]);
}

#[test]
fn predicates_see_presence_at_hook_time() {
    let (_dir, mut context) = prebuilt_context(&["helper"]);
    let presence = context.presence();
    context
        .enqueue_with(Phase::Late, "mixins.helper.json", move || {
            Some(presence.present("helper"))
        })
        .expect("enqueue helper");
    let presence = context.presence();
    context
        .enqueue_with(Phase::Late, "mixins.absent.json", move || {
            Some(presence.present("absent"))
        })
        .expect("enqueue absent");
    context
        .enqueue_with(Phase::Late, "mixins.unresolved.json", || None)
        .expect("enqueue unresolved");
    let mut engine = RecordingEngine::current();

    LifecycleListener::on_hook(&mut context, BootHook::BeforeUnitConstruction, &mut engine)
        .expect("early hook");
    let late = LifecycleListener::on_hook(&mut context, BootHook::AfterUnitVisibility, &mut engine)
        .expect("late hook");
    assert_eq!(engine.loaded, vec!["mixins.helper.json".to_string()]);
    assert_eq!(
        late.disabled,
        vec![
            "mixins.absent.json".to_string(),
            "mixins.unresolved.json".to_string()
        ]
    );
}

#[test]
fn hooks_out_of_order_are_errors() {
    let (_dir, mut context) = prebuilt_context(&[]);
    let mut engine = RecordingEngine::current();

    assert!(matches!(
        context.on_hook(BootHook::AfterUnitVisibility, &mut engine),
        Err(SchedulerError::UnexpectedHook { .. })
    ));
    context
        .on_hook(BootHook::BeforeUnitConstruction, &mut engine)
        .expect("early hook");
    assert!(matches!(
        context.on_hook(BootHook::BeforeUnitConstruction, &mut engine),
        Err(SchedulerError::UnexpectedHook { .. })
    ));
    context
        .on_hook(BootHook::AfterUnitVisibility, &mut engine)
        .expect("late hook");
    assert!(matches!(
        context.on_hook(BootHook::AfterUnitVisibility, &mut engine),
        Err(SchedulerError::UnexpectedHook { .. })
    ));
}

#[test]
fn older_engine_falls_back_to_plain_prepare() {
    let (_dir, mut context) = prebuilt_context(&[]);
    let mut engine = RecordingEngine::exposing(&[
        RecomputeEntryPoint::SelectForEnvironment,
        RecomputeEntryPoint::Prepare,
    ]);

    context
        .on_hook(BootHook::BeforeUnitConstruction, &mut engine)
        .expect("early hook");
    let late = context
        .on_hook(BootHook::AfterUnitVisibility, &mut engine)
        .expect("late hook");
    assert_eq!(late.adapter, Some("engine-0.8"));
    assert_eq!(
        engine.invoked,
        vec![
            RecomputeEntryPoint::SelectForEnvironment,
            RecomputeEntryPoint::Prepare
        ]
    );
}

#[test]
fn unknown_engine_is_fatal() {
    let (_dir, mut context) = prebuilt_context(&[]);
    context
        .enqueue_enabled(Phase::Late, "mixins.a.json", true)
        .expect("enqueue a");
    let mut engine = RecordingEngine::exposing(&[RecomputeEntryPoint::Prepare]);

    context
        .on_hook(BootHook::BeforeUnitConstruction, &mut engine)
        .expect("early hook");
    let err = context
        .on_hook(BootHook::AfterUnitVisibility, &mut engine)
        .expect_err("no adapter matches");
    assert_eq!(
        err,
        SchedulerError::UnsupportedEngineVersion {
            attempted: vec!["engine-0.8.4", "engine-0.8"],
        }
    );
    assert!(engine.invoked.is_empty());
    assert_eq!(engine.loaded, vec!["mixins.a.json".to_string()]);
}

#[test]
fn failed_recompute_is_fatal() {
    let (_dir, mut context) = prebuilt_context(&[]);
    let mut engine = RecordingEngine::current();
    engine.failing = Some(RecomputeEntryPoint::PrepareWithExtensions);

    context
        .on_hook(BootHook::BeforeUnitConstruction, &mut engine)
        .expect("early hook");
    let err = context
        .on_hook(BootHook::AfterUnitVisibility, &mut engine)
        .expect_err("recompute failure");
    assert!(matches!(
        err,
        SchedulerError::EngineFailure {
            adapter: "engine-0.8.4",
            ..
        }
    ));
}

#[test]
fn custom_adapter_list_is_honored() {
    let dir = tempfile::tempdir().expect("temp dir");
    let adapters: Vec<Box<dyn RecomputeAdapter>> = vec![Box::new(EntryPointAdapter::new(
        "prepare-only",
        vec![RecomputeEntryPoint::Prepare],
    ))];
    let mut context = BootContext::with_parts(
        BootConfig::for_game_dir(dir.path()),
        UnitPresenceIndex::prebuilt(DiscoveryReport::default()),
        PhaseScheduler::with_adapters(adapters),
    );
    let mut engine = RecordingEngine::exposing(&[RecomputeEntryPoint::Prepare]);

    context
        .on_hook(BootHook::BeforeUnitConstruction, &mut engine)
        .expect("early hook");
    let late = context
        .on_hook(BootHook::AfterUnitVisibility, &mut engine)
        .expect("late hook");
    assert_eq!(late.adapter, Some("prepare-only"));
}

#[test]
fn discovered_toggles_flow_through_both_hooks() {
    let dir = tempfile::tempdir().expect("temp dir");
    let game = dir.path();
    let settings_class = toggle_class(
        "com/example/pack/PackSettings",
        "pack",
        &[
            ToggleSpec::new("Faster Chunks")
                .early("mixins.pack.early.json")
                .enabled_by_default(),
            ToggleSpec::new("Helper Support")
                .late("mixins.pack.helper.json")
                .enabled_by_default()
                .requires("helper", true, true, "patches helper"),
            ToggleSpec::new("Rival Support")
                .late("mixins.pack.rival.json")
                .requires("rival", true, true, "patches rival"),
            ToggleSpec::new("Old Feature").late("mixins.pack.old.json"),
        ],
    );
    write_jar(
        &game.join("mods/pack.jar"),
        &[
            ("mcmod.info", br#"[{"modid": "pack"}]"#),
            ("com/example/pack/PackSettings.class", &settings_class),
        ],
    );
    write_jar(
        &game.join("mods/helper.jar"),
        &[("helper/Unit.class", &unit_class("helper/Unit", "helper"))],
    );
    write_settings(
        game,
        "pack",
        "general {\n    B:\"Rival Support\"=true\n    B:\"Old Feature\"=false\n}\n",
    );

    let config = BootConfig::load_or_default(game).expect("default config");
    let mut context = BootContext::new(config);
    let mut engine = RecordingEngine::current();

    context
        .on_hook(BootHook::BeforeUnitConstruction, &mut engine)
        .expect("early hook");
    assert_eq!(engine.loaded, vec!["mixins.pack.early.json".to_string()]);

    context
        .on_hook(BootHook::AfterUnitVisibility, &mut engine)
        .expect("late hook");
    assert_eq!(
        engine.loaded,
        vec![
            "mixins.pack.early.json".to_string(),
            "mixins.pack.helper.json".to_string()
        ]
    );
    assert_eq!(context.warning_count(), 1);
    assert!(context.is_unit_present("helper"));
}
