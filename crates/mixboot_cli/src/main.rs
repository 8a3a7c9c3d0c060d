//! Dry-run boot inspector.
//!
//! # Responsibility
//! - Run discovery over a game directory and list the units found.
//! - Simulate both host hooks against an engine that only records calls.

use clap::Parser;
use mixboot_core::{
    init_logging, BootConfig, BootContext, BootHook, PatchEngine, PhaseReport,
    RecomputeEntryPoint, SchedulerError,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "mixboot")]
#[command(about = "Show which patch descriptors a game directory would load", long_about = None)]
struct Cli {
    /// Game directory holding `mods/` and `config/`
    #[arg(default_value = ".")]
    game_dir: PathBuf,
    /// Absolute directory for rotating log files
    #[arg(long)]
    log_dir: Option<String>,
    /// trace|debug|info|warn|error
    #[arg(long, default_value_t = mixboot_core::default_log_level().to_string())]
    log_level: String,
}

/// Engine that exposes every entry point and records loaded names.
#[derive(Default)]
struct DryRunEngine {
    loaded: Vec<String>,
}

impl PatchEngine for DryRunEngine {
    fn load_descriptor(&mut self, name: &str) {
        self.loaded.push(name.to_string());
    }

    fn has_entry_point(&self, _entry_point: RecomputeEntryPoint) -> bool {
        true
    }

    fn invoke_entry_point(
        &mut self,
        entry_point: RecomputeEntryPoint,
    ) -> Result<(), mixboot_core::boot::EngineError> {
        log::debug!(
            "event=dry_run_engine module=cli status=ok entry_point={}",
            entry_point
        );
        Ok(())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        if let Err(err) = init_logging(&cli.log_level, log_dir) {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    }

    let config = match BootConfig::load_or_default(&cli.game_dir) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut context = BootContext::new(config);
    let presence = context.presence();
    println!("units ({}):", presence.unit_ids().len());
    for unit in presence.unit_ids() {
        println!("  {unit}");
    }

    match simulate(&mut context) {
        Ok(()) => {
            if let Some(summary) = context.warning_summary() {
                println!("warning: {summary}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn simulate(context: &mut BootContext) -> Result<(), SchedulerError> {
    let mut engine = DryRunEngine::default();
    for hook in [BootHook::BeforeUnitConstruction, BootHook::AfterUnitVisibility] {
        let report = context.on_hook(hook, &mut engine)?;
        print_report(hook, &report);
    }
    println!("total loaded: {}", engine.loaded.len());
    Ok(())
}

fn print_report(hook: BootHook, report: &PhaseReport) {
    println!("{} ({} phase):", hook, report.phase);
    for name in &report.loaded {
        println!("  load     {name}");
    }
    for name in &report.rejected {
        println!("  rejected {name}");
    }
    for name in &report.disabled {
        println!("  disabled {name}");
    }
    if let Some(adapter) = report.adapter {
        println!("  recompute via {adapter}");
    }
}
