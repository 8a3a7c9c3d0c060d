//! Unit presence index built from one discovery pass.
//!
//! # Responsibility
//! - Run locator + extractor at most once, on first query.
//! - Answer presence queries and hand out discovered toggle classes.
//!
//! # Invariants
//! - The report is immutable once built; every query observes the same set.
//! - Empty identifiers are never present.

use crate::config::BootConfig;
use crate::discovery::extractor::MetadataExtractor;
use crate::discovery::locator::ArtifactLocator;
use crate::model::toggle::ToggleClass;
use log::{error, info};
use once_cell::unsync::OnceCell;
use std::collections::BTreeSet;
use std::time::Instant;

/// Presence query used by compatibility checks and collaborator predicates.
pub trait UnitPresence {
    fn present(&self, unit_id: &str) -> bool;
}

impl UnitPresence for BTreeSet<String> {
    fn present(&self, unit_id: &str) -> bool {
        !unit_id.is_empty() && self.contains(unit_id)
    }
}

/// Result of one full discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub unit_ids: BTreeSet<String>,
    pub toggle_classes: Vec<ToggleClass>,
    pub artifacts_scanned: usize,
    pub artifacts_failed: usize,
}

/// Produces a discovery report; called at most once per index.
pub trait DiscoverySource {
    fn discover(&self) -> DiscoveryReport;
}

/// Filesystem-backed source: locate archives, then extract each one.
pub struct ArchiveDiscovery {
    locator: ArtifactLocator,
    extractor: MetadataExtractor,
    builtin_units: Vec<String>,
}

impl ArchiveDiscovery {
    pub fn new(
        locator: ArtifactLocator,
        extractor: MetadataExtractor,
        builtin_units: Vec<String>,
    ) -> Self {
        Self {
            locator,
            extractor,
            builtin_units,
        }
    }

    pub fn from_config(config: &BootConfig) -> Self {
        Self::new(
            ArtifactLocator::from_config(config),
            MetadataExtractor::from_config(config),
            config.builtin_units.clone(),
        )
    }
}

impl DiscoverySource for ArchiveDiscovery {
    fn discover(&self) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        report.unit_ids.extend(self.builtin_units.iter().cloned());

        for artifact in self.locator.locate() {
            match self.extractor.extract(&artifact) {
                Ok(metadata) => {
                    report.artifacts_scanned += 1;
                    report.unit_ids.extend(metadata.unit_ids);
                    report.toggle_classes.extend(metadata.toggle_classes);
                }
                Err(err) => {
                    report.artifacts_failed += 1;
                    error!(
                        "event=artifact_scan module=discovery status=error artifact={} error={}",
                        artifact.display_name(),
                        err
                    );
                }
            }
        }
        report.unit_ids.remove("");
        report
    }
}

/// Lazily built, then immutable, set of discovered unit identifiers.
pub struct UnitPresenceIndex {
    source: Box<dyn DiscoverySource>,
    report: OnceCell<DiscoveryReport>,
}

impl UnitPresenceIndex {
    pub fn new(source: Box<dyn DiscoverySource>) -> Self {
        Self {
            source,
            report: OnceCell::new(),
        }
    }

    pub fn from_config(config: &BootConfig) -> Self {
        Self::new(Box::new(ArchiveDiscovery::from_config(config)))
    }

    /// Index over an already-known report; never runs discovery.
    pub fn prebuilt(report: DiscoveryReport) -> Self {
        let index = Self::new(Box::new(EmptySource));
        let _ = index.report.set(report);
        index
    }

    /// Returns the report, running discovery on first use.
    pub fn report(&self) -> &DiscoveryReport {
        self.report.get_or_init(|| {
            let started_at = Instant::now();
            info!("event=discovery module=discovery status=start");
            let report = self.source.discover();
            info!(
                "event=discovery module=discovery status=ok duration_ms={} units={} toggle_classes={} artifacts={} failed_artifacts={}",
                started_at.elapsed().as_millis(),
                report.unit_ids.len(),
                report.toggle_classes.len(),
                report.artifacts_scanned,
                report.artifacts_failed
            );
            report
        })
    }

    pub fn is_built(&self) -> bool {
        self.report.get().is_some()
    }

    pub fn unit_ids(&self) -> &BTreeSet<String> {
        &self.report().unit_ids
    }

    pub fn toggle_classes(&self) -> &[ToggleClass] {
        &self.report().toggle_classes
    }
}

impl UnitPresence for UnitPresenceIndex {
    fn present(&self, unit_id: &str) -> bool {
        if unit_id.is_empty() {
            return false;
        }
        self.unit_ids().contains(unit_id)
    }
}

struct EmptySource;

impl DiscoverySource for EmptySource {
    fn discover(&self) -> DiscoveryReport {
        DiscoveryReport::default()
    }
}
