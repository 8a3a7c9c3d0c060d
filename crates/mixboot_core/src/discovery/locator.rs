//! Candidate artifact enumeration.
//!
//! # Responsibility
//! - List archives placed directly in the artifact directories.
//! - Merge in archives resolved through a `DependencyResolver`.
//!
//! # Invariants
//! - Each canonical path appears once; the first occurrence wins and direct
//!   files are listed before resolved ones.

use crate::config::BootConfig;
use crate::discovery::repository::{DependencyResolver, ModListResolver};
use crate::model::artifact::CandidateArtifact;
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip"];

pub struct ArtifactLocator {
    artifact_dirs: Vec<PathBuf>,
    resolver: Box<dyn DependencyResolver>,
}

impl ArtifactLocator {
    pub fn new(artifact_dirs: Vec<PathBuf>, resolver: Box<dyn DependencyResolver>) -> Self {
        Self {
            artifact_dirs,
            resolver,
        }
    }

    /// Locator over the configured directories and mod lists.
    pub fn from_config(config: &BootConfig) -> Self {
        Self::new(
            config.artifact_dir_paths(),
            Box::new(ModListResolver::new(
                config.game_dir.clone(),
                config.mod_list_paths(),
            )),
        )
    }

    /// Returns the deduplicated candidate list.
    pub fn locate(&self) -> Vec<CandidateArtifact> {
        let mut seen = BTreeSet::new();
        let mut candidates = Vec::new();

        for dir in &self.artifact_dirs {
            for path in archives_in(dir) {
                if seen.insert(canonical(&path)) {
                    candidates.push(CandidateArtifact::direct(path));
                }
            }
        }
        let direct_count = candidates.len();

        for artifact in self.resolver.resolve_all() {
            if seen.insert(canonical(&artifact.path)) {
                candidates.push(artifact);
            } else {
                debug!(
                    "event=artifact_dedup module=discovery status=ok path={}",
                    artifact.path.display()
                );
            }
        }

        info!(
            "event=artifact_locate module=discovery status=ok direct={} resolved={}",
            direct_count,
            candidates.len() - direct_count
        );
        candidates
    }
}

fn archives_in(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(
                "event=artifact_dir module=discovery status=skip dir={} error={}",
                dir.display(),
                err
            );
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_archive_extension(path))
        .collect();
    paths.sort();
    paths
}

fn has_archive_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
