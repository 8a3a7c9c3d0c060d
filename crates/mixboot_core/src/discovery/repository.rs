//! Dependency-coordinate resolution from mod-list files.
//!
//! A mod list is a JSON document
//! `{"repositoryRoot": "...", "modRef": ["group:name:version"], "parentList": "..."}`.
//! Each reference resolves against a maven-layout repository directory.

use crate::model::artifact::{ArtifactCoordinate, CandidateArtifact};
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Source of artifacts named by coordinates rather than by file.
pub trait DependencyResolver {
    /// Resolves every known coordinate to an existing file.
    fn resolve_all(&self) -> Vec<CandidateArtifact>;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModListFile {
    #[serde(default)]
    repository_root: Option<PathBuf>,
    #[serde(default)]
    mod_ref: Vec<String>,
    #[serde(default)]
    parent_list: Option<PathBuf>,
}

/// Resolver over mod-list files and their maven repositories.
#[derive(Debug, Clone)]
pub struct ModListResolver {
    base_dir: PathBuf,
    mod_lists: Vec<PathBuf>,
}

impl ModListResolver {
    /// `base_dir` anchors relative `repositoryRoot` / `parentList` values.
    pub fn new(base_dir: impl Into<PathBuf>, mod_lists: Vec<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            mod_lists,
        }
    }

    fn resolve_list(
        &self,
        list_path: &Path,
        visited: &mut BTreeSet<PathBuf>,
        out: &mut Vec<CandidateArtifact>,
    ) {
        if !visited.insert(list_path.to_path_buf()) {
            warn!(
                "event=mod_list_cycle module=discovery status=warn list={}",
                list_path.display()
            );
            return;
        }
        if !list_path.is_file() {
            return;
        }

        let parsed = std::fs::read_to_string(list_path)
            .map_err(|err| err.to_string())
            .and_then(|raw| {
                serde_json::from_str::<ModListFile>(&raw).map_err(|err| err.to_string())
            });
        let list = match parsed {
            Ok(list) => list,
            Err(err) => {
                warn!(
                    "event=mod_list_read module=discovery status=warn list={} error={}",
                    list_path.display(),
                    err
                );
                return;
            }
        };

        let repository_root = list
            .repository_root
            .as_deref()
            .map(|root| self.anchor(root))
            .unwrap_or_else(|| self.base_dir.join("libraries"));

        for reference in &list.mod_ref {
            let coordinate = match ArtifactCoordinate::parse(reference) {
                Ok(coordinate) => coordinate,
                Err(err) => {
                    warn!(
                        "event=mod_ref_parse module=discovery status=warn list={} error={}",
                        list_path.display(),
                        err
                    );
                    continue;
                }
            };
            let path = coordinate.resolve_in(&repository_root);
            if path.is_file() {
                out.push(CandidateArtifact::resolved(path, coordinate));
            } else {
                info!(
                    "event=mod_ref_resolve module=discovery status=warn coordinate={} path={}",
                    coordinate,
                    path.display()
                );
            }
        }

        if let Some(parent) = list.parent_list.as_deref() {
            let parent = self.anchor(parent);
            self.resolve_list(&parent, visited, out);
        }
    }

    fn anchor(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl DependencyResolver for ModListResolver {
    fn resolve_all(&self) -> Vec<CandidateArtifact> {
        let mut visited = BTreeSet::new();
        let mut out = Vec::new();
        for list_path in &self.mod_lists {
            self.resolve_list(list_path, &mut visited, &mut out);
        }
        out
    }
}
