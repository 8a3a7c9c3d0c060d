//! Archive walker that recovers unit identifiers and toggle classes.
//!
//! # Responsibility
//! - Read the embedded manifest and every class entry of one archive.
//! - Apply the skip fragments and identifier override table.
//!
//! # Invariants
//! - A failing class entry is logged and skipped; the archive scan goes on.
//! - An override hit records its identifier and ends the scan of that archive.
//! - No class is ever loaded, linked or executed.

use crate::config::{BootConfig, IdentifierOverride};
use crate::discovery::classfile::ClassFile;
use crate::discovery::manifest::{manifest_identifiers, MANIFEST_ENTRY};
use crate::discovery::markers::inspect_class;
use crate::model::artifact::CandidateArtifact;
use crate::model::toggle::ToggleClass;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{Read, Seek};

/// Largest class entry read into memory, declared or actual.
pub const MAX_CLASS_BYTES: u64 = 16 * 1024 * 1024;

static CLASS_ENTRY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s$]+(\$[^\s]+)?\.class$").expect("class entry pattern is valid")
});

/// Returns whether an archive entry name looks like a compiled class.
pub fn is_class_entry(name: &str) -> bool {
    CLASS_ENTRY_PATTERN.is_match(name)
}

/// Everything one archive contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub unit_ids: Vec<String>,
    pub toggle_classes: Vec<ToggleClass>,
    /// Identifier assigned by the override table, when one matched.
    pub override_hit: Option<String>,
    pub classes_parsed: usize,
    pub classes_failed: usize,
}

#[derive(Debug)]
pub enum ExtractError {
    Open {
        artifact: String,
        source: std::io::Error,
    },
    Archive {
        artifact: String,
        source: zip::result::ZipError,
    },
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { artifact, source } => write!(f, "failed to open {artifact}: {source}"),
            Self::Archive { artifact, source } => {
                write!(f, "failed to read archive {artifact}: {source}")
            }
        }
    }
}

impl Error for ExtractError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Archive { source, .. } => Some(source),
        }
    }
}

/// Static metadata extractor configured with skip and override tables.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    skipped_fragments: Vec<String>,
    overrides: Vec<IdentifierOverride>,
}

impl MetadataExtractor {
    pub fn new(skipped_fragments: Vec<String>, overrides: Vec<IdentifierOverride>) -> Self {
        Self {
            skipped_fragments,
            overrides,
        }
    }

    pub fn from_config(config: &BootConfig) -> Self {
        Self::new(
            config.skipped_entry_fragments.clone(),
            config.identifier_overrides.clone(),
        )
    }

    /// Opens and scans one candidate archive.
    pub fn extract(&self, artifact: &CandidateArtifact) -> Result<ArtifactMetadata, ExtractError> {
        let label = artifact.display_name();
        let file = File::open(&artifact.path).map_err(|err| ExtractError::Open {
            artifact: label.clone(),
            source: err,
        })?;
        self.extract_from(file, &label)
    }

    /// Scans an archive from any seekable reader.
    pub fn extract_from<R: Read + Seek>(
        &self,
        reader: R,
        label: &str,
    ) -> Result<ArtifactMetadata, ExtractError> {
        let mut archive = zip::ZipArchive::new(reader).map_err(|err| ExtractError::Archive {
            artifact: label.to_string(),
            source: err,
        })?;
        let mut metadata = ArtifactMetadata::default();

        if let Some(raw) = read_entry_text(&mut archive, MANIFEST_ENTRY) {
            match manifest_identifiers(&raw) {
                Ok(ids) => metadata.unit_ids.extend(ids),
                Err(err) => debug!(
                    "event=manifest_parse module=discovery status=warn artifact={} error={}",
                    label, err
                ),
            }
        }

        for index in 0..archive.len() {
            let mut entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(err) => {
                    info!(
                        "event=entry_read module=discovery status=warn artifact={} index={} error={}",
                        label, index, err
                    );
                    metadata.classes_failed += 1;
                    continue;
                }
            };
            let name = entry.name().to_string();

            if self.is_skipped(&name) {
                continue;
            }
            if let Some(rule) = self.override_for(&name) {
                debug!(
                    "event=identifier_override module=discovery status=ok artifact={} entry={} unit={}",
                    label, name, rule.unit_id
                );
                metadata.unit_ids.push(rule.unit_id.clone());
                metadata.override_hit = Some(rule.unit_id.clone());
                return Ok(metadata);
            }
            if !is_class_entry(&name) {
                continue;
            }

            if entry.size() > MAX_CLASS_BYTES {
                metadata.classes_failed += 1;
                info!(
                    "event=class_read module=discovery status=warn artifact={} entry={} declared_size={} error=entry_too_large",
                    label,
                    name,
                    entry.size()
                );
                continue;
            }
            let parsed = read_bounded(&mut entry)
                .and_then(|bytes| ClassFile::parse(&bytes).map_err(|err| err.to_string()))
                .and_then(|class| inspect_class(&class).map_err(|err| err.to_string()));
            match parsed {
                Ok(class_metadata) => {
                    metadata.classes_parsed += 1;
                    if let Some(unit_id) = class_metadata.unit_id {
                        metadata.unit_ids.push(unit_id);
                    }
                    if let Some(toggle_class) = class_metadata.toggle_class {
                        metadata.toggle_classes.push(toggle_class);
                    }
                }
                Err(err) => {
                    metadata.classes_failed += 1;
                    info!(
                        "event=class_parse module=discovery status=warn artifact={} entry={} error={} note=likely_fine_to_ignore",
                        label, name, err
                    );
                }
            }
        }

        Ok(metadata)
    }

    fn is_skipped(&self, name: &str) -> bool {
        self.skipped_fragments
            .iter()
            .any(|fragment| name.contains(fragment.as_str()))
    }

    fn override_for(&self, name: &str) -> Option<&IdentifierOverride> {
        self.overrides
            .iter()
            .find(|rule| !rule.fragment.is_empty() && name.contains(rule.fragment.as_str()))
    }
}

/// Reads at most `MAX_CLASS_BYTES`; a longer stream is an error.
fn read_bounded(entry: impl Read) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    entry
        .take(MAX_CLASS_BYTES + 1)
        .read_to_end(&mut bytes)
        .map_err(|err| err.to_string())?;
    if bytes.len() as u64 > MAX_CLASS_BYTES {
        return Err(format!("entry exceeds {MAX_CLASS_BYTES} bytes"));
    }
    Ok(bytes)
}

fn read_entry_text<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut raw = String::new();
    entry.read_to_string(&mut raw).ok()?;
    Some(raw)
}
