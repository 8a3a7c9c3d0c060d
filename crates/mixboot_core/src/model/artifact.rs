//! Candidate artifact model and dependency coordinates.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_EXTENSION: &str = "jar";

/// Where a candidate artifact was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// Plain file inside one of the artifact directories.
    Direct,
    /// File resolved from a dependency coordinate in a mod list.
    Resolved { coordinate: ArtifactCoordinate },
}

/// One archive to be scanned. Consumed by the extractor, not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArtifact {
    pub path: PathBuf,
    pub origin: ArtifactOrigin,
}

impl CandidateArtifact {
    pub fn direct(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: ArtifactOrigin::Direct,
        }
    }

    pub fn resolved(path: impl Into<PathBuf>, coordinate: ArtifactCoordinate) -> Self {
        Self {
            path: path.into(),
            origin: ArtifactOrigin::Resolved { coordinate },
        }
    }

    /// File name used in log lines.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Maven-style coordinate `group:name:version[:classifier][@extension]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactCoordinate {
    pub group: String,
    pub name: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl ArtifactCoordinate {
    /// Parses one coordinate string.
    pub fn parse(value: &str) -> Result<Self, CoordinateError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CoordinateError::Empty);
        }

        let (body, extension) = match trimmed.split_once('@') {
            Some((body, ext)) if !ext.is_empty() => (body, ext.to_string()),
            Some(_) => return Err(CoordinateError::Malformed(trimmed.to_string())),
            None => (trimmed, DEFAULT_EXTENSION.to_string()),
        };

        let parts: Vec<&str> = body.split(':').collect();
        if !(3..=4).contains(&parts.len()) || parts.iter().any(|part| part.is_empty()) {
            return Err(CoordinateError::Malformed(trimmed.to_string()));
        }

        Ok(Self {
            group: parts[0].to_string(),
            name: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).map(|value| value.to_string()),
            extension,
        })
    }

    /// File name inside the version directory, e.g. `lib-1.0-dev.jar`.
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.name, self.version, classifier, self.extension
            ),
            None => format!("{}-{}.{}", self.name, self.version, self.extension),
        }
    }

    /// Path of this coordinate relative to a maven-layout repository root.
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in self.group.split('.') {
            path.push(segment);
        }
        path.push(&self.name);
        path.push(&self.version);
        path.push(self.file_name());
        path
    }

    pub fn resolve_in(&self, repository_root: &Path) -> PathBuf {
        repository_root.join(self.relative_path())
    }
}

impl Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        if self.extension != DEFAULT_EXTENSION {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}

/// Coordinate parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    Empty,
    Malformed(String),
}

impl Display for CoordinateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "artifact coordinate must not be empty"),
            Self::Malformed(value) => write!(
                f,
                "artifact coordinate is malformed: {value} (expected group:name:version[:classifier][@ext])"
            ),
        }
    }
}

impl Error for CoordinateError {}
