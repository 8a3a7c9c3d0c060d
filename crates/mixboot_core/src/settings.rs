//! Read-only view over persisted per-unit boolean settings.
//!
//! # Responsibility
//! - Read `<settings_dir>/<unit>.cfg` once per unit and keep only boolean lines.
//! - Answer toggle lookups, falling back to the caller's default.
//!
//! # Invariants
//! - Each unit is read from disk at most once per store.
//! - A missing or unreadable file caches a missing marker; lookups then
//!   return defaults.
//! - Field names match case-sensitively.

use log::{error, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const SETTINGS_EXTENSION: &str = "cfg";
const BOOLEAN_LINE_PREFIX: &str = "B:";

/// Per-unit cache of filtered boolean setting lines.
#[derive(Debug)]
pub struct SettingsStore {
    settings_dir: PathBuf,
    cache: RefCell<HashMap<String, Option<String>>>,
    disk_reads: Cell<usize>,
}

impl SettingsStore {
    pub fn new(settings_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings_dir: settings_dir.into(),
            cache: RefCell::new(HashMap::new()),
            disk_reads: Cell::new(0),
        }
    }

    pub fn settings_dir(&self) -> &Path {
        &self.settings_dir
    }

    pub fn unit_path(&self, unit: &str) -> PathBuf {
        self.settings_dir.join(format!("{unit}.{SETTINGS_EXTENSION}"))
    }

    /// Returns the persisted value of `field` in `unit`, or `default` when the
    /// file or the field is absent.
    pub fn get_boolean(&self, unit: &str, field: &str, default: bool) -> bool {
        let mut cache = self.cache.borrow_mut();
        let filtered = cache
            .entry(unit.to_string())
            .or_insert_with(|| self.read_unit(unit));
        let Some(text) = filtered.as_deref() else {
            return default;
        };
        lookup_boolean(text, field).unwrap_or(default)
    }

    /// Number of settings files read from disk so far.
    pub fn disk_reads(&self) -> usize {
        self.disk_reads.get()
    }

    fn read_unit(&self, unit: &str) -> Option<String> {
        let path = self.unit_path(unit);
        self.disk_reads.set(self.disk_reads.get() + 1);
        if !path.is_file() {
            warn!(
                "event=settings_read module=settings status=warn unit={} path={} detail=missing_using_defaults",
                unit,
                path.display()
            );
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(raw) => Some(filter_boolean_lines(&raw)),
            Err(err) => {
                error!(
                    "event=settings_read module=settings status=error unit={} path={} error={}",
                    unit,
                    path.display(),
                    err
                );
                None
            }
        }
    }
}

/// Keeps only lines declaring boolean settings, leading whitespace removed.
pub fn filter_boolean_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| line.starts_with(BOOLEAN_LINE_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Some(value)` when `B:"<field>"=` is declared, `None` when not yet persisted.
pub fn lookup_boolean(filtered: &str, field: &str) -> Option<bool> {
    let declaration = format!("{BOOLEAN_LINE_PREFIX}\"{field}\"=");
    if !filtered.contains(&declaration) {
        return None;
    }
    Some(filtered.contains(&format!("{declaration}true")))
}

#[cfg(test)]
mod tests {
    use super::{filter_boolean_lines, lookup_boolean};

    const SAMPLE: &str = concat!(
        "# Configuration file\n",
        "general {\n",
        "    B:\"Feature\"=true\n",
        "    I:\"Count\"=3\n",
        "\tB:\"Other Feature\"=false\n",
        "}\n",
    );

    #[test]
    fn filter_keeps_only_boolean_lines() {
        assert_eq!(
            filter_boolean_lines(SAMPLE),
            "B:\"Feature\"=true\nB:\"Other Feature\"=false"
        );
    }

    #[test]
    fn lookup_distinguishes_absent_from_false() {
        let filtered = filter_boolean_lines(SAMPLE);
        assert_eq!(lookup_boolean(&filtered, "Feature"), Some(true));
        assert_eq!(lookup_boolean(&filtered, "Other Feature"), Some(false));
        assert_eq!(lookup_boolean(&filtered, "Count"), None);
        assert_eq!(lookup_boolean(&filtered, "feature"), None);
    }
}
