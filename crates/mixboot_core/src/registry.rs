//! Patch descriptor registry shared by toggles and collaborators.
//!
//! # Responsibility
//! - Collect `(phase, descriptor) -> predicates` submissions and rejections.
//! - Reject invalid submissions with a typed error, leaving state untouched.
//!
//! # Invariants
//! - Descriptor names are stored trimmed and never empty.
//! - After `release`, every collection is empty and every mutation fails
//!   with `RegistryError::Released`.

use log::{error, info};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Deferred enablement vote. `None` means the vote could not be computed.
pub type Predicate = Box<dyn Fn() -> Option<bool>>;

/// Load phase of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Targets host/engine classes, applied before units are constructed.
    Early,
    /// Targets unit classes, applied once all units are visible.
    Late,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Early => "early",
            Self::Late => "late",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    MissingOrEmptyResource,
    NullPredicate(String),
    Released,
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOrEmptyResource => write!(f, "descriptor name is missing or empty"),
            Self::NullPredicate(name) => write!(f, "predicate is missing for descriptor: {name}"),
            Self::Released => write!(f, "registry was already released"),
        }
    }
}

impl Error for RegistryError {}

/// Descriptor queues for both phases plus the rejection set.
#[derive(Default)]
pub struct PatchRegistry {
    early: BTreeMap<String, Vec<Predicate>>,
    late: BTreeMap<String, Vec<Predicate>>,
    rejections: BTreeSet<String>,
    released: bool,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one predicate for `resource` in `phase`.
    pub fn enqueue(
        &mut self,
        phase: Phase,
        resource: &str,
        predicate: Option<Predicate>,
    ) -> Result<(), RegistryError> {
        let result = self.try_enqueue(phase, resource, predicate);
        if let Err(err) = &result {
            error!(
                "event=registry_enqueue module=registry status=error phase={} resource=\"{}\" error={}",
                phase,
                resource.trim(),
                err
            );
        }
        result
    }

    pub fn enqueue_with<F>(
        &mut self,
        phase: Phase,
        resource: &str,
        predicate: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Option<bool> + 'static,
    {
        self.enqueue(phase, resource, Some(Box::new(predicate)))
    }

    /// Adds a constant vote.
    pub fn enqueue_enabled(
        &mut self,
        phase: Phase,
        resource: &str,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        self.enqueue_with(phase, resource, move || Some(enabled))
    }

    /// Adds every name with an always-true vote. Stops at the first failure.
    pub fn enqueue_all<I, S>(&mut self, phase: Phase, resources: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for resource in resources {
            self.enqueue_enabled(phase, resource.as_ref(), true)?;
        }
        Ok(())
    }

    /// Blocks `resource` from loading in either phase, whatever its votes.
    pub fn reject(&mut self, resource: &str) -> Result<(), RegistryError> {
        let result = self.try_reject(resource);
        match &result {
            Ok(()) => info!(
                "event=registry_reject module=registry status=ok resource=\"{}\"",
                resource.trim()
            ),
            Err(err) => error!(
                "event=registry_reject module=registry status=error resource=\"{}\" error={}",
                resource.trim(),
                err
            ),
        }
        result
    }

    /// Drops all queued state. Only the first call succeeds.
    pub fn release(&mut self) -> Result<(), RegistryError> {
        if self.released {
            return Err(RegistryError::Released);
        }
        self.early.clear();
        self.late.clear();
        self.rejections.clear();
        self.released = true;
        info!("event=registry_release module=registry status=ok");
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Queued descriptors of `phase` with their predicates, sorted by name.
    /// Read by the phase scheduler when its hook arrives; empty after release.
    pub fn entries(&self, phase: Phase) -> &BTreeMap<String, Vec<Predicate>> {
        match phase {
            Phase::Early => &self.early,
            Phase::Late => &self.late,
        }
    }

    /// Names the phase scheduler must never load; empty after release.
    pub fn rejections(&self) -> &BTreeSet<String> {
        &self.rejections
    }

    pub fn is_rejected(&self, resource: &str) -> bool {
        self.rejections.contains(resource.trim())
    }

    pub fn len(&self) -> usize {
        self.early.len() + self.late.len()
    }

    pub fn is_empty(&self) -> bool {
        self.early.is_empty() && self.late.is_empty()
    }

    fn try_enqueue(
        &mut self,
        phase: Phase,
        resource: &str,
        predicate: Option<Predicate>,
    ) -> Result<(), RegistryError> {
        if self.released {
            return Err(RegistryError::Released);
        }
        let name = normalize(resource)?;
        let predicate = predicate.ok_or_else(|| RegistryError::NullPredicate(name.clone()))?;
        let queue = match phase {
            Phase::Early => &mut self.early,
            Phase::Late => &mut self.late,
        };
        queue.entry(name).or_default().push(predicate);
        Ok(())
    }

    fn try_reject(&mut self, resource: &str) -> Result<(), RegistryError> {
        if self.released {
            return Err(RegistryError::Released);
        }
        let name = normalize(resource)?;
        self.rejections.insert(name);
        Ok(())
    }
}

fn normalize(resource: &str) -> Result<String, RegistryError> {
    let name = resource.trim();
    if name.is_empty() {
        return Err(RegistryError::MissingOrEmptyResource);
    }
    Ok(name.to_string())
}
