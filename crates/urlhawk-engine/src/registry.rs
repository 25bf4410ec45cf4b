//! The probe registry: a name-keyed table built once at startup.
//!
//! Registration needs `&mut Registry`, and the orchestrator only ever holds
//! an `Arc<Registry>`, so the table cannot change once scanning starts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use urlhawk_core::types::URL_KEY;
use urlhawk_core::ProbeInfo;

use crate::error::{EngineError, Result};
use crate::probe::Probe;

/// A registered probe.
#[derive(Clone)]
pub struct ProbeDescriptor {
    pub name: String,
    pub description: String,
    pub probe: Arc<dyn Probe>,
}

impl fmt::Debug for ProbeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl ProbeDescriptor {
    pub fn info(&self) -> ProbeInfo {
        ProbeInfo {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    probes: BTreeMap<String, ProbeDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a probe, replacing any existing probe of the same name.
    ///
    /// Returns the replaced descriptor. `url` is reserved for the scan
    /// target and rejected.
    pub fn register(
        &mut self,
        name: &str,
        description: &str,
        probe: Arc<dyn Probe>,
    ) -> Result<Option<ProbeDescriptor>> {
        if name == URL_KEY {
            return Err(EngineError::ReservedName {
                name: name.to_string(),
            });
        }

        let descriptor = ProbeDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            probe,
        };
        let previous = self.probes.insert(name.to_string(), descriptor);
        if previous.is_some() {
            tracing::warn!(probe = %name, "Probe re-registered, previous entry replaced");
        } else {
            tracing::debug!(probe = %name, "Probe registered");
        }
        Ok(previous)
    }

    /// All descriptors, sorted by name.
    pub fn list(&self) -> impl Iterator<Item = &ProbeDescriptor> {
        self.probes.values()
    }

    pub fn lookup(&self, name: &str) -> Option<&ProbeDescriptor> {
        self.probes.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.probes.keys().cloned().collect()
    }

    pub fn infos(&self) -> Vec<ProbeInfo> {
        self.list().map(ProbeDescriptor::info).collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}
