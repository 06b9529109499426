//! Lookup cache
//!
//! Maps ids, sanitized names and hostnames to configuration records. The
//! cache is populated by enumeration (cache-aside): records are refreshed
//! only by re-enumeration or by commands writing through the update
//! operations below.

use std::collections::HashMap;

use propctl_core::model::sanitize_name;
use propctl_core::{ConfigRecord, Network};

/// A change to the version pointers of a cached record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionUpdate {
    /// A version was created; `latest_version` never moves backwards
    Created(u32),
    /// The active version on a network changed (`None` = nothing active)
    Active {
        network: Network,
        version: Option<u32>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct LookupCache {
    initialized: bool,
    by_id: HashMap<String, ConfigRecord>,
    /// sanitized name → id
    by_name: HashMap<String, String>,
    /// lowercased sanitized name → ids
    by_folded_name: HashMap<String, Vec<String>>,
    /// lowercased hostname → id, per network
    by_host: HashMap<Network, HashMap<String, String>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a full enumeration has completed since the last `clear`
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// True until an enumeration has left at least one record behind
    ///
    /// An enumeration that cached nothing (every group denied, or a failed
    /// first attempt) does not count.
    pub fn needs_enumeration(&self) -> bool {
        !self.initialized || self.by_id.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ConfigRecord> {
        self.by_id.get(id)
    }

    /// Local resolution cascade: id, sanitized name (exact, then
    /// case-folded if unambiguous), then the hostname table of `network`
    pub fn lookup(&self, key: &str, network: Network) -> Option<&ConfigRecord> {
        if let Some(record) = self.by_id.get(key) {
            return Some(record);
        }

        let sanitized = sanitize_name(key);
        if let Some(record) = self.by_name.get(&sanitized).and_then(|id| self.by_id.get(id)) {
            return Some(record);
        }
        if let Some([id]) = self
            .by_folded_name
            .get(&sanitized.to_lowercase())
            .map(Vec::as_slice)
        {
            if let Some(record) = self.by_id.get(id) {
                return Some(record);
            }
        }

        self.by_host
            .get(&network)
            .and_then(|hosts| hosts.get(&key.to_lowercase()))
            .and_then(|id| self.by_id.get(id))
    }

    /// Insert or replace a record, re-indexing its name
    pub fn upsert(&mut self, record: ConfigRecord) {
        if let Some(previous) = self.by_id.get(&record.id) {
            let old_name = previous.sanitized_name();
            if old_name != record.sanitized_name() {
                self.unindex_name(&record.id, &old_name);
            }
        }

        let sanitized = record.sanitized_name();
        if let Some(other) = self.by_name.get(&sanitized) {
            if other != &record.id {
                tracing::warn!(
                    name = %sanitized,
                    existing = %other,
                    incoming = %record.id,
                    "sanitized name collision, latest record wins"
                );
            }
        }
        self.by_name.insert(sanitized.clone(), record.id.clone());
        let folded = self.by_folded_name.entry(sanitized.to_lowercase()).or_default();
        if !folded.contains(&record.id) {
            folded.push(record.id.clone());
        }

        self.by_id.insert(record.id.clone(), record);
    }

    /// Apply a version change to a cached record
    ///
    /// Returns the updated record, or `None` when `id` is not cached.
    pub fn update_versions(&mut self, id: &str, update: VersionUpdate) -> Option<&ConfigRecord> {
        let record = self.by_id.get_mut(id)?;
        match update {
            VersionUpdate::Created(version) => {
                record.latest_version = record.latest_version.max(version);
            }
            VersionUpdate::Active { network, version } => {
                record.set_active_version(network, version);
            }
        }
        Some(&*record)
    }

    /// Associate a hostname with a cached record on one network
    pub fn index_hostname(&mut self, hostname: &str, network: Network, id: &str) {
        self.by_host
            .entry(network)
            .or_default()
            .insert(hostname.to_lowercase(), id.to_string());
    }

    /// Remove a record and every index entry pointing at it
    pub fn evict(&mut self, id: &str) -> Option<ConfigRecord> {
        let record = self.by_id.remove(id)?;
        self.unindex_name(id, &record.sanitized_name());
        for hosts in self.by_host.values_mut() {
            hosts.retain(|_, target| target != id);
        }
        Some(record)
    }

    /// Drop everything; the next resolve re-enumerates
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn unindex_name(&mut self, id: &str, sanitized: &str) {
        if self.by_name.get(sanitized).map(String::as_str) == Some(id) {
            self.by_name.remove(sanitized);
        }
        let folded_key = sanitized.to_lowercase();
        if let Some(ids) = self.by_folded_name.get_mut(&folded_key) {
            ids.retain(|other| other != id);
            if ids.is_empty() {
                self.by_folded_name.remove(&folded_key);
            }
        }
    }
}
