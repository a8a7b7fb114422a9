use std::sync::Arc;

use dashmap::DashMap;

use crate::stats::ProjectorStats;

/// Owned table of per-projector statistics, keyed by projector id.
///
/// DashMap gives per-bucket locking, so lookups and first-observation inserts
/// from different projectors never contend on a global mutex. Callers hold
/// `Arc` handles; the registry controls retention.
pub struct ProjectorRegistry {
    projectors: DashMap<String, Arc<ProjectorStats>>,
}

impl ProjectorRegistry {
    pub fn new() -> Self {
        Self {
            projectors: DashMap::new(),
        }
    }

    /// Look up a projector's stats, creating the entry on first observation.
    pub fn get_or_create(&self, id: &str) -> Arc<ProjectorStats> {
        self.projectors
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(ProjectorStats::new(id)))
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<ProjectorStats>> {
        self.projectors.get(id).map(|entry| entry.value().clone())
    }

    /// Clone out the current set of handles; iteration holds each bucket
    /// lock only briefly.
    pub fn snapshot(&self) -> Vec<Arc<ProjectorStats>> {
        self.projectors
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.projectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectors.is_empty()
    }
}

impl Default for ProjectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn get_or_create_returns_same_instance_per_id() {
        let registry = ProjectorRegistry::new();
        let a = registry.get_or_create("importer");
        let b = registry.get_or_create("importer");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_misses_unknown_ids() {
        let registry = ProjectorRegistry::new();
        registry.get_or_create("importer");
        assert!(registry.get("importer").is_some());
        assert!(registry.get("exporter").is_none());
    }

    #[test]
    fn snapshot_contains_every_registered_projector() {
        let registry = ProjectorRegistry::new();
        for id in ["a", "b", "c"] {
            registry.get_or_create(id);
        }
        let mut ids: Vec<String> = registry
            .snapshot()
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn concurrent_first_observations_converge_on_one_entry() {
        let registry = Arc::new(ProjectorRegistry::new());
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let stats = registry.get_or_create("importer");
                    stats.store_property(format!("thread{i}"), "seen", ts);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 1);
        let stats = registry.get("importer").unwrap();
        assert_eq!(stats.get_properties().len(), 8);
    }
}
