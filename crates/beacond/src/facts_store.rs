//! Facts Registry store: loads registry YAML files and serves lookups.
//!
//! Registries are cached after first load and immutable until an explicit
//! reload. Lookups never fail for absence: a missing fact is `None`, a
//! prefix with no matches is an empty list.

use beacon_common::{Fact, FactsRegistry, RegistryInfo, RegistryValidationError};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info};

/// Registry load failures. Query methods never return these; absence is not
/// an error at this layer.
#[derive(Debug, Error)]
pub enum FactsStoreError {
    #[error("registry file not found: {0}")]
    RegistryNotFound(PathBuf),

    #[error("failed to read registry file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse registry '{name}': {source}")]
    Parse {
        name: String,
        source: serde_yaml::Error,
    },

    #[error("registry '{name}' failed validation: {source}")]
    Validation {
        name: String,
        source: RegistryValidationError,
    },

    #[error("registry '{0}' is not loaded")]
    NotLoaded(String),
}

/// In-memory store over one or more facts registries.
///
/// Safe for concurrent use: racing first-access loads of the same registry
/// resolve to a single disk read, and readers never block each other.
pub struct FactStore {
    facts_dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<FactsRegistry>>>,
}

impl FactStore {
    pub fn new(facts_dir: impl Into<PathBuf>) -> Self {
        Self {
            facts_dir: facts_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn registry_path(&self, registry_name: &str) -> PathBuf {
        self.facts_dir.join(format!("{registry_name}.yaml"))
    }

    /// Load a registry by name, returning the cached copy when present.
    pub fn load_registry(&self, registry_name: &str) -> Result<Arc<FactsRegistry>, FactsStoreError> {
        {
            let cache = self.cache.read().expect("facts cache poisoned");
            if let Some(registry) = cache.get(registry_name) {
                debug!("Returning cached registry: {}", registry_name);
                return Ok(registry.clone());
            }
        }

        // Load under the write lock and re-check so two racing callers
        // produce exactly one disk read.
        let mut cache = self.cache.write().expect("facts cache poisoned");
        if let Some(registry) = cache.get(registry_name) {
            return Ok(registry.clone());
        }

        let registry = Arc::new(self.read_registry(registry_name)?);
        cache.insert(registry_name.to_string(), registry.clone());
        info!(
            "Loaded registry '{}' with {} facts",
            registry_name,
            registry.facts.len()
        );
        Ok(registry)
    }

    /// Reload a registry from disk, replacing any cached copy.
    pub fn reload_registry(
        &self,
        registry_name: &str,
    ) -> Result<Arc<FactsRegistry>, FactsStoreError> {
        let registry = Arc::new(self.read_registry(registry_name)?);
        let mut cache = self.cache.write().expect("facts cache poisoned");
        cache.insert(registry_name.to_string(), registry.clone());
        info!(
            "Reloaded registry '{}' with {} facts",
            registry_name,
            registry.facts.len()
        );
        Ok(registry)
    }

    fn read_registry(&self, registry_name: &str) -> Result<FactsRegistry, FactsStoreError> {
        let path = self.registry_path(registry_name);
        if !path.exists() {
            return Err(FactsStoreError::RegistryNotFound(path));
        }

        let raw = fs::read_to_string(&path).map_err(|source| FactsStoreError::Io {
            path: path.clone(),
            source,
        })?;

        let mut registry: FactsRegistry =
            serde_yaml::from_str(&raw).map_err(|source| FactsStoreError::Parse {
                name: registry_name.to_string(),
                source,
            })?;

        registry
            .validate()
            .map_err(|source| FactsStoreError::Validation {
                name: registry_name.to_string(),
                source,
            })?;

        Ok(registry)
    }

    /// Look up one fact by exact id across all loaded registries.
    pub fn get_by_id(&self, fact_id: &str) -> Option<Fact> {
        let cache = self.cache.read().expect("facts cache poisoned");
        cache
            .values()
            .flat_map(|registry| registry.facts.iter())
            .find(|fact| fact.id == fact_id)
            .cloned()
    }

    /// All facts whose id starts with the prefix, in registry order.
    /// An empty prefix matches everything.
    pub fn get_by_prefix(&self, prefix: &str) -> Vec<Fact> {
        let cache = self.cache.read().expect("facts cache poisoned");
        cache
            .values()
            .flat_map(|registry| registry.facts.iter())
            .filter(|fact| fact.id.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// All facts from all loaded registries.
    pub fn get_all(&self) -> Vec<Fact> {
        let cache = self.cache.read().expect("facts cache poisoned");
        cache
            .values()
            .flat_map(|registry| registry.facts.iter())
            .cloned()
            .collect()
    }

    /// Metadata for a loaded registry.
    pub fn registry_info(&self, registry_name: &str) -> Result<RegistryInfo, FactsStoreError> {
        let cache = self.cache.read().expect("facts cache poisoned");
        let registry = cache
            .get(registry_name)
            .ok_or_else(|| FactsStoreError::NotLoaded(registry_name.to_string()))?;
        Ok(RegistryInfo {
            registry_name: registry_name.to_string(),
            version: registry.version.clone(),
            scope: registry.scope.clone(),
            last_updated: registry.last_updated,
            fact_count: registry.facts.len(),
        })
    }

    /// Names of all loaded registries.
    pub fn loaded_registries(&self) -> Vec<String> {
        let cache = self.cache.read().expect("facts cache poisoned");
        let mut names: Vec<String> = cache.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_REGISTRY: &str = r#"
version: "1.0.0"
last_updated: 2025-11-09
scope: boston_resident_parking_permit
facts:
  - id: rpp.eligibility.vehicle_class
    text: Vehicle must be a passenger vehicle or motorcycle
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    source_section: Eligibility
    last_verified: 2025-11-09
    confidence: high
  - id: rpp.eligibility.residency_duration
    text: Applicant must reside in Boston
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    last_verified: 2025-11-09
    confidence: high
  - id: rpp.proof_of_residency.recency
    text: Proof of residency must be dated within 30 days
    source_url: https://www.boston.gov/departments/parking-clerk/how-get-resident-parking-permit
    last_verified: 2025-11-09
    confidence: high
"#;

    fn store_with_sample() -> (tempfile::TempDir, FactStore) {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("boston_rpp.yaml")).unwrap();
        file.write_all(SAMPLE_REGISTRY.as_bytes()).unwrap();
        let store = FactStore::new(dir.path());
        store.load_registry("boston_rpp").unwrap();
        (dir, store)
    }

    #[test]
    fn test_get_by_id_found_and_absent() {
        let (_dir, store) = store_with_sample();
        assert!(store.get_by_id("rpp.eligibility.vehicle_class").is_some());
        assert!(store.get_by_id("rpp.fees.annual").is_none());
    }

    #[test]
    fn test_get_by_prefix() {
        let (_dir, store) = store_with_sample();
        let eligibility = store.get_by_prefix("rpp.eligibility");
        assert_eq!(eligibility.len(), 2);
        // empty prefix matches everything
        assert_eq!(store.get_by_prefix("").len(), 3);
        // no matches is an empty list, not an error
        assert!(store.get_by_prefix("rpp.fees").is_empty());
    }

    #[test]
    fn test_missing_registry_is_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FactStore::new(dir.path());
        assert!(matches!(
            store.load_registry("nope"),
            Err(FactsStoreError::RegistryNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let doubled = SAMPLE_REGISTRY.replace(
            "rpp.eligibility.residency_duration",
            "rpp.eligibility.vehicle_class",
        );
        fs::write(dir.path().join("broken.yaml"), doubled).unwrap();
        let store = FactStore::new(dir.path());
        assert!(matches!(
            store.load_registry("broken"),
            Err(FactsStoreError::Validation { .. })
        ));
    }

    #[test]
    fn test_load_is_cached_and_survives_file_removal() {
        let (dir, store) = store_with_sample();
        fs::remove_file(dir.path().join("boston_rpp.yaml")).unwrap();
        // second load hits the cache, not the disk
        assert!(store.load_registry("boston_rpp").is_ok());
        assert_eq!(store.loaded_registries(), vec!["boston_rpp".to_string()]);
    }

    #[test]
    fn test_concurrent_first_load_yields_one_registry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("boston_rpp.yaml"), SAMPLE_REGISTRY).unwrap();
        let store = Arc::new(FactStore::new(dir.path().to_path_buf()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.load_registry("boston_rpp").unwrap())
            })
            .collect();

        let registries: Vec<Arc<FactsRegistry>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        // all callers observe the same cached instance
        for registry in &registries[1..] {
            assert!(Arc::ptr_eq(&registries[0], registry));
        }
    }

    #[test]
    fn test_registry_info() {
        let (_dir, store) = store_with_sample();
        let info = store.registry_info("boston_rpp").unwrap();
        assert_eq!(info.fact_count, 3);
        assert_eq!(info.scope, "boston_resident_parking_permit");
        assert!(matches!(
            store.registry_info("unloaded"),
            Err(FactsStoreError::NotLoaded(_))
        ));
    }
}
