//! Loaded proving keys, addressed by circuit identifier.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::binfile::ArtifactError;
use crate::zkey::{load_proving_key, LoadOptions, ProvingKey};

/// Startup failures while building the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Two key files share a stem.
    #[error("circuit `{0}` is loaded twice")]
    DuplicateCircuit(String),
    /// A key file could not be read or failed validation.
    #[error("failed to load {path}: {source}")]
    Load {
        /// Offending file.
        path: String,
        /// Why it was rejected.
        #[source]
        source: ArtifactError,
    },
}

/// Read-only after startup; shared by every job.
#[derive(Debug, Default, Clone)]
pub struct CircuitRegistry {
    keys: BTreeMap<String, Arc<ProvingKey>>,
}

impl CircuitRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validated key under its `circuit_id`.
    pub fn insert(&mut self, key: ProvingKey) -> Result<(), RegistryError> {
        if self.keys.contains_key(&key.circuit_id) {
            return Err(RegistryError::DuplicateCircuit(key.circuit_id));
        }
        self.keys.insert(key.circuit_id.clone(), Arc::new(key));
        Ok(())
    }

    /// Load every path; identifiers come from file stems.
    pub fn load_paths<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
        opts: LoadOptions,
    ) -> Result<Self, RegistryError> {
        let mut reg = Self::new();
        for p in paths {
            let p = p.as_ref();
            let key = load_proving_key(p, opts).map_err(|source| RegistryError::Load {
                path: p.display().to_string(),
                source,
            })?;
            reg.insert(key)?;
        }
        Ok(reg)
    }

    /// Shared handle to the key for `circuit_id`.
    pub fn get(&self, circuit_id: &str) -> Option<Arc<ProvingKey>> {
        self.keys.get(circuit_id).cloned()
    }

    /// Identifiers in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    /// Keys in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProvingKey>> + '_ {
        self.keys.values()
    }

    /// Number of loaded keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// `true` when no key is loaded.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_zkey::{example_circuit, generate_dev_zkey, power_circuit};

    #[test]
    fn loads_keys_by_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("square.zkey");
        let b = dir.path().join("power.zkey");
        std::fs::write(&a, generate_dev_zkey(&example_circuit(), 1).unwrap()).unwrap();
        std::fs::write(&b, generate_dev_zkey(&power_circuit(2), 1).unwrap()).unwrap();

        let reg = CircuitRegistry::load_paths([&a, &b], LoadOptions::default()).unwrap();
        assert_eq!(reg.ids(), vec!["power".to_string(), "square".to_string()]);
        assert_eq!(reg.get("square").unwrap().n_vars, 4);
        assert!(reg.get("cube").is_none());
    }

    #[test]
    fn duplicate_ids_and_bad_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("square.zkey");
        std::fs::write(&a, generate_dev_zkey(&example_circuit(), 1).unwrap()).unwrap();
        assert!(matches!(
            CircuitRegistry::load_paths([&a, &a], LoadOptions::default()),
            Err(RegistryError::DuplicateCircuit(id)) if id == "square"
        ));

        let junk = dir.path().join("junk.zkey");
        std::fs::write(&junk, b"not a key").unwrap();
        assert!(matches!(
            CircuitRegistry::load_paths([&junk], LoadOptions::default()),
            Err(RegistryError::Load { .. })
        ));
    }
}
