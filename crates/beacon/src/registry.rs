//! InstanceRegistry: process-wide, concurrency-safe lookup-or-create of
//! named instances, plus derivation of light instances.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use beacon_core::config::InstanceConfig;
use beacon_core::errors::{BeaconError, BeaconResult};
use beacon_core::traits::{ConnectivityProbe, Uploader};
use beacon_storage::StorageEngine;

use crate::instance::Instance;

/// Owns every instance in the process, keyed by instance id. Constructed
/// once at process start; lives for the process lifetime. Pass it (or the
/// instance handles it returns) explicitly instead of reaching for globals.
pub struct InstanceRegistry {
    storage: Arc<StorageEngine>,
    /// Immutable for the process lifetime and identical across instances.
    device_id: String,
    instances: DashMap<String, Arc<Instance>>,
    light_counter: AtomicU64,
}

impl InstanceRegistry {
    /// Open a registry backed by a database file on disk.
    pub fn open(path: &Path) -> BeaconResult<Self> {
        Self::with_storage(StorageEngine::open(path)?)
    }

    /// Open an in-memory registry (for testing).
    pub fn open_in_memory() -> BeaconResult<Self> {
        Self::with_storage(StorageEngine::open_in_memory()?)
    }

    fn with_storage(storage: StorageEngine) -> BeaconResult<Self> {
        let device_id = storage.get_or_create_device_id()?;
        Ok(Self {
            storage: Arc::new(storage),
            device_id,
            instances: DashMap::new(),
            light_counter: AtomicU64::new(0),
        })
    }

    /// The device id shared by every instance this registry creates.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Look up or lazily create the instance for `app_id`. Repeated calls
    /// with the same id return the same instance; concurrent first access
    /// creates exactly one (the DashMap entry holds the shard lock across
    /// creation).
    pub fn get_or_create(
        &self,
        app_id: &str,
        config: InstanceConfig,
        uploader: Arc<dyn Uploader>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> BeaconResult<Arc<Instance>> {
        validate_instance_id(app_id)?;

        use dashmap::mapref::entry::Entry;
        match self.instances.entry(app_id.to_string()) {
            Entry::Occupied(occupied) => Ok(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                let network_type = Arc::new(RwLock::new(config.network_type));
                let instance = Arc::new(Instance::new(
                    app_id.to_string(),
                    self.device_id.clone(),
                    config,
                    network_type,
                    Arc::clone(&self.storage),
                    uploader,
                    probe,
                )?);
                vacant.insert(Arc::clone(&instance));
                Ok(instance)
            }
        }
    }

    /// Look up an already-created instance.
    pub fn get(&self, instance_id: &str) -> Option<Arc<Instance>> {
        self.instances
            .get(instance_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Derive a light instance: shared device id and network policy, fresh
    /// identity and empty super properties, independently retrievable.
    pub fn create_light(&self, parent: &Instance) -> BeaconResult<Arc<Instance>> {
        let n = self.light_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let light_id = format!("{}.light-{n}", parent.id());
        let (config, network_type, uploader, probe) = parent.shared_parts();

        // Light identity is always fresh, even if a previous process used
        // the same derived id.
        for key in ["distinct_id", "account_id", "super_properties", "consent"] {
            self.storage.delete_state(&light_id, key)?;
        }

        let instance = Arc::new(Instance::new(
            light_id.clone(),
            self.device_id.clone(),
            config,
            network_type,
            Arc::clone(&self.storage),
            uploader,
            probe,
        )?);
        self.instances.insert(light_id, Arc::clone(&instance));
        Ok(instance)
    }

    /// Number of registered instances (light instances included).
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// An instance id must be non-empty and printable without whitespace; the
/// registry rejects anything else instead of falling back to a default.
fn validate_instance_id(id: &str) -> BeaconResult<()> {
    if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(BeaconError::InvalidInstanceId(id.to_string()));
    }
    Ok(())
}
