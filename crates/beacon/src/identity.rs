//! Per-instance identity: distinct id (always present) and account id
//! (present between login and logout). Both persist across restarts.

use uuid::Uuid;

use beacon_core::errors::BeaconResult;
use beacon_storage::StorageEngine;

pub(crate) const KEY_DISTINCT_ID: &str = "distinct_id";
pub(crate) const KEY_ACCOUNT_ID: &str = "account_id";

#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub distinct_id: String,
    pub account_id: Option<String>,
}

impl Identity {
    /// Load persisted identity, generating and persisting an anonymous
    /// distinct id on first use.
    pub fn load(storage: &StorageEngine, instance_id: &str) -> BeaconResult<Self> {
        let distinct_id = match storage.get_state(instance_id, KEY_DISTINCT_ID)? {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                storage.set_state(instance_id, KEY_DISTINCT_ID, &id)?;
                id
            }
        };
        let account_id = storage.get_state(instance_id, KEY_ACCOUNT_ID)?;
        Ok(Self {
            distinct_id,
            account_id,
        })
    }

    /// `identify`: overwrite the distinct id unconditionally.
    pub fn identify(
        &mut self,
        storage: &StorageEngine,
        instance_id: &str,
        distinct_id: &str,
    ) -> BeaconResult<()> {
        self.distinct_id = distinct_id.to_string();
        storage.set_state(instance_id, KEY_DISTINCT_ID, distinct_id)
    }

    /// `login`: set the account id without touching the distinct id.
    pub fn login(
        &mut self,
        storage: &StorageEngine,
        instance_id: &str,
        account_id: &str,
    ) -> BeaconResult<()> {
        self.account_id = Some(account_id.to_string());
        storage.set_state(instance_id, KEY_ACCOUNT_ID, account_id)
    }

    /// `logout`: clear the account id only.
    pub fn logout(&mut self, storage: &StorageEngine, instance_id: &str) -> BeaconResult<()> {
        self.account_id = None;
        storage.delete_state(instance_id, KEY_ACCOUNT_ID)
    }
}
