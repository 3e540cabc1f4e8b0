//! Instance: one isolated tracking context. Owns identity, super
//! properties, consent, event timers, and autotrack registration; shares the
//! device id and durable store with every other instance in the process.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde_json::json;

use beacon_autotrack::{synthesize, IgnoreRules, Signal};
use beacon_core::config::{AutotrackEvents, InstanceConfig, NetworkType};
use beacon_core::consent::ConsentState;
use beacon_core::constants::DURATION_KEY;
use beacon_core::errors::{BeaconError, BeaconResult};
use beacon_core::event::{properties, EventKind, Properties};
use beacon_core::traits::{
    ConnectivityProbe, DynamicSuperProperties, ScreenPropertyProvider, Uploader,
};
use beacon_flush::{ConsentSource, FlushScheduler, FlushWorker, WorkerConfig};
use beacon_storage::StorageEngine;

use crate::composer::{self, IdentitySnapshot};
use crate::identity::Identity;
use crate::timing::EventTimers;

const KEY_SUPER_PROPERTIES: &str = "super_properties";
const KEY_CONSENT: &str = "consent";
const KEY_INSTALLED: &str = "installed";

/// Mutable per-instance state, all behind one mutex so composition reads a
/// consistent snapshot and consent transitions serialize against track.
struct InstanceState {
    identity: Identity,
    super_properties: Properties,
    dynamic_properties: Option<Arc<dyn DynamicSuperProperties>>,
    consent: ConsentState,
    autotrack: AutotrackEvents,
    ignore_rules: IgnoreRules,
    screen_provider: Option<Arc<dyn ScreenPropertyProvider>>,
    timers: EventTimers,
}

/// Adapter handing the flush worker a consent snapshot without exposing the
/// rest of the state.
struct StateConsent(Arc<Mutex<InstanceState>>);

impl ConsentSource for StateConsent {
    fn consent(&self) -> ConsentState {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).consent
    }
}

/// One registered tracking context. Obtained from
/// [`InstanceRegistry`](crate::InstanceRegistry); never constructed directly.
pub struct Instance {
    id: String,
    device_id: String,
    config: InstanceConfig,
    /// Shared with light instances so a parent's policy change applies to
    /// both.
    network_type: Arc<RwLock<NetworkType>>,
    storage: Arc<StorageEngine>,
    uploader: Arc<dyn Uploader>,
    probe: Arc<dyn ConnectivityProbe>,
    state: Arc<Mutex<InstanceState>>,
    scheduler: FlushScheduler,
}

impl Instance {
    pub(crate) fn new(
        id: String,
        device_id: String,
        config: InstanceConfig,
        network_type: Arc<RwLock<NetworkType>>,
        storage: Arc<StorageEngine>,
        uploader: Arc<dyn Uploader>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> BeaconResult<Self> {
        let identity = Identity::load(&storage, &id)?;
        let super_properties = match storage.get_state(&id, KEY_SUPER_PROPERTIES)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Properties::new(),
        };
        let consent = match storage.get_state(&id, KEY_CONSENT)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => ConsentState::Tracking,
        };

        let state = Arc::new(Mutex::new(InstanceState {
            identity,
            super_properties,
            dynamic_properties: None,
            consent,
            autotrack: config.autotrack,
            ignore_rules: IgnoreRules::default(),
            screen_provider: None,
            timers: EventTimers::default(),
        }));

        let worker = FlushWorker::new(
            WorkerConfig {
                instance_id: id.clone(),
                batch_size: config.flush_batch_size,
                max_batch_bytes: config.flush_max_batch_bytes,
                flush_interval: Duration::from_secs(config.flush_interval_secs),
                backoff_base: Duration::from_secs(config.backoff_base_secs),
                backoff_cap: Duration::from_secs(config.backoff_cap_secs),
            },
            Arc::clone(&storage),
            Arc::clone(&uploader),
            Arc::clone(&probe),
            Arc::new(StateConsent(Arc::clone(&state))),
            Arc::clone(&network_type),
        );
        let scheduler = FlushScheduler::spawn(worker);

        Ok(Self {
            id,
            device_id,
            config,
            network_type,
            storage,
            uploader,
            probe,
            state,
            scheduler,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- Accessors ---

    /// The instance id (app id, or the derived light-instance id).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The device id, identical across every instance in this process.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn distinct_id(&self) -> String {
        self.lock_state().identity.distinct_id.clone()
    }

    pub fn consent_state(&self) -> ConsentState {
        self.lock_state().consent
    }

    pub(crate) fn shared_parts(
        &self,
    ) -> (
        InstanceConfig,
        Arc<RwLock<NetworkType>>,
        Arc<dyn Uploader>,
        Arc<dyn ConnectivityProbe>,
    ) {
        (
            self.config.clone(),
            Arc::clone(&self.network_type),
            Arc::clone(&self.uploader),
            Arc::clone(&self.probe),
        )
    }

    // --- Tracking ---

    pub fn track(&self, name: &str) -> BeaconResult<()> {
        self.track_with_properties(name, Properties::new())
    }

    pub fn track_with_properties(&self, name: &str, props: Properties) -> BeaconResult<()> {
        self.submit(EventKind::Track, Some(name), props, Properties::new(), None)
    }

    /// Track with an explicit event time carrying its own timezone.
    pub fn track_with_time(
        &self,
        name: &str,
        props: Properties,
        time: DateTime<FixedOffset>,
    ) -> BeaconResult<()> {
        let override_ = (
            time.with_timezone(&Utc),
            time.offset().fix().local_minus_utc() / 60,
        );
        self.submit(
            EventKind::Track,
            Some(name),
            props,
            Properties::new(),
            Some(override_),
        )
    }

    /// Arm a duration timer: the next track of `name` gains `#duration`.
    pub fn time_event(&self, name: &str) -> BeaconResult<()> {
        if !properties::is_valid_event_name(name) {
            tracing::warn!(name = %name, "time_event ignored: invalid event name");
            return Err(BeaconError::InvalidEventName(name.to_string()));
        }
        self.lock_state().timers.start(name);
        Ok(())
    }

    // --- Identity ---

    pub fn identify(&self, distinct_id: &str) -> BeaconResult<()> {
        if distinct_id.is_empty() {
            tracing::warn!("identify ignored: empty distinct id");
            return Err(BeaconError::InvalidInstanceId(distinct_id.to_string()));
        }
        let mut state = self.lock_state();
        state.identity.identify(&self.storage, &self.id, distinct_id)
    }

    pub fn login(&self, account_id: &str) -> BeaconResult<()> {
        let mut state = self.lock_state();
        state.identity.login(&self.storage, &self.id, account_id)
    }

    pub fn logout(&self) -> BeaconResult<()> {
        let mut state = self.lock_state();
        state.identity.logout(&self.storage, &self.id)
    }

    // --- User properties ---

    pub fn user_set(&self, props: Properties) -> BeaconResult<()> {
        self.submit(EventKind::UserSet, None, props, Properties::new(), None)
    }

    pub fn user_unset(&self, property_name: &str) -> BeaconResult<()> {
        let mut props = Properties::new();
        props.insert(property_name.to_string(), json!(0));
        self.submit(EventKind::UserUnset, None, props, Properties::new(), None)
    }

    pub fn user_set_once(&self, props: Properties) -> BeaconResult<()> {
        self.submit(EventKind::UserSetOnce, None, props, Properties::new(), None)
    }

    /// Accumulate numeric user properties. Non-numeric values are dropped
    /// individually.
    pub fn user_add(&self, props: Properties) -> BeaconResult<()> {
        let numeric: Properties = props
            .into_iter()
            .filter(|(key, value)| {
                if value.is_number() {
                    true
                } else {
                    tracing::warn!(key = %key, "user_add dropped non-numeric value");
                    false
                }
            })
            .collect();
        self.submit(EventKind::UserAdd, None, numeric, Properties::new(), None)
    }

    pub fn user_add_one(&self, property_name: &str, value: f64) -> BeaconResult<()> {
        let mut props = Properties::new();
        props.insert(property_name.to_string(), json!(value));
        self.user_add(props)
    }

    pub fn user_delete(&self) -> BeaconResult<()> {
        self.submit(
            EventKind::UserDelete,
            None,
            Properties::new(),
            Properties::new(),
            None,
        )
    }

    // --- Super properties ---

    /// Merge into the static super properties and persist the result.
    pub fn set_super_properties(&self, props: Properties) -> BeaconResult<()> {
        let mut state = self.lock_state();
        let sanitized = properties::sanitize(props);
        for (key, value) in sanitized {
            state.super_properties.insert(key, value);
        }
        self.persist_super_properties(&state)
    }

    pub fn unset_super_property(&self, property_name: &str) -> BeaconResult<()> {
        let mut state = self.lock_state();
        state.super_properties.remove(property_name);
        self.persist_super_properties(&state)
    }

    pub fn clear_super_properties(&self) -> BeaconResult<()> {
        let mut state = self.lock_state();
        state.super_properties.clear();
        self.persist_super_properties(&state)
    }

    pub fn current_super_properties(&self) -> Properties {
        self.lock_state().super_properties.clone()
    }

    fn persist_super_properties(&self, state: &InstanceState) -> BeaconResult<()> {
        let raw = serde_json::to_string(&state.super_properties)?;
        self.storage.set_state(&self.id, KEY_SUPER_PROPERTIES, &raw)
    }

    /// Register the dynamic producer invoked fresh for every track-kind
    /// event. Replaces any previous registration.
    pub fn register_dynamic_super_properties<D>(&self, producer: D)
    where
        D: DynamicSuperProperties + 'static,
    {
        self.lock_state().dynamic_properties = Some(Arc::new(producer));
    }

    // --- Configuration ---

    pub fn set_network_type(&self, network_type: NetworkType) {
        *self
            .network_type
            .write()
            .unwrap_or_else(|e| e.into_inner()) = network_type;
    }

    pub fn network_type(&self) -> NetworkType {
        *self.network_type.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn enable_autotrack(&self, categories: AutotrackEvents) {
        self.lock_state().autotrack = categories;
    }

    pub fn ignore_view_class(&self, class: impl Into<String>) {
        self.lock_state().ignore_rules.ignore_view_class(class);
    }

    pub fn ignore_screens<I, S>(&self, screens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock_state().ignore_rules.ignore_screens(screens);
    }

    pub fn register_screen_property_provider<P>(&self, provider: P)
    where
        P: ScreenPropertyProvider + 'static,
    {
        self.lock_state().screen_provider = Some(Arc::new(provider));
    }

    // --- Autotrack ingestion ---

    /// Entry point for raw lifecycle/UI signals from the platform layer.
    pub fn handle_signal(&self, signal: &Signal) -> BeaconResult<()> {
        let (mask, rules, provider) = {
            let state = self.lock_state();
            if !state.consent.allows_enqueue() {
                return Ok(());
            }
            (
                state.autotrack,
                state.ignore_rules.clone(),
                state.screen_provider.clone(),
            )
        };

        let synthesized = synthesize(
            signal,
            mask,
            self.config.track_relaunched_in_background,
            &rules,
            provider.as_deref(),
        );
        let Some(event) = synthesized else {
            return Ok(());
        };

        // Install fires only on the first launch ever observed. The marker
        // write is the atomic claim: of any concurrent install signals,
        // exactly one wins.
        if matches!(signal, Signal::Install)
            && !self.storage.set_state_if_absent(&self.id, KEY_INSTALLED, "1")?
        {
            return Ok(());
        }

        self.submit(
            event.kind,
            Some(event.name),
            Properties::new(),
            event.properties,
            None,
        )?;

        // Backgrounding is also a flush trigger: one best-effort attempt
        // before the OS suspends the process.
        if matches!(signal, Signal::AppEnd) {
            let _ = self.scheduler.notify_background();
        }
        Ok(())
    }

    /// Forward an app-background transition to the flush scheduler without
    /// synthesizing an event (for hosts that disable autotrack).
    pub fn notify_app_background(&self) -> BeaconResult<()> {
        self.scheduler.notify_background()
    }

    // --- Flush ---

    /// Request an immediate flush. Returns once the request is handed to the
    /// background worker; the upload itself never runs on this thread.
    pub fn flush(&self) -> BeaconResult<()> {
        self.scheduler.flush()
    }

    /// Number of records currently queued for this instance.
    pub fn pending_event_count(&self) -> BeaconResult<usize> {
        self.storage.queue_len(&self.id)
    }

    // --- Consent ---

    /// Pause (`false`) or resume (`true`) collection. Queue is retained.
    pub fn enable_tracking(&self, enabled: bool) -> BeaconResult<()> {
        let mut state = self.lock_state();
        state.consent = state.consent.with_tracking_enabled(enabled);
        self.persist_consent(&state)
    }

    /// Stop collection and purge the local queue. No deletion event.
    pub fn opt_out_tracking(&self) -> BeaconResult<()> {
        let mut state = self.lock_state();
        let next = state.consent.opted_out();
        if next == state.consent {
            return Ok(());
        }
        state.consent = next;
        self.persist_consent(&state)?;
        let purged = self.storage.purge(&self.id)?;
        tracing::info!(instance_id = %self.id, purged, "opted out, queue purged");
        Ok(())
    }

    /// Stop collection, emit one terminal `user_delete`, and purge
    /// everything else. The deletion record remains queued for the next
    /// flush.
    pub fn opt_out_tracking_and_delete_user(&self) -> BeaconResult<()> {
        let mut state = self.lock_state();
        if state.consent == ConsentState::OptedOutDeleted {
            return Ok(());
        }

        let record = composer::compose(
            EventKind::UserDelete,
            None,
            Properties::new(),
            None,
            Properties::new(),
            Properties::new(),
            self.identity_snapshot(&state),
            Utc::now(),
            local_offset_minutes(),
        );
        let entry = self
            .storage
            .enqueue(&self.id, &record, self.config.queue_capacity)?;
        self.storage.purge_except(&self.id, entry.seq)?;

        state.consent = ConsentState::OptedOutDeleted;
        self.persist_consent(&state)?;
        tracing::info!(instance_id = %self.id, "opted out with user deletion");
        Ok(())
    }

    /// Resume collection from either opted-out state. Purged data stays
    /// purged and the deletion event is not re-sent.
    pub fn opt_in_tracking(&self) -> BeaconResult<()> {
        let mut state = self.lock_state();
        state.consent = state.consent.opted_in();
        self.persist_consent(&state)
    }

    fn persist_consent(&self, state: &InstanceState) -> BeaconResult<()> {
        let raw = serde_json::to_string(&state.consent)?;
        self.storage.set_state(&self.id, KEY_CONSENT, &raw)
    }

    // --- Composition pipeline ---

    fn identity_snapshot(&self, state: &InstanceState) -> IdentitySnapshot {
        IdentitySnapshot {
            distinct_id: state.identity.distinct_id.clone(),
            account_id: state.identity.account_id.clone(),
            device_id: self.device_id.clone(),
            instance_id: self.id.clone(),
        }
    }

    fn submit(
        &self,
        kind: EventKind,
        name: Option<&str>,
        call_site: Properties,
        mut preset: Properties,
        time_override: Option<(DateTime<Utc>, i32)>,
    ) -> BeaconResult<()> {
        if kind.requires_name() {
            let name = name.unwrap_or_default();
            if kind == EventKind::Track && !properties::is_valid_event_name(name) {
                tracing::warn!(name = %name, "track dropped: invalid event name");
                return Err(BeaconError::InvalidEventName(name.to_string()));
            }
        }

        // Consent early-out and producer snapshot under the lock; the
        // producer itself runs outside so a slow one cannot stall other
        // state access.
        let producer = {
            let state = self.lock_state();
            if !state.consent.allows_enqueue() {
                tracing::debug!(instance_id = %self.id, "event dropped by consent state");
                return Ok(());
            }
            if kind.merges_super_properties() {
                state.dynamic_properties.clone()
            } else {
                None
            }
        };
        let dynamic = composer::invoke_dynamic(producer.as_ref());

        let (record, entry_result) = {
            let mut state = self.lock_state();
            // Re-check: consent may have flipped while the producer ran.
            if !state.consent.allows_enqueue() {
                return Ok(());
            }

            if kind == EventKind::Track {
                if let Some(name) = name {
                    if let Some(secs) = state.timers.take_duration_secs(name) {
                        preset.insert(DURATION_KEY.to_string(), json!(secs));
                    }
                }
            }

            let (time, zone_offset) =
                time_override.unwrap_or_else(|| (Utc::now(), local_offset_minutes()));
            let record = composer::compose(
                kind,
                name.map(str::to_string),
                state.super_properties.clone(),
                dynamic,
                call_site,
                preset,
                self.identity_snapshot(&state),
                time,
                zone_offset,
            );
            let entry = self
                .storage
                .enqueue(&self.id, &record, self.config.queue_capacity);
            (record, entry)
        };

        if let Err(e) = entry_result {
            // Lossy-under-pressure policy: the event is gone, the caller's
            // flow is not. The error still surfaces for tests.
            tracing::warn!(
                instance_id = %self.id,
                kind = ?record.kind,
                error = %e,
                "durable append failed, event lost"
            );
            return Err(e);
        }

        if self.storage.queue_len(&self.id)? >= self.config.high_water_mark {
            let _ = self.scheduler.notify_high_water();
        }
        Ok(())
    }
}

fn local_offset_minutes() -> i32 {
    Local::now().offset().fix().local_minus_utc() / 60
}
