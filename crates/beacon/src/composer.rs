//! Property composition: merges static, dynamic, and call-site sources with
//! later-wins precedence, isolates producer failures, and stamps identity
//! into an immutable [`EventRecord`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use beacon_core::event::{properties, EventKind, EventRecord, Properties};
use beacon_core::traits::DynamicSuperProperties;

/// Identity snapshot taken under the instance lock.
pub(crate) struct IdentitySnapshot {
    pub distinct_id: String,
    pub account_id: Option<String>,
    pub device_id: String,
    pub instance_id: String,
}

/// Invoke the dynamic producer with panic isolation. A panicking producer
/// loses only this call's dynamic contribution; composition proceeds with
/// the static and call-site sources.
pub(crate) fn invoke_dynamic(
    producer: Option<&Arc<dyn DynamicSuperProperties>>,
) -> Option<Properties> {
    let producer = producer?;
    match catch_unwind(AssertUnwindSafe(|| producer.properties())) {
        Ok(props) => Some(props),
        Err(_) => {
            tracing::warn!("dynamic super-property producer panicked, contribution dropped");
            None
        }
    }
}

/// Build the final record. `static_props` were sanitized when registered;
/// `dynamic` and `call_site` are sanitized here. `preset` entries are
/// engine-stamped (`#`-prefixed) and join after validation, without
/// overwriting anything user precedence already decided.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compose(
    kind: EventKind,
    name: Option<String>,
    static_props: Properties,
    dynamic: Option<Properties>,
    call_site: Properties,
    preset: Properties,
    identity: IdentitySnapshot,
    time: DateTime<Utc>,
    zone_offset_minutes: i32,
) -> EventRecord {
    let mut merged = if kind.merges_super_properties() {
        properties::merge([
            static_props,
            dynamic.map(properties::sanitize).unwrap_or_default(),
            properties::sanitize(call_site),
        ])
    } else {
        // User-property kinds carry only their own payload.
        properties::sanitize(call_site)
    };

    for (key, value) in preset {
        merged.entry(key).or_insert(value);
    }

    EventRecord {
        kind,
        name,
        properties: merged,
        time,
        zone_offset_minutes,
        distinct_id: identity.distinct_id,
        account_id: identity.account_id,
        device_id: identity.device_id,
        instance_id: identity.instance_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> IdentitySnapshot {
        IdentitySnapshot {
            distinct_id: "d-1".into(),
            account_id: None,
            device_id: "dev-1".into(),
            instance_id: "app".into(),
        }
    }

    fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn call_site_beats_dynamic_beats_static() {
        let record = compose(
            EventKind::Track,
            Some("purchase".into()),
            props(&[("k", json!("static")), ("channel", json!("store"))]),
            Some(props(&[("k", json!("dynamic")), ("session", json!(7))])),
            props(&[("k", json!("call_site"))]),
            Properties::new(),
            identity(),
            Utc::now(),
            0,
        );
        assert_eq!(record.properties["k"], json!("call_site"));
        assert_eq!(record.properties["channel"], json!("store"));
        assert_eq!(record.properties["session"], json!(7));
    }

    #[test]
    fn dynamic_beats_static_without_call_site() {
        let record = compose(
            EventKind::Track,
            Some("e".into()),
            props(&[("k", json!("static"))]),
            Some(props(&[("k", json!("dynamic"))])),
            Properties::new(),
            Properties::new(),
            identity(),
            Utc::now(),
            0,
        );
        assert_eq!(record.properties["k"], json!("dynamic"));
    }

    #[test]
    fn user_kinds_skip_super_properties() {
        let record = compose(
            EventKind::UserSet,
            None,
            props(&[("super_key", json!(1))]),
            Some(props(&[("dyn_key", json!(2))])),
            props(&[("age", json!(30))]),
            Properties::new(),
            identity(),
            Utc::now(),
            0,
        );
        assert_eq!(record.properties.len(), 1);
        assert_eq!(record.properties["age"], json!(30));
    }

    #[test]
    fn panicking_producer_drops_only_dynamic() {
        struct Bomb;
        impl DynamicSuperProperties for Bomb {
            fn properties(&self) -> Properties {
                panic!("boom");
            }
        }
        let producer: Arc<dyn DynamicSuperProperties> = Arc::new(Bomb);
        assert!(invoke_dynamic(Some(&producer)).is_none());
        assert!(invoke_dynamic(None).is_none());
    }

    #[test]
    fn invalid_call_site_entries_drop_individually() {
        let record = compose(
            EventKind::Track,
            Some("e".into()),
            Properties::new(),
            None,
            props(&[("good", json!(1)), ("9bad", json!(2))]),
            Properties::new(),
            identity(),
            Utc::now(),
            0,
        );
        assert_eq!(record.properties.len(), 1);
        assert!(record.properties.contains_key("good"));
    }
}
