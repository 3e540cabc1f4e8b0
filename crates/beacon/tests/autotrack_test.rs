//! Autotrack signal ingestion through the instance: category gating,
//! ignore rules, the one-shot install marker, and provider augmentation.

mod common;

use std::sync::Arc;

use serde_json::json;

use beacon::{
    AutotrackEvents, EventKind, InstanceConfig, InstanceRegistry, Properties, Signal,
};
use beacon_storage::StorageEngine;
use common::{CapturingUploader, SettableProbe};

struct Fixture {
    _dir: tempfile::TempDir,
    registry: InstanceRegistry,
    inspector: StorageEngine,
}

fn fixture() -> Fixture {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("beacon.db");
    Fixture {
        registry: InstanceRegistry::open(&path).unwrap(),
        inspector: StorageEngine::open(&path).unwrap(),
        _dir: dir,
    }
}

impl Fixture {
    fn instance(&self, app_id: &str) -> Arc<beacon::Instance> {
        self.registry
            .get_or_create(
                app_id,
                InstanceConfig::default(),
                CapturingUploader::new(),
                SettableProbe::wifi(),
            )
            .unwrap()
    }

    fn queued_names(&self, app_id: &str) -> Vec<String> {
        self.inspector
            .peek_batch(app_id, 100, usize::MAX)
            .unwrap()
            .into_iter()
            .map(|e| e.record.name.unwrap_or_default())
            .collect()
    }
}

fn click(screen: &str, class: &str) -> Signal {
    Signal::Click {
        view_id: Some("btn_buy".into()),
        view_class: class.into(),
        view_text: Some("Buy".into()),
        screen: screen.into(),
    }
}

#[test]
fn disabled_categories_produce_nothing() {
    let fx = fixture();
    let instance = fx.instance("app");
    instance.enable_autotrack(AutotrackEvents::APP_START);

    instance
        .handle_signal(&Signal::AppStart {
            relaunched_in_background: false,
        })
        .unwrap();
    instance.handle_signal(&click("Home", "UIButton")).unwrap();
    instance.handle_signal(&Signal::AppEnd).unwrap();

    assert_eq!(fx.queued_names("app"), vec!["ta_app_start"]);
}

#[test]
fn click_carries_element_presets() {
    let fx = fixture();
    let instance = fx.instance("app");
    instance.enable_autotrack(AutotrackEvents::CLICK);
    instance.handle_signal(&click("Home", "UIButton")).unwrap();

    let queued = fx.inspector.peek_batch("app", 100, usize::MAX).unwrap();
    let record = &queued[0].record;
    assert_eq!(record.kind, EventKind::AutotrackClick);
    assert_eq!(record.properties["#element_id"], json!("btn_buy"));
    assert_eq!(record.properties["#element_type"], json!("UIButton"));
    assert_eq!(record.properties["#screen_name"], json!("Home"));
}

#[test]
fn ignore_rules_suppress_matching_signals() {
    let fx = fixture();
    let instance = fx.instance("app");
    instance.enable_autotrack(AutotrackEvents::CLICK | AutotrackEvents::VIEW_SCREEN);
    instance.ignore_view_class("UISlider");
    instance.ignore_screens(["Settings"]);

    instance.handle_signal(&click("Home", "UISlider")).unwrap();
    instance.handle_signal(&click("Settings", "UIButton")).unwrap();
    instance.handle_signal(&click("Home", "UIButton")).unwrap();
    instance
        .handle_signal(&Signal::ViewScreen {
            screen: "Settings".into(),
            title: None,
            url: None,
        })
        .unwrap();

    assert_eq!(fx.queued_names("app"), vec!["ta_app_click"]);
}

#[test]
fn install_fires_once_per_device_state() {
    let fx = fixture();
    let instance = fx.instance("app");
    instance.enable_autotrack(AutotrackEvents::INSTALL);

    instance.handle_signal(&Signal::Install).unwrap();
    instance.handle_signal(&Signal::Install).unwrap();

    assert_eq!(fx.queued_names("app"), vec!["ta_app_install"]);
}

#[test]
fn concurrent_install_signals_produce_one_event() {
    let fx = fixture();
    let instance = fx.instance("app");
    instance.enable_autotrack(AutotrackEvents::INSTALL);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let instance = &instance;
            scope.spawn(move || instance.handle_signal(&Signal::Install).unwrap());
        }
    });

    assert_eq!(fx.queued_names("app"), vec!["ta_app_install"]);
}

#[test]
fn background_relaunch_is_dropped_by_default() {
    let fx = fixture();
    let instance = fx.instance("app");
    instance.enable_autotrack(AutotrackEvents::APP_START);

    instance
        .handle_signal(&Signal::AppStart {
            relaunched_in_background: true,
        })
        .unwrap();
    assert!(fx.queued_names("app").is_empty());
}

#[test]
fn screen_provider_augments_without_overriding_presets() {
    let fx = fixture();
    let instance = fx.instance("app");
    instance.enable_autotrack(AutotrackEvents::VIEW_SCREEN);
    instance.register_screen_property_provider(
        |_screen: &str, _element_id: Option<&str>| -> Properties {
            let mut extra = Properties::new();
            extra.insert("ab_variant".into(), json!("blue"));
            extra
        },
    );

    instance
        .handle_signal(&Signal::ViewScreen {
            screen: "Home".into(),
            title: Some("Home".into()),
            url: None,
        })
        .unwrap();

    let queued = fx.inspector.peek_batch("app", 100, usize::MAX).unwrap();
    let record = &queued[0].record;
    assert_eq!(record.kind, EventKind::AutotrackViewScreen);
    assert_eq!(record.properties["#screen_name"], json!("Home"));
    assert_eq!(record.properties["ab_variant"], json!("blue"));
}

#[test]
fn crash_signal_records_the_reason() {
    let fx = fixture();
    let instance = fx.instance("app");
    instance.enable_autotrack(AutotrackEvents::CRASH);
    instance
        .handle_signal(&Signal::Crash {
            reason: "EXC_BAD_ACCESS".into(),
        })
        .unwrap();

    let queued = fx.inspector.peek_batch("app", 100, usize::MAX).unwrap();
    assert_eq!(queued[0].record.kind, EventKind::AutotrackCrash);
    assert_eq!(
        queued[0].record.properties["#app_crashed_reason"],
        json!("EXC_BAD_ACCESS")
    );
}

#[test]
fn paused_consent_swallows_signals() {
    let fx = fixture();
    let instance = fx.instance("app");
    instance.enable_autotrack(AutotrackEvents::CLICK);
    instance.enable_tracking(false).unwrap();
    instance.handle_signal(&click("Home", "UIButton")).unwrap();
    assert!(fx.queued_names("app").is_empty());
}
