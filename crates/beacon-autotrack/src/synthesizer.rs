//! Signal to event mapping with category gating, ignore rules, and
//! provider augmentation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;

use beacon_core::config::AutotrackEvents;
use beacon_core::constants::{autotrack_events, preset_keys};
use beacon_core::event::{properties, EventKind, Properties};
use beacon_core::traits::ScreenPropertyProvider;

use crate::ignore::IgnoreRules;
use crate::signal::Signal;

/// A synthesized event shape, ready for the composer. Identity, timestamps,
/// and super properties are stamped later by the owning instance.
#[derive(Debug, Clone)]
pub struct SynthesizedEvent {
    pub kind: EventKind,
    pub name: &'static str,
    pub properties: Properties,
}

fn category_of(signal: &Signal) -> AutotrackEvents {
    match signal {
        Signal::AppStart { .. } => AutotrackEvents::APP_START,
        Signal::AppEnd => AutotrackEvents::APP_END,
        Signal::Click { .. } => AutotrackEvents::CLICK,
        Signal::ViewScreen { .. } => AutotrackEvents::VIEW_SCREEN,
        Signal::Install => AutotrackEvents::INSTALL,
        Signal::Crash { .. } => AutotrackEvents::CRASH,
    }
}

/// Map a raw signal to an event shape, or `None` when the category bit is
/// off, an ignore rule matches, or a background relaunch is not collected.
/// Provider failures degrade to an event without the augmentation.
pub fn synthesize(
    signal: &Signal,
    enabled: AutotrackEvents,
    track_relaunched_in_background: bool,
    rules: &IgnoreRules,
    provider: Option<&dyn ScreenPropertyProvider>,
) -> Option<SynthesizedEvent> {
    if !enabled.contains(category_of(signal)) {
        return None;
    }
    if rules.should_ignore(signal) {
        return None;
    }

    let mut props = Properties::new();
    let (kind, name) = match signal {
        Signal::AppStart {
            relaunched_in_background,
        } => {
            if *relaunched_in_background && !track_relaunched_in_background {
                return None;
            }
            props.insert(
                preset_keys::RESUME_FROM_BACKGROUND.into(),
                Value::Bool(*relaunched_in_background),
            );
            (EventKind::AutotrackAppStart, autotrack_events::APP_START)
        }
        Signal::AppEnd => (EventKind::AutotrackAppEnd, autotrack_events::APP_END),
        Signal::Click {
            view_id,
            view_class,
            view_text,
            screen,
        } => {
            if let Some(id) = view_id {
                props.insert(preset_keys::ELEMENT_ID.into(), Value::String(id.clone()));
            }
            props.insert(
                preset_keys::ELEMENT_TYPE.into(),
                Value::String(view_class.clone()),
            );
            if let Some(text) = view_text {
                props.insert(
                    preset_keys::ELEMENT_CONTENT.into(),
                    Value::String(text.clone()),
                );
            }
            props.insert(
                preset_keys::SCREEN_NAME.into(),
                Value::String(screen.clone()),
            );
            (EventKind::AutotrackClick, autotrack_events::APP_CLICK)
        }
        Signal::ViewScreen { screen, title, url } => {
            props.insert(
                preset_keys::SCREEN_NAME.into(),
                Value::String(screen.clone()),
            );
            if let Some(title) = title {
                props.insert(preset_keys::TITLE.into(), Value::String(title.clone()));
            }
            if let Some(url) = url {
                props.insert(preset_keys::URL.into(), Value::String(url.clone()));
            }
            (EventKind::AutotrackViewScreen, autotrack_events::APP_VIEW)
        }
        Signal::Install => (EventKind::AutotrackInstall, autotrack_events::APP_INSTALL),
        Signal::Crash { reason } => {
            props.insert(
                preset_keys::CRASH_REASON.into(),
                Value::String(reason.clone()),
            );
            (EventKind::AutotrackCrash, autotrack_events::APP_CRASH)
        }
    };

    if let Some(provider) = provider {
        if let Some(extra) = invoke_provider(provider, signal) {
            // Provider entries are user-supplied: validate them, and let
            // them sit alongside (never overwrite) the preset keys.
            for (key, value) in properties::sanitize(extra) {
                props.entry(key).or_insert(value);
            }
        }
    }

    Some(SynthesizedEvent {
        kind,
        name,
        properties: props,
    })
}

/// Invoke the augmentation provider with panic isolation. Only click and
/// screen-view signals carry a screen context to hand it.
fn invoke_provider(
    provider: &dyn ScreenPropertyProvider,
    signal: &Signal,
) -> Option<Properties> {
    let screen = signal.screen()?;
    let element_id = match signal {
        Signal::Click { view_id, .. } => view_id.as_deref(),
        _ => None,
    };
    match catch_unwind(AssertUnwindSafe(|| provider.properties(screen, element_id))) {
        Ok(props) => Some(props),
        Err(_) => {
            tracing::warn!(
                screen = %screen,
                "screen property provider panicked, synthesizing without augmentation"
            );
            None
        }
    }
}
