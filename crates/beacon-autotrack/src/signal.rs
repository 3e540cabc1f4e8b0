//! Raw lifecycle/UI signals emitted by the platform layer.

use serde::{Deserialize, Serialize};

/// One observed signal. Fields carry only what the synthesizer needs to
/// build preset properties and evaluate ignore rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    /// App launched or resumed from the background.
    AppStart {
        /// True when the OS relaunched the app directly into the background.
        relaunched_in_background: bool,
    },
    /// App moved to the background.
    AppEnd,
    /// A control was activated.
    Click {
        /// Host-assigned element id, if any.
        view_id: Option<String>,
        /// Class name of the control (ignore rules match on this).
        view_class: String,
        /// Visible text content of the control, if any.
        view_text: Option<String>,
        /// Screen the control lives on.
        screen: String,
    },
    /// A screen was presented.
    ViewScreen {
        screen: String,
        title: Option<String>,
        url: Option<String>,
    },
    /// First launch after install.
    Install,
    /// The app crashed.
    Crash { reason: String },
}

impl Signal {
    /// The screen a signal originates from, when it has one.
    pub fn screen(&self) -> Option<&str> {
        match self {
            Signal::Click { screen, .. } | Signal::ViewScreen { screen, .. } => Some(screen),
            _ => None,
        }
    }

    /// The control class a signal originates from, when it has one.
    pub fn view_class(&self) -> Option<&str> {
        match self {
            Signal::Click { view_class, .. } => Some(view_class),
            _ => None,
        }
    }
}
