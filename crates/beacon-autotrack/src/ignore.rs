//! Per-instance ignore rules for autotrack signals.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::signal::Signal;

/// Registered ignore entries: control classes whose clicks are dropped and
/// screens whose view/click signals are dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreRules {
    view_classes: HashSet<String>,
    screens: HashSet<String>,
}

impl IgnoreRules {
    pub fn ignore_view_class(&mut self, class: impl Into<String>) {
        self.view_classes.insert(class.into());
    }

    pub fn ignore_screens<I, S>(&mut self, screens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.screens.extend(screens.into_iter().map(Into::into));
    }

    /// Whether a signal matches an ignore entry. Lifecycle signals are never
    /// ignorable; only clicks and screen views carry an origin to match.
    pub fn should_ignore(&self, signal: &Signal) -> bool {
        if let Some(class) = signal.view_class() {
            if self.view_classes.contains(class) {
                return true;
            }
        }
        if let Some(screen) = signal.screen() {
            if self.screens.contains(screen) {
                return true;
            }
        }
        false
    }
}
