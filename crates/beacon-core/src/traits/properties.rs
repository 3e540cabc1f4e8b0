use crate::event::Properties;

/// Produces the dynamic super-property contribution, invoked fresh for every
/// composed track-kind event. Implementations must be fast and must not
/// block; a panic inside the producer is caught by the composer and drops
/// only that call's dynamic contribution.
pub trait DynamicSuperProperties: Send + Sync {
    fn properties(&self) -> Properties;
}

/// Blanket impl so plain closures register directly.
impl<F> DynamicSuperProperties for F
where
    F: Fn() -> Properties + Send + Sync,
{
    fn properties(&self) -> Properties {
        self()
    }
}

/// Supplies extra properties for an autotrack click or screen event, e.g.
/// per-row properties for a list control. A panic degrades the event to its
/// preset properties instead of dropping it.
pub trait ScreenPropertyProvider: Send + Sync {
    /// `screen` is the originating screen name, `element_id` the control's
    /// identifier when the signal is a click.
    fn properties(&self, screen: &str, element_id: Option<&str>) -> Properties;
}

impl<F> ScreenPropertyProvider for F
where
    F: Fn(&str, Option<&str>) -> Properties + Send + Sync,
{
    fn properties(&self, screen: &str, element_id: Option<&str>) -> Properties {
        self(screen, element_id)
    }
}
