/// Current network class as reported by the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkClass {
    None,
    Cellular,
    Wifi,
}

/// Reports current connectivity. Polled by the flush scheduler before each
/// attempt; an unsatisfied network policy defers the flush, never drops it.
pub trait ConnectivityProbe: Send + Sync {
    fn network_class(&self) -> NetworkClass;
}
