//! Network-type gating: a flush is deferred, never dropped, while the
//! configured policy is unsatisfied by current connectivity.

use beacon_core::config::NetworkType;
use beacon_core::traits::NetworkClass;

/// Whether the configured network policy permits an upload right now.
/// `Default` matches the original SDK's 3G/4G/Wifi behavior: anything but
/// no connectivity.
pub fn network_allows_upload(policy: NetworkType, current: NetworkClass) -> bool {
    match policy {
        NetworkType::WifiOnly => current == NetworkClass::Wifi,
        NetworkType::Default | NetworkType::All => current != NetworkClass::None,
    }
}
