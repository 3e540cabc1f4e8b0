pub mod properties;
pub mod record;

pub use properties::{merge, sanitize, Properties};
pub use record::{EventKind, EventRecord};
