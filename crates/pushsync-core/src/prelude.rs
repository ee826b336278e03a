pub use pushsync_types::error::{ClResult, Error};
pub use pushsync_types::settings::{NotificationSettings, SettingsFlag};
pub use pushsync_types::types::{Endpoint, PushHandle, SyncStatus, TopicId};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
