//! Built-in settings, the lowest configuration layer.

use super::settings::TandemSettings;
use crate::client::DEFAULT_QUIET_PERIOD;
use crate::protocol::DEFAULT_SERVER_ENDPOINT;

pub fn default_settings() -> TandemSettings {
    TandemSettings {
        quiet_period_ms: Some(DEFAULT_QUIET_PERIOD.as_millis() as u64),
        auto_save: None,
        resync_on_install: Some(false),
        server_endpoint: Some(DEFAULT_SERVER_ENDPOINT.to_string()),
        workspace_root: None,
    }
}
