use serde::{Deserialize, Serialize};

/// One configuration layer as read from TOML. Every field is optional so
/// layers can be merged field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TandemSettings {
    /// Debounce quiet period before pending changes are flushed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_period_ms: Option<u64>,

    /// Editor auto-save preference; `false` forbids activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,

    /// Send the full document on the first flush after opening it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resync_on_install: Option<bool>,

    /// Endpoint id clients address the server with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_endpoint: Option<String>,

    /// Directory workspace paths are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<String>,
}
