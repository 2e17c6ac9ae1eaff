//! Layered configuration.
//!
//! Layers, lowest precedence first: built-in defaults, user config, project
//! config (`<root>/tandem.toml`), then explicit overrides such as CLI flags.

pub mod defaults;
pub mod settings;
pub mod user;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

pub use settings::TandemSettings;
pub use user::{CONFIG_FILE_NAME, UserConfigError, UserConfigResult, load_user_config, user_config_path};

use crate::client::DEFAULT_QUIET_PERIOD;
use crate::error::{SyncError, SyncResult};
use crate::protocol::DEFAULT_SERVER_ENDPOINT;

/// Merge two layers, preferring values from `primary` over `fallback`.
pub fn merge_settings(fallback: Option<TandemSettings>, primary: Option<TandemSettings>) -> Option<TandemSettings> {
    match (fallback, primary) {
        (None, None) => None,
        (Some(settings), None) | (None, Some(settings)) => Some(settings),
        (Some(fallback), Some(primary)) => Some(TandemSettings {
            quiet_period_ms: primary.quiet_period_ms.or(fallback.quiet_period_ms),
            auto_save: primary.auto_save.or(fallback.auto_save),
            resync_on_install: primary.resync_on_install.or(fallback.resync_on_install),
            server_endpoint: primary.server_endpoint.or(fallback.server_endpoint),
            workspace_root: primary.workspace_root.or(fallback.workspace_root),
        }),
    }
}

/// Merge layers in order; later layers win.
pub fn merge_all(layers: &[Option<TandemSettings>]) -> Option<TandemSettings> {
    layers.iter().cloned().reduce(merge_settings).flatten()
}

/// Settings with every field resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSettings {
    #[serde(rename = "quietPeriodMs", serialize_with = "serialize_millis")]
    pub quiet_period: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,
    pub resync_on_install: bool,
    pub server_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            auto_save: None,
            resync_on_install: false,
            server_endpoint: DEFAULT_SERVER_ENDPOINT.to_string(),
            workspace_root: None,
        }
    }
}

impl TryFrom<TandemSettings> for EffectiveSettings {
    type Error = SyncError;

    fn try_from(settings: TandemSettings) -> SyncResult<Self> {
        let fallback = EffectiveSettings::default();
        let quiet_period = match settings.quiet_period_ms {
            Some(0) => return Err(SyncError::config("quietPeriodMs must be greater than zero")),
            Some(ms) => Duration::from_millis(ms),
            None => fallback.quiet_period,
        };
        let server_endpoint = match settings.server_endpoint {
            Some(endpoint) if endpoint.trim().is_empty() => {
                return Err(SyncError::config("serverEndpoint must not be empty"));
            }
            Some(endpoint) => endpoint,
            None => fallback.server_endpoint,
        };
        Ok(Self {
            quiet_period,
            auto_save: settings.auto_save,
            resync_on_install: settings.resync_on_install.unwrap_or(fallback.resync_on_install),
            server_endpoint,
            workspace_root: settings.workspace_root.map(PathBuf::from),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsEventKind {
    Info,
    Warning,
}

/// Something worth reporting about how settings were loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsEvent {
    pub kind: SettingsEventKind,
    pub message: String,
}

impl SettingsEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Warning,
            message: message.into(),
        }
    }

    /// Forward to the `log` facade at the matching level.
    pub fn log(&self) {
        match self.kind {
            SettingsEventKind::Info => log::info!(target: "tandem::config", "{}", self.message),
            SettingsEventKind::Warning => log::warn!(target: "tandem::config", "{}", self.message),
        }
    }
}

#[derive(Debug)]
pub struct SettingsLoadOutcome {
    pub settings: EffectiveSettings,
    pub events: Vec<SettingsEvent>,
}

/// Load and merge every layer. Broken layers are skipped with a warning.
pub fn load_settings(root_path: Option<&Path>, override_settings: Option<TandemSettings>) -> SettingsLoadOutcome {
    let mut events = Vec::new();

    let defaults = Some(defaults::default_settings());
    let user_config = load_user_config_with_events(&mut events);
    let project_settings = load_project_settings(root_path, &mut events);

    let merged = merge_all(&[defaults, user_config, project_settings, override_settings]).unwrap_or_default();
    let settings = match EffectiveSettings::try_from(merged) {
        Ok(settings) => settings,
        Err(err) => {
            events.push(SettingsEvent::warning(format!("{}; using defaults", err)));
            EffectiveSettings::default()
        }
    };

    SettingsLoadOutcome { settings, events }
}

fn load_user_config_with_events(events: &mut Vec<SettingsEvent>) -> Option<TandemSettings> {
    match load_user_config() {
        Ok(Some(settings)) => {
            events.push(SettingsEvent::info("Loaded user config"));
            Some(settings)
        }
        Ok(None) => None,
        Err(err) => {
            events.push(SettingsEvent::warning(format!("Failed to load user config: {}", err)));
            None
        }
    }
}

fn load_project_settings(root_path: Option<&Path>, events: &mut Vec<SettingsEvent>) -> Option<TandemSettings> {
    let root = root_path?;
    let config_path = root.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return None;
    }

    events.push(SettingsEvent::info(format!("Found config file: {}", config_path.display())));

    match fs::read_to_string(&config_path) {
        Ok(contents) => match toml::from_str::<TandemSettings>(&contents) {
            Ok(settings) => Some(settings),
            Err(err) => {
                events.push(SettingsEvent::warning(format!(
                    "Failed to parse {}: {}",
                    CONFIG_FILE_NAME, err
                )));
                None
            }
        },
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Failed to read {}: {}",
                CONFIG_FILE_NAME, err
            )));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    fn layer(quiet: Option<u64>, auto_save: Option<bool>) -> TandemSettings {
        TandemSettings {
            quiet_period_ms: quiet,
            auto_save,
            ..TandemSettings::default()
        }
    }

    #[test]
    fn primary_fields_override_fallback_fields() {
        let merged = merge_settings(Some(layer(Some(1000), Some(true))), Some(layer(Some(250), None))).unwrap();
        assert_eq!(merged.quiet_period_ms, Some(250));
        assert_eq!(merged.auto_save, Some(true));
    }

    #[test]
    fn merge_all_skips_missing_layers() {
        let merged = merge_all(&[Some(layer(Some(1000), None)), None, Some(layer(None, Some(false)))]).unwrap();
        assert_eq!(merged.quiet_period_ms, Some(1000));
        assert_eq!(merged.auto_save, Some(false));
        assert_eq!(merge_all(&[None, None]), None);
    }

    #[rstest]
    #[case::zero_quiet_period(layer(Some(0), None))]
    #[case::blank_endpoint(TandemSettings { server_endpoint: Some("  ".into()), ..TandemSettings::default() })]
    fn invalid_values_are_rejected(#[case] settings: TandemSettings) {
        assert!(matches!(
            EffectiveSettings::try_from(settings),
            Err(SyncError::Config { .. })
        ));
    }

    #[test]
    fn effective_settings_print_as_toml() {
        let text = toml::to_string(&EffectiveSettings::default()).unwrap();
        assert!(text.contains("quietPeriodMs = 1000"));
        assert!(text.contains("serverEndpoint = \"ws-agent\""));
    }

    #[test]
    #[serial(xdg_env)]
    fn load_settings_merges_user_project_and_override() {
        let original_xdg = env::var("XDG_CONFIG_HOME").ok();
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();

        fs::create_dir_all(user_dir.path().join("tandem")).unwrap();
        fs::write(
            user_dir.path().join("tandem/tandem.toml"),
            "quietPeriodMs = 500\nautoSave = true\nresyncOnInstall = true\n",
        )
        .unwrap();
        fs::write(project_dir.path().join("tandem.toml"), "quietPeriodMs = 750\n").unwrap();

        // SAFETY: serialized with other XDG tests.
        unsafe {
            env::set_var("XDG_CONFIG_HOME", user_dir.path());
        }
        let outcome = load_settings(Some(project_dir.path()), Some(layer(None, Some(false))));
        // SAFETY: restoring the original environment.
        unsafe {
            match original_xdg {
                Some(v) => env::set_var("XDG_CONFIG_HOME", v),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        assert_eq!(outcome.settings.quiet_period, Duration::from_millis(750));
        assert_eq!(outcome.settings.auto_save, Some(false));
        assert!(outcome.settings.resync_on_install);
        assert!(outcome.events.iter().all(|e| e.kind == SettingsEventKind::Info));
    }

    #[test]
    #[serial(xdg_env)]
    fn broken_project_config_is_reported_and_skipped() {
        let original_xdg = env::var("XDG_CONFIG_HOME").ok();
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(project_dir.path().join("tandem.toml"), "quietPeriodMs = [").unwrap();

        // SAFETY: serialized with other XDG tests.
        unsafe {
            env::set_var("XDG_CONFIG_HOME", user_dir.path());
        }
        let outcome = load_settings(Some(project_dir.path()), None);
        // SAFETY: restoring the original environment.
        unsafe {
            match original_xdg {
                Some(v) => env::set_var("XDG_CONFIG_HOME", v),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        assert_eq!(outcome.settings, EffectiveSettings::default());
        assert!(
            outcome
                .events
                .iter()
                .any(|e| e.kind == SettingsEventKind::Warning && e.message.contains("Failed to parse"))
        );
    }
}
