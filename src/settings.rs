use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::detection::DetectionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FocusSettings {
    /// Seconds of WARNING before a distraction is charged.
    pub grace_period_secs: u32,
    pub break_minutes: u32,
    pub default_duration_minutes: u32,
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
    pub duration_step_minutes: u32,
    pub tick_interval_ms: u64,
    pub check_interval_ms: u64,
    pub detection_threshold: f32,
    pub analyze_timeout_ms: u64,
    pub model_load_timeout_ms: u64,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            grace_period_secs: 5,
            break_minutes: 5,
            default_duration_minutes: 25,
            min_duration_minutes: 5,
            max_duration_minutes: 180,
            duration_step_minutes: 5,
            tick_interval_ms: 1000,
            check_interval_ms: 1000,
            detection_threshold: 0.4,
            analyze_timeout_ms: 5000,
            model_load_timeout_ms: 30_000,
        }
    }
}

impl FocusSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }

    pub fn detection_config(&self) -> DetectionConfig {
        DetectionConfig {
            threshold: self.detection_threshold,
            analyze_timeout: Duration::from_millis(self.analyze_timeout_ms),
            load_timeout: Duration::from_millis(self.model_load_timeout_ms),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<FocusSettings>,
}

impl SettingsStore {
    /// Read settings from `path`. A missing or unreadable file yields defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings file {}: {err}", path.display());
                FocusSettings::default()
            })
        } else {
            FocusSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> FocusSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: FocusSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &FocusSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), FocusSettings::default());
    }

    #[test]
    fn partial_file_merges_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"gracePeriodSecs": 10}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.grace_period_secs, 10);
        assert_eq!(settings.break_minutes, 5);
        assert_eq!(settings.default_duration_minutes, 25);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(SettingsStore::new(path).unwrap().get(), FocusSettings::default());
    }

    #[test]
    fn update_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.get();
        settings.break_minutes = 10;
        store.update(settings).unwrap();

        assert_eq!(SettingsStore::new(path).unwrap().get().break_minutes, 10);
    }
}
