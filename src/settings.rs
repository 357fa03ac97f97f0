use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::db::Database;

/// Display preferences shared with the UI shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiConfig {
    /// First hour (0-23) rendered with the day palette.
    pub day_start: u32,
    /// First hour rendered with the night palette.
    pub night_start: u32,
    pub theme: String,
    pub opacity: f32,
    pub scale: f32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            day_start: 6,
            night_start: 19,
            theme: "zen".into(),
            opacity: 1.0,
            scale: 1.0,
        }
    }
}

impl UiConfig {
    pub fn is_day_time(&self, hour: u32) -> bool {
        hour >= self.day_start && hour < self.night_start
    }
}

/// Cached `UiConfig`, written through to the database on every change.
pub struct SettingsStore {
    db: Database,
    data: RwLock<UiConfig>,
}

impl SettingsStore {
    /// Load the stored config; anything unreadable falls back to defaults.
    pub async fn load(db: Database) -> Result<Self> {
        let data = match db.load_ui_config().await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|err| {
                warn!("Discarding malformed ui config: {err}");
                UiConfig::default()
            }),
            Ok(None) => UiConfig::default(),
            Err(err) => {
                warn!("Failed to read ui config, using defaults: {err:#}");
                UiConfig::default()
            }
        };

        Ok(Self {
            db,
            data: RwLock::new(data),
        })
    }

    pub fn ui_config(&self) -> UiConfig {
        self.read().clone()
    }

    pub async fn update_ui_config(&self, config: UiConfig) -> Result<()> {
        let serialized =
            serde_json::to_string(&config).context("failed to serialize ui config")?;
        *self.write() = config;
        self.db.save_ui_config(serialized).await
    }

    /// Restore defaults and drop the stored row.
    pub async fn reset(&self) -> Result<()> {
        *self.write() = UiConfig::default();
        self.db.delete_value(crate::db::UI_CONFIG_KEY).await?;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, UiConfig> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UiConfig> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::temp_database;

    #[test]
    fn test_day_window() {
        let config = UiConfig::default();
        assert!(!config.is_day_time(5));
        assert!(config.is_day_time(6));
        assert!(config.is_day_time(18));
        assert!(!config.is_day_time(19));
    }

    #[tokio::test]
    async fn test_update_is_persisted() {
        let db = temp_database();
        let store = SettingsStore::load(db.clone()).await.unwrap();
        assert_eq!(store.ui_config(), UiConfig::default());

        let config = UiConfig {
            theme: "cyber".into(),
            opacity: 0.6,
            ..UiConfig::default()
        };
        store.update_ui_config(config.clone()).await.unwrap();

        let reloaded = SettingsStore::load(db).await.unwrap();
        assert_eq!(reloaded.ui_config(), config);
    }

    #[tokio::test]
    async fn test_malformed_row_falls_back_to_defaults() {
        let db = temp_database();
        db.save_ui_config("{ nope".into()).await.unwrap();
        let store = SettingsStore::load(db).await.unwrap();
        assert_eq!(store.ui_config(), UiConfig::default());
    }

    #[tokio::test]
    async fn test_unreadable_store_falls_back_to_defaults() {
        let db = temp_database();
        db.execute(|conn| {
            conn.execute_batch("DROP TABLE kv_store")?;
            Ok(())
        })
        .await
        .unwrap();

        let store = SettingsStore::load(db).await.unwrap();
        assert_eq!(store.ui_config(), UiConfig::default());
    }

    #[tokio::test]
    async fn test_reset_clears_stored_row() {
        let db = temp_database();
        let store = SettingsStore::load(db.clone()).await.unwrap();
        store
            .update_ui_config(UiConfig {
                day_start: 8,
                ..UiConfig::default()
            })
            .await
            .unwrap();
        store.reset().await.unwrap();
        assert_eq!(store.ui_config().day_start, 6);
        assert_eq!(db.load_ui_config().await.unwrap(), None);
    }
}
