use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

/// Serialized widget registry.
pub const LAYOUT_KEY: &str = "widget_layout";
/// Serialized `UiConfig`.
pub const UI_CONFIG_KEY: &str = "ui_config";

impl Database {
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .with_context(|| format!("failed to read key '{key}'"))?;
            Ok(value)
        })
        .await
    }

    pub async fn put_value(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write key '{key}'"))?;
            Ok(())
        })
        .await
    }

    /// Returns whether a row was removed.
    pub async fn delete_value(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.execute(move |conn| {
            let removed = conn
                .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .with_context(|| format!("failed to delete key '{key}'"))?;
            Ok(removed > 0)
        })
        .await
    }

    pub async fn load_layout(&self) -> Result<Option<String>> {
        self.get_value(LAYOUT_KEY).await
    }

    pub async fn save_layout(&self, json: String) -> Result<()> {
        self.put_value(LAYOUT_KEY, json).await
    }

    pub async fn load_ui_config(&self) -> Result<Option<String>> {
        self.get_value(UI_CONFIG_KEY).await
    }

    pub async fn save_ui_config(&self, json: String) -> Result<()> {
        self.put_value(UI_CONFIG_KEY, json).await
    }

    /// Forget everything stored for the mirror.
    pub async fn clear_all(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM kv_store", [])
                .context("failed to clear kv_store")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::temp_database;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let db = temp_database();
        assert_eq!(db.get_value("k").await.unwrap(), None);

        db.put_value("k", "one".into()).await.unwrap();
        db.put_value("k", "two".into()).await.unwrap();
        assert_eq!(db.get_value("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let db = temp_database();
        db.save_layout("[]".into()).await.unwrap();
        db.save_ui_config("{}".into()).await.unwrap();

        assert!(db.delete_value(super::LAYOUT_KEY).await.unwrap());
        assert!(!db.delete_value(super::LAYOUT_KEY).await.unwrap());
        assert_eq!(db.load_layout().await.unwrap(), None);

        db.clear_all().await.unwrap();
        assert_eq!(db.load_ui_config().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let db = temp_database();
        let path = db.path().to_path_buf();
        db.save_layout("[1]".into()).await.unwrap();
        drop(db);

        let reopened = crate::db::Database::new(path).unwrap();
        assert_eq!(reopened.load_layout().await.unwrap().as_deref(), Some("[1]"));
    }
}
