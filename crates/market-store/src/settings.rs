//! Named configuration values stored as JSON.

use fusion_core::SignalError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{storage_err, MarketStore};

impl MarketStore {
    /// Fetch a setting, falling back to `default` when absent or
    /// undecodable.
    pub async fn setting<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, SignalError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(storage_err)?;

        match row {
            Some((raw,)) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(value),
                Err(e) => {
                    tracing::warn!("setting '{}' failed to decode ({}), using default", key, e);
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    pub async fn set_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SignalError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| SignalError::BadInput(format!("unencodable setting '{key}': {e}")))?;
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(raw)
            .execute(self.pool())
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
