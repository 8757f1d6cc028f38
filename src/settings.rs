//! Settings store: versioned connection settings in the local state store.
//!
//! Records are written as `{"version": N, "settings": {...}}`. Older builds
//! wrote a flat camelCase object without a version; such records are migrated
//! on read and written back in the current shape.
use crate::error::{StudioError, StudioResult};
use crate::model::AppSettings;
use crate::store::{self, Pool, SETTINGS_SLOT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

pub const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SettingsRecord {
    version: u32,
    settings: AppSettings,
}

/// Load settings, falling back to defaults when nothing was saved yet.
#[instrument(skip_all)]
pub async fn load(pool: &Pool) -> StudioResult<AppSettings> {
    let Some(raw) = store::read_slot(pool, SETTINGS_SLOT).await? else {
        return Ok(AppSettings::default());
    };
    let (settings, migrated) = decode(&raw)?;
    if migrated {
        info!(version = SETTINGS_VERSION, "migrated legacy settings record");
        save(pool, &settings).await?;
    }
    Ok(settings)
}

#[instrument(skip_all)]
pub async fn save(pool: &Pool, settings: &AppSettings) -> StudioResult<()> {
    let record = SettingsRecord {
        version: SETTINGS_VERSION,
        settings: settings.clone(),
    };
    store::write_slot(pool, SETTINGS_SLOT, &serde_json::to_string(&record)?).await
}

pub async fn reset(pool: &Pool) -> StudioResult<()> {
    store::clear_slot(pool, SETTINGS_SLOT).await
}

/// Decode a stored record. The flag reports whether a migration happened.
fn decode(raw: &str) -> StudioResult<(AppSettings, bool)> {
    let value: Value = serde_json::from_str(raw)?;
    match value.get("version").and_then(Value::as_u64) {
        None => {
            let settings: AppSettings = serde_json::from_value(value)?;
            Ok((settings, true))
        }
        Some(v) if v == u64::from(SETTINGS_VERSION) => {
            let record: SettingsRecord = serde_json::from_value(value)?;
            Ok((record.settings, false))
        }
        Some(v) => Err(StudioError::LocalState(format!(
            "settings record version {v} is newer than supported version {SETTINGS_VERSION}"
        ))),
    }
}

/// Mask a secret for display, keeping only the last four characters.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return "(unset)".into();
    }
    if chars.len() <= 4 {
        return "****".into();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
