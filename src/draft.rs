//! Draft store for the ad-creation form.
use crate::error::{StudioError, StudioResult};
use crate::model::CreateAdDraft;
use crate::store::{self, Pool, DRAFT_SLOT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};

const DRAFT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct DraftRecord {
    version: u32,
    draft: CreateAdDraft,
}

/// Load the saved draft.
///
/// An unversioned record from older builds is rewritten in the current shape.
/// A record that no longer decodes is dropped with a warning rather than
/// blocking the form. A record from a newer build is left untouched.
#[instrument(skip_all)]
pub async fn load(pool: &Pool) -> StudioResult<CreateAdDraft> {
    let Some(raw) = store::read_slot(pool, DRAFT_SLOT).await? else {
        return Ok(CreateAdDraft::default());
    };
    let value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => return discard(pool, err).await,
    };
    let version = value.get("version").map(Value::as_u64);
    match version {
        None => match serde_json::from_value::<CreateAdDraft>(value) {
            Ok(legacy) => {
                save(pool, &legacy).await?;
                Ok(legacy)
            }
            Err(err) => discard(pool, err).await,
        },
        Some(Some(v)) if v == u64::from(DRAFT_VERSION) => {
            match serde_json::from_value::<DraftRecord>(value) {
                Ok(record) => Ok(record.draft),
                Err(err) => discard(pool, err).await,
            }
        }
        Some(Some(v)) if v > u64::from(DRAFT_VERSION) => Err(StudioError::LocalState(format!(
            "draft record version {v} is newer than supported version {DRAFT_VERSION}"
        ))),
        Some(_) => {
            let err = format!("unsupported draft version {}", value["version"]);
            discard(pool, err).await
        }
    }
}

async fn discard(pool: &Pool, err: impl std::fmt::Display) -> StudioResult<CreateAdDraft> {
    warn!(%err, "discarding unreadable draft");
    clear(pool).await?;
    Ok(CreateAdDraft::default())
}

#[instrument(skip_all)]
pub async fn save(pool: &Pool, draft: &CreateAdDraft) -> StudioResult<()> {
    let record = DraftRecord {
        version: DRAFT_VERSION,
        draft: draft.clone(),
    };
    store::write_slot(pool, DRAFT_SLOT, &serde_json::to_string(&record)?).await
}

pub async fn clear(pool: &Pool) -> StudioResult<()> {
    store::clear_slot(pool, DRAFT_SLOT).await
}

/// Apply `change` and persist immediately.
pub async fn update<F>(pool: &Pool, change: F) -> StudioResult<CreateAdDraft>
where
    F: FnOnce(&mut CreateAdDraft),
{
    let mut draft = load(pool).await?;
    change(&mut draft);
    save(pool, &draft).await?;
    Ok(draft)
}
