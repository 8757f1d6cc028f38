//! Client-local persisted state: named JSON slots in a SQLite file.
//!
//! Every write is awaited before returning. There is no coordination between
//! processes sharing the file; the last write to a slot wins.
use crate::error::StudioResult;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

pub type Pool = SqlitePool;

pub const SETTINGS_SLOT: &str = "adgen.settings";
pub const DRAFT_SLOT: &str = "adgen.draft";

pub async fn init_pool(database_url: &str) -> StudioResult<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // Create the file on first use.
    let mut rebuilt = format!("sqlite://{expanded_path}");
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> StudioResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|err| crate::error::StudioError::LocalState(err.to_string()))?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn read_slot(pool: &Pool, slot: &str) -> StudioResult<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM local_state WHERE slot = ?")
        .bind(slot)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

#[instrument(skip(pool, value))]
pub async fn write_slot(pool: &Pool, slot: &str, value: &str) -> StudioResult<()> {
    sqlx::query(
        "INSERT INTO local_state (slot, value, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(slot) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(slot)
    .bind(value)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn clear_slot(pool: &Pool, slot: &str) -> StudioResult<()> {
    sqlx::query("DELETE FROM local_state WHERE slot = ?")
        .bind(slot)
        .execute(pool)
        .await?;
    Ok(())
}
