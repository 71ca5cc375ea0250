//! Settings database operations
//!
//! Key-value accessors over the shared `settings` table, plus the tiered
//! resolution for the marketplace API credential (database first, then
//! environment). The credential is optional: the public items endpoint
//! answers unauthenticated reads at a lower rate ceiling.

use ofertafit_common::{Error, Result};
use sqlx::SqlitePool;

const MARKETPLACE_TOKEN_KEY: &str = "marketplace_api_token";
const MARKETPLACE_TOKEN_ENV: &str = "OFERTAFIT_ML_TOKEN";

/// Get the marketplace API token from the database
pub async fn get_marketplace_token(db: &SqlitePool) -> Result<Option<String>> {
    get_setting::<String>(db, MARKETPLACE_TOKEN_KEY).await
}

/// Set the marketplace API token in the database
pub async fn set_marketplace_token(db: &SqlitePool, token: String) -> Result<()> {
    set_setting(db, MARKETPLACE_TOKEN_KEY, token).await
}

/// Resolve the marketplace credential: database → environment
///
/// Returns `None` when neither source has a non-empty value.
pub async fn resolve_marketplace_token(db: &SqlitePool) -> Result<Option<String>> {
    if let Some(token) = get_marketplace_token(db).await? {
        if !token.trim().is_empty() {
            tracing::debug!("Marketplace token loaded from database");
            return Ok(Some(token));
        }
    }

    if let Ok(token) = std::env::var(MARKETPLACE_TOKEN_ENV) {
        if !token.trim().is_empty() {
            tracing::debug!("Marketplace token loaded from environment");
            return Ok(Some(token));
        }
    }

    Ok(None)
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}
