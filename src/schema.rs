//! Database schema management for `minewatch-telemetry`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::SqlitePool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `mines` table for site metadata and latest readings, and the
/// `sensor_readings` table for the time series. Safe to call on every
/// startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mines (
            id          INTEGER PRIMARY KEY,
            name        TEXT    NOT NULL,
            location    TEXT,
            county      TEXT,
            latitude    REAL    NOT NULL,
            longitude   REAL    NOT NULL,
            status      TEXT,
            ph          REAL,
            lead        REAL,
            pm25        REAL,
            risk_score  INTEGER,
            color       TEXT,
            updated_at  TEXT    NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            mine_id     INTEGER NOT NULL,
            ph          REAL    NOT NULL,
            lead        REAL    NOT NULL,
            pm25        REAL    NOT NULL,
            risk_score  INTEGER NOT NULL,
            color       TEXT    NOT NULL,
            timestamp   TEXT    NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_mine_timestamp
            ON sensor_readings (mine_id, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
