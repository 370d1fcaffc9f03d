//! SQL access for mines and sensor readings.
//!
//! Shared by the HTTP routes and the local persistence mirror so the
//! queries live in exactly one place.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::engine::risk::{self, RiskThresholds};
use crate::models::{MineRecord, MineStats, StoredReading};

// ---

const READING_COLUMNS: &str =
    "sr.id, sr.mine_id, sr.ph, sr.lead, sr.pm25, sr.risk_score, sr.color, sr.timestamp, m.name";

/// Filters for listing readings. All fields optional.
#[derive(Debug, Default, Clone)]
pub struct ReadingFilter {
    pub mine_id: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Which end of a time range a date string bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Start,
    End,
}

/// Parse an RFC 3339 timestamp, a naive `YYYY-MM-DDTHH:MM:SS` (taken as
/// UTC) or a bare `YYYY-MM-DD`.
///
/// A bare date covers the whole day: midnight for [`DateBound::Start`],
/// the last instant of the day for [`DateBound::End`].
pub fn parse_date_bound(raw: &str, bound: DateBound) -> Option<DateTime<Utc>> {
    // ---
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let naive = match bound {
        DateBound::Start => date.and_hms_opt(0, 0, 0)?,
        DateBound::End => date.and_hms_nano_opt(23, 59, 59, 999_999_999)?,
    };
    Some(naive.and_utc())
}

/// Store one reading, deriving its risk score and colour. Returns the new row id.
pub async fn insert_reading(
    pool: &SqlitePool,
    mine_id: i64,
    ph: f64,
    lead: f64,
    pm25: f64,
    thresholds: &RiskThresholds,
    timestamp: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    // ---
    let c = risk::classify_with(thresholds, ph, lead, pm25);

    let result = sqlx::query(
        r#"
        INSERT INTO sensor_readings (mine_id, ph, lead, pm25, risk_score, color, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(mine_id)
    .bind(ph)
    .bind(lead)
    .bind(pm25)
    .bind(i64::from(c.risk_score))
    .bind(c.color)
    .bind(timestamp)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Create or replace a mine by id.
pub async fn upsert_mine(pool: &SqlitePool, mine: &MineRecord) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO mines (
            id, name, location, county, latitude, longitude, status,
            ph, lead, pm25, risk_score, color, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (id) DO UPDATE SET
            name       = excluded.name,
            location   = excluded.location,
            county     = excluded.county,
            latitude   = excluded.latitude,
            longitude  = excluded.longitude,
            status     = excluded.status,
            ph         = excluded.ph,
            lead       = excluded.lead,
            pm25       = excluded.pm25,
            risk_score = excluded.risk_score,
            color      = excluded.color,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(mine.id)
    .bind(&mine.name)
    .bind(&mine.location)
    .bind(&mine.county)
    .bind(mine.latitude)
    .bind(mine.longitude)
    .bind(&mine.status)
    .bind(mine.ph)
    .bind(mine.lead)
    .bind(mine.pm25)
    .bind(mine.risk_score)
    .bind(&mine.color)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_mines(pool: &SqlitePool) -> Result<Vec<MineRecord>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, MineRecord>(
        r#"
        SELECT id, name, location, county, latitude, longitude, status,
               ph, lead, pm25, risk_score, color
        FROM mines
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn get_mine(pool: &SqlitePool, id: i64) -> Result<Option<MineRecord>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, MineRecord>(
        r#"
        SELECT id, name, location, county, latitude, longitude, status,
               ph, lead, pm25, risk_score, color
        FROM mines
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Replace a mine's latest readings and reclassify it.
///
/// Returns `false` when no mine has that id.
pub async fn update_mine_readings(
    pool: &SqlitePool,
    id: i64,
    ph: f64,
    lead: f64,
    pm25: f64,
    thresholds: &RiskThresholds,
) -> Result<bool, sqlx::Error> {
    // ---
    let c = risk::classify_with(thresholds, ph, lead, pm25);

    let result = sqlx::query(
        r#"
        UPDATE mines
        SET ph = $1, lead = $2, pm25 = $3, risk_score = $4, color = $5, updated_at = $6
        WHERE id = $7
        "#,
    )
    .bind(ph)
    .bind(lead)
    .bind(pm25)
    .bind(i64::from(c.risk_score))
    .bind(c.color)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Readings matching `filter`, newest first.
pub async fn list_readings(
    pool: &SqlitePool,
    filter: &ReadingFilter,
) -> Result<Vec<StoredReading>, sqlx::Error> {
    // ---
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM sensor_readings sr LEFT JOIN mines m ON sr.mine_id = m.id WHERE 1 = 1",
        READING_COLUMNS
    ));

    if let Some(mine_id) = filter.mine_id {
        qb.push(" AND sr.mine_id = ").push_bind(mine_id);
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND sr.timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND sr.timestamp <= ").push_bind(end);
    }

    qb.push(" ORDER BY sr.timestamp DESC, sr.id DESC");
    qb.push(" LIMIT ").push_bind(filter.limit.unwrap_or(1000).max(0));
    qb.push(" OFFSET ").push_bind(filter.offset.unwrap_or(0).max(0));

    qb.build_query_as::<StoredReading>().fetch_all(pool).await
}

/// The most recent `limit` readings for one mine, returned oldest first.
pub async fn readings_for_mine(
    pool: &SqlitePool,
    mine_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<StoredReading>, sqlx::Error> {
    // ---
    let mut rows = sqlx::query_as::<_, StoredReading>(&format!(
        r#"
        SELECT {}
        FROM sensor_readings sr LEFT JOIN mines m ON sr.mine_id = m.id
        WHERE sr.mine_id = $1
        ORDER BY sr.timestamp DESC, sr.id DESC
        LIMIT $2 OFFSET $3
        "#,
        READING_COLUMNS
    ))
    .bind(mine_id)
    .bind(limit.max(0))
    .bind(offset.max(0))
    .fetch_all(pool)
    .await?;

    rows.reverse();
    Ok(rows)
}

pub async fn mine_stats(pool: &SqlitePool, mine_id: i64) -> Result<MineStats, sqlx::Error> {
    // ---
    sqlx::query_as::<_, MineStats>(
        r#"
        SELECT
            COUNT(*)  AS total_readings,
            AVG(ph)   AS avg_ph,   MIN(ph)   AS min_ph,   MAX(ph)   AS max_ph,
            AVG(lead) AS avg_lead, MIN(lead) AS min_lead, MAX(lead) AS max_lead,
            AVG(pm25) AS avg_pm25, MIN(pm25) AS min_pm25, MAX(pm25) AS max_pm25
        FROM sensor_readings
        WHERE mine_id = $1
        "#,
    )
    .bind(mine_id)
    .fetch_one(pool)
    .await
}

/// Every reading, oldest first, for bulk export.
pub async fn export_readings(pool: &SqlitePool) -> Result<Vec<StoredReading>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, StoredReading>(&format!(
        r#"
        SELECT {}
        FROM sensor_readings sr LEFT JOIN mines m ON sr.mine_id = m.id
        ORDER BY sr.timestamp, sr.id
        "#,
        READING_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

/// Delete every stored reading. Returns the number removed.
pub async fn clear_readings(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sensor_readings").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Render readings as CSV with a header row.
pub fn readings_to_csv(rows: &[StoredReading]) -> String {
    // ---
    let mut csv =
        String::from("Mine Name,Mine ID,pH,Lead (ppm),PM2.5 (µg/m³),Risk Score,Timestamp\n");
    for row in rows {
        let name = row.name.as_deref().unwrap_or("Unknown").replace('"', "\"\"");
        csv.push_str(&format!(
            "\"{}\",{},{},{},{},{},\"{}\"\n",
            name,
            row.mine_id,
            row.ph,
            row.lead,
            row.pm25,
            row.risk_score,
            row.timestamp.to_rfc3339()
        ));
    }
    csv
}
