use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;

use minewatch::config::{Config, MirrorMode};
use minewatch::engine::{
    FixedCalendar, HistoryMode, SimulationConfig, TelemetryRuntime, TelemetryScheduler, TickTiming,
};
use minewatch::{ingest, routes, schema};

const FEED: &str = "\
Name,Lat_DD,Long_DD,Location,County,Status
Copper Ridge,46.49,-80.99,North Pit,Sudbury,Active
Kidd Creek,48.69,-81.37,NULL,Timmins,Active
,45.10,-78.20,,,Abandoned
";

#[derive(Debug, Deserialize)]
struct StoredReading {
    mine_id: i64,
    ph: f64,
    lead: f64,
    pm25: f64,
    #[serde(rename = "riskScore")]
    risk_score: i64,
    color: String,
}

/// Boot the full router on an ephemeral port over an in-memory database.
async fn spawn_app() -> Result<(String, TelemetryRuntime)> {
    // ---
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    schema::create_schema(&pool).await?;

    let simulation = SimulationConfig {
        seed: Some(2024),
        history_mode: HistoryMode::Lazy,
        ..SimulationConfig::default()
    };
    let config = Config {
        db_url: "sqlite::memory:".into(),
        db_pool_max: 1,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        sites_csv: PathBuf::from("unused.csv"),
        clock_tick_ms: 1000,
        mirror: MirrorMode::Off,
        simulation: simulation.clone(),
    };

    let calendar = Box::new(FixedCalendar(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()));
    let scheduler = TelemetryScheduler::new(ingest::parse_sites(FEED)?, simulation, calendar);
    let runtime = TelemetryRuntime::new(scheduler, TickTiming::from_cadence(1000, 7));

    let app = routes::router(pool, config, runtime.handle());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((format!("http://{}", addr), runtime))
}

async fn get_json(client: &Client, url: String) -> Result<Value> {
    Ok(client.get(url).send().await?.json().await?)
}

#[tokio::test]
async fn health_endpoint_ok() -> Result<()> {
    // ---
    let (base, _rt) = spawn_app().await?;
    let body: Value = Client::new()
        .get(format!("{}/api/health", base))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn readings_are_classified_and_filtered() -> Result<()> {
    // ---
    let (base, _rt) = spawn_app().await?;
    let client = Client::new();

    let saved: Value = client
        .post(format!("{}/api/mines", base))
        .json(&json!({ "id": 1, "name": "Copper Ridge", "latitude": 46.49, "longitude": -80.99 }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(saved["success"], true);

    let samples = [
        (1, 7.0, 20.0, 15.0),
        (1, 3.0, 250.0, 200.0),
        (2, 6.0, 60.0, 40.0),
    ];
    for (mine_id, ph, lead, pm25) in samples {
        let resp = client
            .post(format!("{}/api/sensor-readings", base))
            .json(&json!({ "mine_id": mine_id, "ph": ph, "lead": lead, "pm25": pm25 }))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let readings: Vec<StoredReading> = client
        .get(format!("{}/api/sensor-readings/1", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(readings.len(), 2);
    // chronological order: baseline first, then the degraded reading
    assert_eq!(readings[0].risk_score, 8);
    assert_eq!(readings[0].color, "#4caf50");
    assert_eq!(readings[1].risk_score, 87);
    assert_eq!(readings[1].color, "#f44336");
    assert_eq!((readings[1].ph, readings[1].lead, readings[1].pm25), (3.0, 250.0, 200.0));

    let filtered: Vec<StoredReading> = client
        .get(format!("{}/api/sensor-readings?mine_id=2&limit=10", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].mine_id, 2);

    let stats: Value = client
        .get(format!("{}/api/stats/mine/1", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(stats["total_readings"], 2);
    assert_eq!(stats["avg_ph"], 5.0);

    Ok(())
}

#[tokio::test]
async fn missing_fields_rejected() -> Result<()> {
    // ---
    let (base, _rt) = spawn_app().await?;
    let resp = Client::new()
        .post(format!("{}/api/sensor-readings", base))
        .json(&json!({ "mine_id": 1, "ph": 7.0 }))
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], "Missing required fields");
    Ok(())
}

#[tokio::test]
async fn export_and_clear() -> Result<()> {
    // ---
    let (base, _rt) = spawn_app().await?;
    let client = Client::new();

    client
        .post(format!("{}/api/sensor-readings", base))
        .json(&json!({ "mine_id": 3, "ph": 6.5, "lead": 42.0, "pm25": 18.0 }))
        .send()
        .await?;

    let csv_resp = client
        .get(format!("{}/api/export/csv", base))
        .send()
        .await?;
    assert!(csv_resp
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("telemetry_export.csv")));
    let csv = csv_resp.text().await?;
    assert!(csv.starts_with("Mine Name,Mine ID,pH"));
    assert!(csv.contains("\"Unknown\",3,6.5,42,18,"));

    let exported: Vec<StoredReading> = client
        .get(format!("{}/api/export/json", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(exported.len(), 1);

    let cleared: Value = client
        .post(format!("{}/api/clear-all", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(cleared["removed"], 1);

    let after: Vec<StoredReading> = client
        .get(format!("{}/api/export/json", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(after.is_empty());
    Ok(())
}

#[tokio::test]
async fn live_sites_as_feature_collection() -> Result<()> {
    // ---
    let (base, _rt) = spawn_app().await?;
    let client = Client::new();

    let fc = get_json(&client, format!("{}/api/sites", base)).await?;
    assert_eq!(fc["type"], "FeatureCollection");
    let features = fc["features"].as_array().expect("features array");
    assert_eq!(features.len(), 3);
    for f in features {
        let p = &f["properties"];
        let ph = p["ph"].as_f64().unwrap();
        let lead = p["lead"].as_f64().unwrap();
        let pm25 = p["pm25"].as_f64().unwrap();
        assert!((2.0..=10.0).contains(&ph));
        assert!((0.0..=300.0).contains(&lead));
        assert!((0.0..=200.0).contains(&pm25));
        assert!(p["riskScore"].as_u64().unwrap() <= 100);
    }
    assert_eq!(features[2]["properties"]["name"], "Unknown");

    let found: Vec<Value> = client
        .get(format!("{}/api/sites/search?q=timmins", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "Kidd Creek");

    let detail = get_json(&client, format!("{}/api/sites/1", base)).await?;
    assert_eq!(detail["site"]["id"], 1);
    assert!(detail["hazards"]["ph"].is_string());

    let missing = client
        .get(format!("{}/api/sites/99", base))
        .send()
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let clock = get_json(&client, format!("{}/api/clock", base)).await?;
    assert_eq!(clock["elapsed_days"], 0);
    assert_eq!(clock["display_date"], "Oct 19, 2026");
    Ok(())
}

#[tokio::test]
async fn history_and_forecast_for_site() -> Result<()> {
    // ---
    let (base, _rt) = spawn_app().await?;
    let client = Client::new();

    let history: Value = client
        .get(format!("{}/api/sites/2/history", base))
        .send()
        .await?
        .json()
        .await?;
    // nothing to backfill at day zero, only the live reading
    assert_eq!(history["readings"].as_array().map(|r| r.len()), Some(1));

    let forecast: Value = client
        .get(format!("{}/api/sites/2/forecast", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(forecast["site_id"], 2);
    assert_eq!(forecast["predictions"].as_array().map(|p| p.len()), Some(3));
    // too little history to move the risk score
    assert_eq!(forecast["forecast_risk_score"], forecast["riskScore"]);

    let released = client
        .delete(format!("{}/api/sites/2/history", base))
        .send()
        .await?;
    assert_eq!(released.status(), StatusCode::NO_CONTENT);

    let unknown = client
        .delete(format!("{}/api/sites/42/history", base))
        .send()
        .await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn date_only_range_filters_readings() -> Result<()> {
    // ---
    let (base, _rt) = spawn_app().await?;
    let client = Client::new();

    client
        .post(format!("{}/api/sensor-readings", base))
        .json(&json!({ "mine_id": 4, "ph": 6.8, "lead": 30.0, "pm25": 12.0 }))
        .send()
        .await?;

    let resp = client
        .get(format!(
            "{}/api/sensor-readings?start_date=2020-01-01&end_date=2099-12-31",
            base
        ))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let rows: Vec<StoredReading> = resp.json().await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].mine_id, 4);

    let past: Vec<StoredReading> = client
        .get(format!("{}/api/sensor-readings?end_date=2019-12-31", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(past.is_empty());

    let bad = client
        .get(format!("{}/api/sensor-readings?start_date=last-week", base))
        .send()
        .await?;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    let body: Value = bad.json().await?;
    assert!(body["error"].as_str().is_some_and(|e| e.contains("start_date")));
    Ok(())
}

#[tokio::test]
async fn mines_fetch_patch_and_bulk_update() -> Result<()> {
    // ---
    let (base, _rt) = spawn_app().await?;
    let client = Client::new();

    for (id, name) in [(1, "Copper Ridge"), (2, "Kidd Creek")] {
        client
            .post(format!("{}/api/mines", base))
            .json(&json!({ "id": id, "name": name, "latitude": 46.0, "longitude": -81.0 }))
            .send()
            .await?;
    }

    let mine = get_json(&client, format!("{}/api/mines/1", base)).await?;
    assert_eq!(mine["name"], "Copper Ridge");

    let missing = client
        .get(format!("{}/api/mines/77", base))
        .send()
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let patched: Value = client
        .patch(format!("{}/api/mines/1", base))
        .json(&json!({ "county": "Sudbury", "ph": 3.0, "lead": 250.0, "pm25": 200.0 }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(patched["name"], "Copper Ridge");
    assert_eq!(patched["county"], "Sudbury");
    assert_eq!(patched["riskScore"], 87);
    assert_eq!(patched["color"], "#f44336");

    let bulk: Value = client
        .post(format!("{}/api/mines/bulk-update", base))
        .json(&json!({ "updates": [
            { "id": 1, "ph": 7.0, "lead": 20.0, "pm25": 15.0 },
            { "_id": 2, "ph": 3.0, "lead": 250.0, "pm25": 200.0 },
            { "id": 99, "ph": 7.0, "lead": 0.0, "pm25": 0.0 }
        ] }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(bulk["updated"], 2);

    let first = get_json(&client, format!("{}/api/mines/1", base)).await?;
    assert_eq!(first["riskScore"], 8);
    assert_eq!(first["county"], "Sudbury");
    let second = get_json(&client, format!("{}/api/mines/2", base)).await?;
    assert_eq!(second["riskScore"], 87);
    Ok(())
}
