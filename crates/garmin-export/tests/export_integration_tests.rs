//! Integration tests for the range driver
//!
//! A wiremock server stands in for the Connect API; outputs go to a temporary
//! directory.

use chrono::NaiveDate;
use garmin_export::auth::Session;
use garmin_export::client::{GarminClient, OAuth2Token};
use garmin_export::config::{ActivityKind, ExportConfig, ACTIVITIES_FILE, HEALTH_FILE};
use garmin_export::export::{fetch_metric, Exporter, Metric};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{any, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_token() -> OAuth2Token {
    OAuth2Token {
        scope: "test".to_string(),
        jti: "test-jti".to_string(),
        token_type: "Bearer".to_string(),
        access_token: "test-access-token".to_string(),
        refresh_token: "test-refresh-token".to_string(),
        expires_in: 3600,
        expires_at: chrono::Utc::now().timestamp() + 3600,
        refresh_token_expires_in: 86400,
        refresh_token_expires_at: chrono::Utc::now().timestamp() + 86400,
    }
}

fn test_session(server: &MockServer) -> Session {
    let client = GarminClient::new_with_base_url(&server.uri()).unwrap();
    Session::new(client, test_token(), "runner")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn config(start: NaiveDate, end: NaiveDate, days: u32, dir: &Path) -> ExportConfig {
    ExportConfig::new(start, end)
        .with_chunk_days(days)
        .unwrap()
        .with_output_dir(dir)
}

fn health_header() -> Vec<String> {
    std::iter::once("calendar_date")
        .chain(Metric::ALL.iter().flat_map(|m| m.columns().iter().copied()))
        .map(str::to_string)
        .collect()
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

fn field<'a>(header: &[String], row: &'a [String], column: &str) -> &'a str {
    let index = header.iter().position(|c| c == column).unwrap();
    &row[index]
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn activity(start: &str, name: &str) -> serde_json::Value {
    json!({
        "activityId": 1,
        "activityName": name,
        "startTimeLocal": start,
        "activityType": {"typeKey": "running", "typeId": 1}
    })
}

#[tokio::test]
async fn test_partial_failures_keep_full_health_schema() {
    let server = MockServer::start().await;

    mount_json(
        &server,
        "/usersummary-service/stats/steps/daily/2024-01-02/2024-01-08",
        json!([{"calendarDate": "2024-01-03", "totalSteps": 1000, "totalDistance": 800, "stepGoal": 5000}]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/wellness-service/stats/daily/sleep/score/2024-01-02/2024-01-08"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    mount_json(
        &server,
        "/usersummary-service/stats/im/daily/2024-01-02/2024-01-08",
        json!({"unexpected": true}),
    )
    .await;
    mount_json(
        &server,
        "/hrv-service/hrv/daily/2024-01-02/2024-01-08",
        json!({"hrvSummaries": [{"calendarDate": "2024-01-02", "weeklyAvg": 48, "status": "BALANCED"}]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/activitylist-service/activities/search/activities"))
        .and(query_param("startDate", "2024-01-01"))
        .and(query_param("endDate", "2024-01-08"))
        .and(query_param("start", "0"))
        .and(query_param("limit", "20"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([activity("2024-01-02 07:00:00", "Morning Run")])),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = test_session(&server);
    let cfg = config(date(2024, 1, 1), date(2024, 1, 1), 7, temp.path());

    let summary = Exporter::new(&session, &cfg).run().await.unwrap();
    assert_eq!(summary.chunks, 1);
    assert_eq!(summary.missing_metrics, 2);
    assert_eq!(summary.health_rows, 1);
    assert_eq!(summary.activity_rows, 1);

    let (header, rows) = read_csv(&temp.path().join(HEALTH_FILE));
    assert_eq!(header, health_header());
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(field(&header, row, "calendar_date"), "2024-01-02");
    assert_eq!(field(&header, row, "total_steps"), "1000");
    assert_eq!(field(&header, row, "sleep_quality"), "");
    assert_eq!(field(&header, row, "intensity_minutes"), "");
    assert_eq!(field(&header, row, "weekly_avg"), "48");
    assert_eq!(field(&header, row, "status"), "BALANCED");

    let (header, rows) = read_csv(&temp.path().join(ACTIVITIES_FILE));
    assert_eq!(header, vec!["startTimeLocal", "activityId", "activityName", "activityType.typeId", "activityType.typeKey"]);
    assert_eq!(rows[0][0], "2024-01-02 07:00:00");
    assert_eq!(field(&header, &rows[0], "activityType.typeKey"), "running");
}

#[tokio::test]
async fn test_start_after_end_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = test_session(&server);
    let cfg = config(date(2024, 2, 1), date(2024, 1, 1), 31, temp.path());

    let summary = Exporter::new(&session, &cfg).run().await.unwrap();
    assert_eq!(summary.chunks, 0);
    assert!(!temp.path().join(HEALTH_FILE).exists());
    assert!(!temp.path().join(ACTIVITIES_FILE).exists());
}

#[tokio::test]
async fn test_earlier_range_appends_after_existing_rows() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/usersummary-service/stats/steps/daily/2024-01-02/2024-01-04",
        json!([
            {"calendarDate": "2024-01-02", "totalSteps": 11},
            {"calendarDate": "2024-01-03", "totalSteps": 22}
        ]),
    )
    .await;

    let temp = TempDir::new().unwrap();
    let health = temp.path().join(HEALTH_FILE);
    let existing = format!(
        "{}\n2024-03-01,9000,7000,8000,,,,,,,,,,,,,,\n",
        health_header().join(",")
    );
    fs::write(&health, &existing).unwrap();

    let session = test_session(&server);
    let cfg = config(date(2024, 1, 1), date(2024, 1, 1), 3, temp.path());
    Exporter::new(&session, &cfg).run().await.unwrap();

    let contents = fs::read_to_string(&health).unwrap();
    assert!(contents.starts_with(&existing));
    assert_eq!(contents.matches("calendar_date").count(), 1);

    let (header, rows) = read_csv(&health);
    let dates: Vec<&str> = rows.iter().map(|r| field(&header, r, "calendar_date")).collect();
    assert_eq!(dates, vec!["2024-03-01", "2024-01-01", "2024-01-02"]);
    assert_eq!(field(&header, &rows[0], "total_steps"), "9000");
    assert_eq!(field(&header, &rows[2], "total_steps"), "22");
}

#[tokio::test]
async fn test_chunk_and_window_boundaries() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = test_session(&server);
    let cfg = config(date(2024, 1, 1), date(2024, 1, 10), 5, temp.path());

    let summary = Exporter::new(&session, &cfg).run().await.unwrap();
    assert_eq!(summary.chunks, 2);
    assert_eq!(summary.missing_metrics, 8);
    assert_eq!(summary.failed_activity_chunks, 2);
    assert_eq!(summary.health_rows, 0);

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<String> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert!(paths.contains(&"/usersummary-service/stats/steps/daily/2024-01-02/2024-01-06".to_string()));
    assert!(paths.contains(&"/usersummary-service/stats/steps/daily/2024-01-07/2024-01-11".to_string()));
    assert!(paths.contains(&"/hrv-service/hrv/daily/2024-01-07/2024-01-11".to_string()));

    let activity_windows: Vec<(String, String)> = requests
        .iter()
        .filter(|r| r.url.path() == "/activitylist-service/activities/search/activities")
        .map(|r| {
            let q: std::collections::HashMap<_, _> = r.url.query_pairs().into_owned().collect();
            (q["startDate"].clone(), q["endDate"].clone())
        })
        .collect();
    assert_eq!(
        activity_windows,
        vec![
            ("2024-01-01".to_string(), "2024-01-06".to_string()),
            ("2024-01-06".to_string(), "2024-01-11".to_string()),
        ]
    );

    // Nothing fetched, nothing written
    assert!(!temp.path().join(HEALTH_FILE).exists());
}

#[tokio::test]
async fn test_long_chunk_pages_metric_requests() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/wellness-service/stats/daily/sleep/score/2024-01-02/2024-01-04",
        json!([{"calendarDate": "2024-01-02", "value": 70}]),
    )
    .await;
    mount_json(
        &server,
        "/wellness-service/stats/daily/sleep/score/2024-01-05/2024-02-01",
        json!([{"calendarDate": "2024-02-01", "value": 88}]),
    )
    .await;

    let session = test_session(&server);
    let fetched = fetch_metric(&session, Metric::Sleep, date(2024, 2, 1), 31).await;

    assert!(!fetched.is_placeholder());
    let dates: Vec<NaiveDate> = fetched.frame.dates().copied().collect();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 31)]);
    assert_eq!(fetched.frame.get(date(2024, 1, 31), "sleep_quality"), Some(&json!(88)));
}

#[tokio::test]
async fn test_malformed_metric_returns_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/hrv-service/hrv/daily/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let session = test_session(&server);
    let fetched = fetch_metric(&session, Metric::Hrv, date(2024, 1, 8), 7).await;

    assert!(fetched.is_placeholder());
    assert_eq!(fetched.frame, Metric::Hrv.placeholder());
    assert_eq!(fetched.frame.columns(), Metric::Hrv.columns());
}

#[tokio::test]
async fn test_activities_follow_pages_until_short_page() {
    let server = MockServer::start().await;
    let first: Vec<_> = (0..20)
        .map(|i| activity(&format!("2024-01-02 {:02}:00:00", i), "Run"))
        .collect();
    let second: Vec<_> = (0..3)
        .map(|i| activity(&format!("2024-01-03 {:02}:00:00", i), "Ride"))
        .collect();

    Mock::given(method("GET"))
        .and(path("/activitylist-service/activities/search/activities"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(first)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/activitylist-service/activities/search/activities"))
        .and(query_param("start", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(second)))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = test_session(&server);
    let cfg = config(date(2024, 1, 1), date(2024, 1, 1), 7, temp.path());

    let summary = Exporter::new(&session, &cfg).run().await.unwrap();
    assert_eq!(summary.activity_rows, 23);

    let (_, rows) = read_csv(&temp.path().join(ACTIVITIES_FILE));
    assert_eq!(rows.len(), 23);
    assert_eq!(rows[22][0], "2024-01-03 02:00:00");
}

#[tokio::test]
async fn test_activity_type_filter_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/activitylist-service/activities/search/activities"))
        .and(query_param("activityType", "running"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([activity("2024-01-02 07:00:00", "Tempo")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = test_session(&server);
    let cfg = config(date(2024, 1, 1), date(2024, 1, 1), 7, temp.path())
        .with_activity_type(Some(ActivityKind::Running));

    let summary = Exporter::new(&session, &cfg).run().await.unwrap();
    assert_eq!(summary.activity_rows, 1);
}

#[tokio::test]
async fn test_activity_failure_does_not_stop_health_export() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/usersummary-service/stats/steps/daily/2024-01-02/2024-01-08",
        json!([{"calendarDate": "2024-01-05", "totalSteps": 4321}]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/activitylist-service/activities/search/activities"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let session = test_session(&server);
    let cfg = config(date(2024, 1, 1), date(2024, 1, 1), 7, temp.path());

    let summary = Exporter::new(&session, &cfg).run().await.unwrap();
    assert_eq!(summary.failed_activity_chunks, 1);
    assert_eq!(summary.health_rows, 1);
    assert!(temp.path().join(HEALTH_FILE).exists());
    assert!(!temp.path().join(ACTIVITIES_FILE).exists());
}

#[tokio::test]
async fn test_empty_newest_page_stops_paging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/usersummary-service/stats/steps/daily/2024-01-05/2024-02-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/usersummary-service/stats/steps/daily/2024-01-02/2024-01-04"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let session = test_session(&server);
    let fetched = fetch_metric(&session, Metric::Steps, date(2024, 2, 1), 31).await;

    assert!(!fetched.is_placeholder());
    assert_eq!(fetched.frame.len(), 0);
    assert_eq!(fetched.frame.columns(), Metric::Steps.columns());
}
