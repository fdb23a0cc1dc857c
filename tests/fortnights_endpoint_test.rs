use axum::http::StatusCode;
use serde_json::{json, Value};
use shiftpay::api;
use shiftpay::config::Config;
use shiftpay::db::init_db;
use shiftpay::domain::Decimal;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(shiftpay::Repository::new(pool));

    let mut config = Config::with_database_path(db_path);
    config.default_hourly_wage = Decimal::from_int(10);
    config.random_seed = Some(7);

    let state = api::AppState::new(repo, config);
    TestApp {
        app: api::create_router(state),
        _temp: temp_dir,
    }
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, body)
}

async fn request(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn settle(app: &axum::Router, clock_in: &str, total: &str) -> Value {
    let (status, json) = request(
        app,
        "POST",
        "/v1/shifts",
        Some(json!({
            "employeeId": 1,
            "employeeName": "Ana",
            "clockIn": clock_in,
            "clockOut": clock_in.replace("10:00:00", "15:00:00"),
            "productSales": {"A": total}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}

/// Two March shifts: 500 then 1000, the second beating its rolling average.
async fn seed_first_fortnight(app: &axum::Router) {
    settle(app, "2025-03-10 10:00:00", "500").await;
    let json = settle(app, "2025-03-11 10:00:00", "1000").await;
    assert_eq!(json["shift"]["rollingAverage"], "500.00");
    assert_eq!(json["shift"]["performanceFlag"], true);
}

#[tokio::test]
async fn test_get_fortnight_totals() {
    let test_app = setup_test_app().await;
    seed_first_fortnight(&test_app.app).await;

    let (status, json) = request(
        &test_app.app,
        "GET",
        "/v1/fortnights?employeeId=1&year=2025&month=3&fortnight=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["shiftCount"], 2);
    assert_eq!(json["workedHours"], "10.00");
    assert_eq!(json["totalSales"], "1500.00");
    assert_eq!(json["totalCommissions"], "72.00");
    assert_eq!(json["totalHourlyPay"], "100.00");
    assert_eq!(json["totalMade"], "172.00");
    assert_eq!(json["performanceCount"], 1);
    // 1 * 72 * 0.01
    assert_eq!(json["bonusAmount"], "0.72");
    assert_eq!(json["totalSalary"], "172.72");
    assert_eq!(json["paymentDate"], "2025-03-16");
    assert_eq!(json["isPaid"], false);
}

#[tokio::test]
async fn test_mark_paid_survives_recompute() {
    let test_app = setup_test_app().await;
    seed_first_fortnight(&test_app.app).await;

    let paid = json!({"employeeId": 1, "year": 2025, "month": 3, "fortnight": 1});
    let (status, json) = request(&test_app.app, "POST", "/v1/fortnights/paid", Some(paid)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isPaid"], true);

    // A later shift in the same period recomputes totals but keeps the flag.
    let json = settle(&test_app.app, "2025-03-12 10:00:00", "100").await;
    assert_eq!(json["fortnight"]["shiftCount"], 3);
    assert_eq!(json["fortnight"]["isPaid"], true);

    let unpaid = json!({"employeeId": 1, "year": 2025, "month": 3, "fortnight": 1, "paid": false});
    let (_, json) = request(&test_app.app, "POST", "/v1/fortnights/paid", Some(unpaid)).await;
    assert_eq!(json["isPaid"], false);
}

#[tokio::test]
async fn test_mark_paid_unknown_period() {
    let test_app = setup_test_app().await;

    let body = json!({"employeeId": 1, "year": 2025, "month": 3, "fortnight": 2});
    let (status, _) = request(&test_app.app, "POST", "/v1/fortnights/paid", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = json!({"employeeId": 1, "year": 2025, "month": 3, "fortnight": 3});
    let (status, _) = request(&test_app.app, "POST", "/v1/fortnights/paid", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json!({"employeeId": 1, "year": 2025, "month": 13, "fortnight": 1});
    let (status, _) = request(&test_app.app, "POST", "/v1/fortnights/paid", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_csv() {
    let test_app = setup_test_app().await;
    seed_first_fortnight(&test_app.app).await;
    settle(&test_app.app, "2025-04-02 10:00:00", "300").await;

    let (status, body) = send(&test_app.app, "GET", "/v1/fortnights/export?year=2025&month=3", None).await;
    assert_eq!(status, StatusCode::OK);

    let csv = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("employee_id,year,month,fortnight,shift_count"));
    assert_eq!(
        lines[1],
        "1,2025,3,1,2,10.00,1500.00,72.00,100.00,172.00,1,0.72,172.72,2025-03-16,false"
    );
}

#[tokio::test]
async fn test_backfill_covers_every_period() {
    let test_app = setup_test_app().await;
    seed_first_fortnight(&test_app.app).await;
    settle(&test_app.app, "2025-03-20 10:00:00", "300").await;

    let (status, json) = request(&test_app.app, "POST", "/v1/fortnights/backfill", None).await;
    assert_eq!(status, StatusCode::OK);
    let periods = json.as_array().unwrap();
    assert_eq!(periods.len(), 2);
    assert!(periods.iter().any(|p| p["fortnight"] == 1 && p["shiftCount"] == 2));
    assert!(periods.iter().any(|p| p["fortnight"] == 2 && p["shiftCount"] == 1));
}
