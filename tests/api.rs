use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use seat_booking::cache::CacheService;
use seat_booking::middleware::StaticAccounts;
use seat_booking::models::{NewEvent, Promo, User, ZonePrice};
use seat_booking::services::events::EventService;
use seat_booking::services::{Clock, ManualClock};
use seat_booking::store::memory::VenueSeat;
use seat_booking::store::{MemorySeatStore, SeatStore};
use seat_booking::{app, AppState, EngineSettings};

async fn setup() -> (Router, i64) {
    let store = MemorySeatStore::new();
    store
        .add_venue_seats((1..=4).map(|id| VenueSeat {
            id,
            venue_id: 1,
            row: 1,
            seat: id as i32,
            zone: "A".to_string(),
        }))
        .await;
    store
        .add_promo(Promo {
            code: "WELCOME".into(),
            discount_pct: 15.0,
            valid_from: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            valid_until: Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap(),
            max_usage: None,
            used_count: 0,
        })
        .await;

    let store: Arc<dyn SeatStore> = Arc::new(store);
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()));

    let event_id = EventService::new(store.clone(), clock.clone())
        .initialize_event(NewEvent {
            venue_id: 1,
            title: None,
            starts_at: Utc.with_ymd_and_hms(2025, 7, 1, 19, 0, 0).unwrap(),
            prices: vec![ZonePrice { zone_code: "A".into(), base_price: 50.0, multiplier: 1.0 }],
        })
        .await
        .unwrap();

    let accounts = StaticAccounts(vec![User {
        id: 77,
        email: "ann@example.com".into(),
        password_hash: bcrypt::hash("s3cret", 4).unwrap(),
        name: "Ann".into(),
        is_active: true,
    }]);

    let state = AppState::new(
        store,
        clock,
        EngineSettings::default(),
        CacheService::disabled(),
        Arc::new(accounts),
        None,
    );
    (app(Arc::new(state)), event_id)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", general_purpose::STANDARD.encode(format!("{user}:{password}")))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn hold(app: &Router, event_id: i64, seats: &[i64], token: &str) -> Value {
    let (status, body) = send(
        app,
        post("/api/holds", json!({ "event_id": event_id, "seat_ids": seats, "user_token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn order_body(event_id: i64, seats: &[i64], token: &str) -> Value {
    json!({
        "event_id": event_id,
        "seat_ids": seats,
        "buyer": { "name": "Ann", "email": "ann@example.com" },
        "user_token": token,
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = setup().await;
    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["time"].is_string());
}

#[tokio::test]
async fn hold_then_order_then_lookup() {
    let (app, event_id) = setup().await;

    let held = hold(&app, event_id, &[1, 2], "tok-1").await;
    assert_eq!(held["ok"], true);
    assert_eq!(held["hold_ids"].as_array().unwrap().len(), 2);

    let (status, created) = send(&app, post("/api/orders", order_body(event_id, &[1, 2], "tok-1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["total"], 100.0);
    assert_eq!(created["status"], "pending");

    let id = created["id"].as_str().unwrap();
    let (status, order) = send(&app, Request::get(format!("/api/orders/{id}")).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert!(order["user_id"].is_null());

    let (_, seats) = send(
        &app,
        Request::get(format!("/api/events/{event_id}/seats")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(seats[0]["status"], "booked");
    assert_eq!(seats[2]["status"], "available");
}

#[tokio::test]
async fn conflict_lists_offending_seats() {
    let (app, event_id) = setup().await;
    hold(&app, event_id, &[3], "owner").await;

    let (status, body) = send(&app, post("/api/orders", order_body(event_id, &[3], "intruder"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "error": "hold_mismatch", "seat_ids": [3] }));
}

#[tokio::test]
async fn malformed_bodies_are_bad_payload() {
    let (app, event_id) = setup().await;

    let garbage = Request::post("/api/holds")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, garbage).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_payload");

    let (status, body) = send(
        &app,
        post("/api/holds", json!({ "event_id": event_id, "seat_ids": [], "user_token": "t" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_payload");

    let mut bad_email = order_body(event_id, &[1], "t");
    bad_email["buyer"]["email"] = json!("nope");
    let (status, body) = send(&app, post("/api/orders", bad_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_payload");
}

#[tokio::test]
async fn unknown_event_is_bad_event() {
    let (app, _) = setup().await;
    let (status, body) = send(
        &app,
        post("/api/holds", json!({ "event_id": 999, "seat_ids": [1], "user_token": "t" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "bad_event");
}

#[tokio::test]
async fn basic_auth_links_account_or_rejects() {
    let (app, event_id) = setup().await;
    hold(&app, event_id, &[4], "tok").await;

    let mut wrong = post("/api/orders", order_body(event_id, &[4], "tok"));
    wrong.headers_mut().insert(header::AUTHORIZATION, basic("ann@example.com", "bad").parse().unwrap());
    let (status, body) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let mut right = post("/api/orders", order_body(event_id, &[4], "tok"));
    right.headers_mut().insert(header::AUTHORIZATION, basic("ann@example.com", "s3cret").parse().unwrap());
    let (status, created) = send(&app, right).await;
    assert_eq!(status, StatusCode::CREATED);

    let id = created["id"].as_str().unwrap();
    let (_, order) = send(&app, Request::get(format!("/api/orders/{id}")).body(Body::empty()).unwrap()).await;
    assert_eq!(order["user_id"], 77);
}

#[tokio::test]
async fn renew_and_release_holds() {
    let (app, event_id) = setup().await;
    let held = hold(&app, event_id, &[1, 2], "tok").await;
    let ids = held["hold_ids"].clone();

    let (status, renewed) = send(&app, post("/api/holds/renew", json!({ "hold_ids": ids, "user_token": "tok" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renewed["expires_at"], held["expires_at"]);

    let (status, released) = send(&app, post("/api/holds/release", json!({ "hold_ids": ids, "user_token": "tok" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(released["released"], 2);
}

#[tokio::test]
async fn promo_validation_endpoint() {
    let (app, _) = setup().await;

    let (status, body) = send(&app, post("/api/promos/validate", json!({ "code": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "code_required");

    let (status, body) = send(&app, post("/api/promos/validate", json!({ "code": "NOPE" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
}

#[tokio::test]
async fn seat_map_and_missing_lookups() {
    let (app, event_id) = setup().await;

    let response = app
        .clone()
        .oneshot(Request::get(format!("/api/events/{event_id}/seats")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-cache"], "MISS");

    let (status, body) = send(&app, Request::get("/api/events/999/seats").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let missing = uuid::Uuid::new_v4();
    let (status, body) = send(&app, Request::get(format!("/api/orders/{missing}")).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn admin_creates_event() {
    let (app, _) = setup().await;

    let (status, body) = send(
        &app,
        post(
            "/api/admin/events",
            json!({
                "venue_id": 1,
                "title": "Matinee",
                "starts_at": "2025-08-01T15:00:00Z",
                "prices": [{ "zone_code": "A", "base_price": 40.0 }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let (_, seats) = send(&app, Request::get(format!("/api/events/{id}/seats")).body(Body::empty()).unwrap()).await;
    assert_eq!(seats.as_array().unwrap().len(), 4);
    assert_eq!(seats[0]["price"], 40.0);

    let (status, body) = send(
        &app,
        post("/api/admin/events", json!({ "venue_id": 9, "starts_at": "2025-08-01T15:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_payload");
}

#[tokio::test]
async fn responses_use_snake_case_keys() {
    let (app, event_id) = setup().await;

    let held = hold(&app, event_id, &[1], "tok").await;
    assert!(held["hold_ids"].is_array());
    assert!(held["expires_at"].is_string());
    assert!(held.get("holdIds").is_none());

    let (_, renewed) = send(
        &app,
        post("/api/holds/renew", json!({ "hold_ids": held["hold_ids"], "user_token": "tok" })),
    )
    .await;
    assert!(renewed["expires_at"].is_string());

    let (status, quote) = send(&app, post("/api/promos/validate", json!({ "code": "welcome" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["discount_pct"], 15.0);
    assert!(quote["valid_until"].is_string());
    assert!(quote.get("discountPct").is_none());

    let (_, seats) = send(
        &app,
        Request::get(format!("/api/events/{event_id}/seats")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(seats[0]["seat_id"], 1);
    assert_eq!(seats[0]["status"], "hold");
    assert!(seats[0].get("seatId").is_none());
}
