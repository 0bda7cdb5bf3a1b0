use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use ecoride_api::middleware::issue_token;
use ecoride_api::{app, AppState, Stores};
use ecoride_core::{Actor, FixedClock};
use ecoride_store::app_config::{AuthConfig, ServerConfig};
use ecoride_store::{Config, InMemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    state: AppState,
    clock: Arc<FixedClock>,
}

fn t0() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap().and_hms_opt(7, 0, 0).unwrap().and_utc()
}

fn test_config() -> Config {
    Config {
        server: ServerConfig { port: 0 },
        database: None,
        redis: None,
        auth: AuthConfig { jwt_secret: "integration-secret".into(), jwt_expiration_seconds: 3600 },
        pricing: Default::default(),
        lifecycle: Default::default(),
        eco: Default::default(),
        rate_limit: Default::default(),
    }
}

fn test_app() -> TestApp {
    let clock = Arc::new(FixedClock::new(t0()));
    let stores = Stores::in_memory(Arc::new(InMemoryStore::new()));
    let state = AppState::new(&test_config(), stores, clock.clone(), None);
    TestApp { router: app(state.clone()), state, clock }
}

impl TestApp {
    fn token(&self, actor: Actor) -> String {
        issue_token(&self.state.auth, actor, Utc::now()).unwrap()
    }

    async fn call(&self, method: &str, uri: &str, actor: Option<Actor>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(actor)));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, value)
    }

    async fn create_trip(&self, driver: Actor) -> Value {
        let (status, trip) = self
            .call(
                "POST",
                "/v1/trips",
                Some(driver),
                Some(json!({
                    "start_address": "Paris, Gare de Lyon",
                    "start_latitude": 48.8566,
                    "start_longitude": 2.3522,
                    "end_address": "Lyon Part-Dieu",
                    "end_latitude": 45.7640,
                    "end_longitude": 4.8357,
                    "departure_at": (t0() + Duration::hours(2)).to_rfc3339(),
                    "distance_km": 465.0,
                    "price_per_seat_cents": 2500,
                    "total_seats": 3
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", trip);
        trip
    }
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let app = test_app();
    let (status, body) = app.call("GET", "/v1/me/trips", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/me/trips")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_trip_reports_every_validation_error() {
    let app = test_app();
    let (status, body) = app
        .call(
            "POST",
            "/v1/trips",
            Some(Actor::user(Uuid::new_v4())),
            Some(json!({
                "start_address": " ",
                "start_latitude": 95.0,
                "start_longitude": 2.35,
                "end_address": "Lyon",
                "end_latitude": 45.76,
                "end_longitude": 4.83,
                "departure_at": (t0() + Duration::hours(2)).to_rfc3339(),
                "price_per_seat_cents": 2500,
                "total_seats": 12
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_search_and_estimate_are_public() {
    let app = test_app();
    let trip = app.create_trip(Actor::user(Uuid::new_v4())).await;

    let (status, found) = app.call("GET", "/v1/trips/search?end_address=part-dieu", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found[0]["id"], trip["id"]);

    let uri = "/v1/trips/search?start_latitude=48.80&start_longitude=2.12&end_latitude=45.77&end_longitude=4.89";
    let (_, found) = app.call("GET", uri, None, None).await;
    assert_eq!(found.as_array().unwrap().len(), 1);

    let uri = "/v1/trips/estimate?start_latitude=48.8566&start_longitude=2.3522&end_latitude=45.7640&end_longitude=4.8357";
    let (status, estimate) = app.call("GET", uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(estimate["suggested_price_cents"], 2400);
}

#[tokio::test]
async fn test_booking_then_full_trip_lifecycle() {
    let app = test_app();
    let driver = Actor::user(Uuid::new_v4());
    let passenger = Actor::user(Uuid::new_v4());
    let trip = app.create_trip(driver).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    let (status, quote) = app
        .call("GET", &format!("/v1/trips/{}/quote?seats=2", trip_id), Some(passenger), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    // 5000 + 20% fee
    assert_eq!(quote["total_cents"], 6000);

    let (status, receipt) = app
        .call("POST", &format!("/v1/trips/{}/bookings", trip_id), Some(passenger), Some(json!({ "seats": 2 })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", receipt);
    let booking_id = receipt["booking"]["id"].as_str().unwrap().to_string();
    let code = receipt["booking"]["validation_code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);

    let (status, _) = app
        .call("POST", &format!("/v1/trips/{}/bookings", trip_id), Some(passenger), Some(json!({ "seats": 1 })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The driver never sees the code
    let (status, bookings) = app.call("GET", &format!("/v1/trips/{}/bookings", trip_id), Some(driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(bookings[0].get("validation_code").is_none());
    let (status, _) = app.call("GET", &format!("/v1/trips/{}/passengers", trip_id), Some(passenger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let at_start = json!({ "latitude": 48.8568, "longitude": 2.3524 });
    let (status, body) = app
        .call("POST", &format!("/v1/trips/{}/open", trip_id), Some(driver), Some(at_start.clone()))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["minutes_remaining"], 90);

    app.clock.set(t0() + Duration::minutes(110));
    let (status, _) = app
        .call("POST", &format!("/v1/trips/{}/open", trip_id), Some(passenger), Some(at_start.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, opened) = app
        .call("POST", &format!("/v1/trips/{}/open", trip_id), Some(driver), Some(at_start))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", opened);
    assert_eq!(opened["outcome"], "opened");
    assert_eq!(opened["trip"]["status"], "opened");

    let redeem = json!({ "code": code.to_lowercase() });
    let (status, redeemed) = app.call("POST", "/v1/bookings/redeem", Some(driver), Some(redeem.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(redeemed["code_used"], true);
    let (status, _) = app.call("POST", "/v1/bookings/redeem", Some(driver), Some(redeem)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.call("POST", &format!("/v1/trips/{}/start", trip_id), Some(driver), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            "POST",
            &format!("/v1/trips/{}/complete", trip_id),
            Some(driver),
            Some(json!({ "latitude": 48.8568, "longitude": 2.3524 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["distance_m"].as_f64().unwrap() > 390_000.0);

    let (status, completed) = app
        .call(
            "POST",
            &format!("/v1/trips/{}/complete", trip_id),
            Some(driver),
            Some(json!({ "latitude": 45.7641, "longitude": 4.8358 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", completed);
    assert_eq!(completed["trip"]["status"], "completed");
    assert_eq!(completed["eco"]["co2_kg"], 139);
    assert_eq!(completed["earnings_cents"], 5000);

    let (status, earnings) = app.call("GET", &format!("/v1/trips/{}/earnings", trip_id), Some(driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(earnings["earnings_cents"], 5000);

    let (status, reviewed) = app
        .call(
            "POST",
            &format!("/v1/bookings/{}/review", booking_id),
            Some(passenger),
            Some(json!({ "rating": 5, "comment": "Smooth ride" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["review"]["rating"], 5);

    let (status, mine) = app.call("GET", "/v1/me/trips", Some(passenger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["past"][0]["role"], "passenger");
    assert_eq!(mine["past"][0]["trip"]["id"], trip["id"]);
}

#[tokio::test]
async fn test_open_without_passengers_cancels_the_trip() {
    let app = test_app();
    let driver = Actor::user(Uuid::new_v4());
    let trip = app.create_trip(driver).await;
    app.clock.set(t0() + Duration::minutes(100));

    let (status, outcome) = app
        .call(
            "POST",
            &format!("/v1/trips/{}/open", trip["id"].as_str().unwrap()),
            Some(driver),
            Some(json!({ "latitude": 48.8566, "longitude": 2.3522 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "auto_cancelled");
    assert_eq!(outcome["trip"]["status"], "cancelled");
}

#[tokio::test]
async fn test_update_and_cancel_booking() {
    let app = test_app();
    let driver = Actor::user(Uuid::new_v4());
    let passenger = Actor::user(Uuid::new_v4());
    let trip = app.create_trip(driver).await;
    let trip_id = trip["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call("PATCH", &format!("/v1/trips/{}", trip_id), Some(driver), Some(json!({ "driver_id": passenger.user_id })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.call("PATCH", &format!("/v1/trips/{}", trip_id), Some(driver), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = app
        .call("PATCH", &format!("/v1/trips/{}", trip_id), Some(driver), Some(json!({ "price_per_seat_cents": 1800 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price_per_seat_cents"], 1800);

    let (_, receipt) = app
        .call("POST", &format!("/v1/trips/{}/bookings", trip_id), Some(passenger), Some(json!({ "seats": 3 })))
        .await;
    let booking_id = receipt["booking"]["id"].as_str().unwrap().to_string();
    let (_, full) = app.call("GET", &format!("/v1/trips/{}", trip_id), Some(passenger), None).await;
    assert_eq!(full["status"], "full");

    let (status, _) = app.call("DELETE", &format!("/v1/trips/{}", trip_id), Some(driver), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, cancelled) = app
        .call("POST", &format!("/v1/bookings/{}/cancel", booking_id), Some(passenger), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, available) = app.call("GET", &format!("/v1/trips/{}", trip_id), Some(driver), None).await;
    assert_eq!(available["status"], "available");
    assert_eq!(available["taken_seats"], 0);

    let (status, _) = app.call("DELETE", &format!("/v1/trips/{}", trip_id), Some(driver), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("GET", &format!("/v1/trips/{}", trip_id), Some(driver), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
