use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dispatch_tracker::api::rest::router;
use dispatch_tracker::config::Config;
use dispatch_tracker::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(Config::default()));
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

struct Scenario {
    order_id: String,
    shopkeeper_id: String,
    customer_id: String,
}

async fn seed_order(app: &axum::Router) -> Scenario {
    let (_, shopkeeper) = send(app, json_request("POST", "/users", json!({ "name": "Meera" }))).await;
    let (_, customer) = send(app, json_request("POST", "/users", json!({ "name": "Arjun" }))).await;
    let shopkeeper_id = shopkeeper["id"].as_str().unwrap().to_string();
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let (status, shop) = send(
        app,
        json_request(
            "POST",
            "/stores",
            json!({
                "owner_user_id": shopkeeper_id,
                "name": "Corner Grocer",
                "address": "1 MG Road",
                "location": { "lat": 12.9716, "lng": 77.5946 }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, order) = send(
        app,
        json_request(
            "POST",
            "/orders",
            json!({
                "store_id": shop["id"],
                "customer_id": customer_id,
                "delivery_address": "42 Koramangala",
                "delivery_location": { "lat": 12.9352, "lng": 77.6245 }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "placed");

    Scenario {
        order_id: order["id"].as_str().unwrap().to_string(),
        shopkeeper_id,
        customer_id,
    }
}

async fn approved_partner(app: &axum::Router, name: &str) -> String {
    let (_, user) = send(app, json_request("POST", "/users", json!({ "name": name }))).await;
    let (status, partner) = send(
        app,
        json_request(
            "POST",
            "/partners",
            json!({
                "user_id": user["id"],
                "name": name,
                "vehicle": { "kind": "scooter" },
                "location": { "lat": 12.9720, "lng": 77.5950 },
                "rating": 4.7
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(partner["approval"], "pending");
    let partner_id = partner["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/partners/{partner_id}/approval"),
            json!({ "approval": "approved" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    partner_id
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
    assert_eq!(body["deliveries"], 0);
    assert_eq!(body["open_offers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_sessions"));
}

#[tokio::test]
async fn fee_quote_follows_tiers() {
    let (app, _state) = setup();

    for (distance, fee) in [(4.2, 30), (12.0, 80), (45.0, 100), (0.0, 30)] {
        let (status, body) = send(&app, get_request(&format!("/quote/fee?distance_km={distance}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fee"], fee, "fee for {distance} km");
    }
}

#[tokio::test]
async fn negative_distance_is_rejected() {
    let (app, _state) = setup();
    let (status, body) = send(&app, get_request("/quote/fee?distance_km=-1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_coordinate");
}

#[tokio::test]
async fn huge_distance_quote_is_rejected() {
    let (app, _state) = setup();
    let (status, body) = send(&app, get_request("/quote/fee?distance_km=1e12")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_coordinate");
}

#[tokio::test]
async fn route_falls_back_without_provider() {
    let (app, _state) = setup();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/routes",
            json!({
                "origin": { "lat": 12.9716, "lng": 77.5946 },
                "destination": { "lat": 12.9352, "lng": 77.6245 }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "fallback");
    assert!(body["distance_km"].as_f64().unwrap() > 4.0);
    assert!(body["duration_seconds"].as_u64().unwrap() > 0);
    assert!(body["map_link"].as_str().unwrap().starts_with("https://"));
    assert!(!body["polyline"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn route_with_invalid_coordinate_is_400() {
    let (app, _state) = setup();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/routes",
            json!({
                "origin": { "lat": 120.0, "lng": 77.5946 },
                "destination": { "lat": 12.9352, "lng": 77.6245 }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_coordinate");
}

#[tokio::test]
async fn register_partner_requires_name() {
    let (app, _state) = setup();
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/partners",
            json!({
                "user_id": "00000000-0000-0000-0000-000000000001",
                "name": "  ",
                "vehicle": { "kind": "bicycle" }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_delivery_returns_404() {
    let (app, _state) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/deliveries/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offer_accept_and_deliver_flow() {
    let (app, state) = setup();
    let scenario = seed_order(&app).await;
    let winner = approved_partner(&app, "Ravi").await;
    let loser = approved_partner(&app, "Sana").await;

    let (status, offer) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{}/offer", scenario.order_id),
            json!({ "actor": { "role": "shopkeeper", "id": scenario.shopkeeper_id } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(offer["delivery"]["status"], "ready_for_pickup");
    assert_eq!(offer["round"], 1);
    assert_eq!(offer["candidates"].as_array().unwrap().len(), 2);
    assert_eq!(offer["delivery"]["fee"], 50);
    let delivery_id = offer["delivery"]["id"].as_str().unwrap().to_string();

    let (status, delivery) = send(
        &app,
        json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/accept"),
            json!({ "partner_id": winner }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivery["status"], "assigned");
    assert_eq!(delivery["partner_id"], winner.as_str());

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/accept"),
            json!({ "partner_id": loser }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_assigned");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/location"),
            json!({ "partner_id": winner, "position": { "lat": 12.968, "lng": 77.60 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/status"),
            json!({ "status": "delivered", "actor": { "role": "partner", "id": winner } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    for next in ["en_route_pickup", "picked_up", "en_route_delivery", "delivered"] {
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/deliveries/{delivery_id}/status"),
                json!({ "status": next, "actor": { "role": "partner", "id": winner } }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "moving to {next}");
        assert_eq!(body["status"], next);
    }

    let (status, timeline) = send(&app, get_request(&format!("/deliveries/{delivery_id}/timeline"))).await;
    assert_eq!(status, StatusCode::OK);
    let events = timeline.as_array().unwrap();
    assert_eq!(events.len(), 6);
    assert_eq!(events[0]["status"], "ready_for_pickup");
    assert_eq!(events[5]["status"], "delivered");
    assert!(events[5]["location"].is_object());

    let (_, order) = send(&app, get_request(&format!("/orders/{}", scenario.order_id))).await;
    assert_eq!(order["status"], "delivered");

    let (_, partners) = send(&app, get_request("/partners")).await;
    let stored = partners
        .as_array()
        .unwrap()
        .iter()
        .find(|partner| partner["id"] == winner.as_str())
        .unwrap();
    assert_eq!(stored["is_available"], true);
    assert_eq!(stored["completed_deliveries"], 1);

    assert_eq!(state.coordinator.open_offer_count(), 0);
}

#[tokio::test]
async fn customer_cannot_mark_ready_but_can_cancel() {
    let (app, _state) = setup();
    let scenario = seed_order(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{}/offer", scenario.order_id),
            json!({ "actor": { "role": "customer", "id": scenario.customer_id } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "unauthorized");

    let (_, offer) = send(
        &app,
        json_request(
            "POST",
            &format!("/orders/{}/offer", scenario.order_id),
            json!({ "actor": { "role": "admin" } }),
        ),
    )
    .await;
    let delivery_id = offer["delivery"]["id"].as_str().unwrap().to_string();
    assert!(offer["candidates"].as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/status"),
            json!({ "status": "cancelled", "actor": { "role": "customer", "id": scenario.customer_id } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (_, order) = send(&app, get_request(&format!("/orders/{}", scenario.order_id))).await;
    assert_eq!(order["status"], "cancelled");
}
