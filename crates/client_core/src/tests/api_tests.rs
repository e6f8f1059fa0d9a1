use super::*;
use crate::controller::{ControllerEvent, ViewController, ViewState};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct OrderServiceState {
    requests: Arc<Mutex<Vec<String>>>,
    placed_orders: Arc<Mutex<Vec<Value>>>,
}

impl OrderServiceState {
    async fn log(&self, line: String) {
        self.requests.lock().await.push(line);
    }

    async fn requests_matching(&self, line: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|logged| logged.as_str() == line)
            .count()
    }
}

fn menu_json() -> Value {
    json!([
        {"id": "latte", "name": "Caffe Latte", "price": 4.25, "description": "Rich espresso with steamed milk.", "image_url": "https://images.example.test/latte.jpg"},
        {"id": "frappuccino", "name": "Mocha Frappuccino", "price": 5.25, "description": "Blended with ice.", "image_url": "https://images.example.test/mocha.jpg"}
    ])
}

async fn handle_menu(State(state): State<OrderServiceState>) -> Json<Value> {
    state.log("GET /menu".to_string()).await;
    Json(menu_json())
}

async fn handle_orders(
    State(state): State<OrderServiceState>,
    Path(email): Path<String>,
) -> Json<Value> {
    state.log(format!("GET /orders/{email}")).await;
    let placed = state.placed_orders.lock().await;
    let history: Vec<Value> = placed
        .iter()
        .filter(|order| order["email"] == email.as_str())
        .map(|order| {
            let mut order = order.clone();
            order["timestamp"] = json!("2024-01-05T09:30:00.123456");
            order
        })
        .collect();
    Json(Value::Array(history))
}

async fn handle_login(
    State(state): State<OrderServiceState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let email = params.get("email").cloned().unwrap_or_default();
    let passcode = params.get("passcode").cloned().unwrap_or_default();
    state.log(format!("POST /login {email}")).await;

    match (email.as_str(), passcode.as_str()) {
        ("a@b.com", "1234") => (
            StatusCode::OK,
            Json(json!({"message": "Login successful", "email": "a@b.com", "name": "Ann"})),
        ),
        ("", _) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": [{"loc": ["query", "email"], "msg": "field required"}]})),
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid passcode"})),
        ),
    }
}

async fn handle_register(
    State(state): State<OrderServiceState>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.log("POST /register".to_string()).await;
    if body["email"] == "taken@b.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Email taken"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"message": "User created successfully"})),
    )
}

async fn handle_place_order(
    State(state): State<OrderServiceState>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.log("POST /orders".to_string()).await;
    state.placed_orders.lock().await.push(body);
    Json(json!({"message": "Order placed successfully"}))
}

async fn spawn_order_service() -> Result<(String, OrderServiceState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = OrderServiceState::default();
    let app = Router::new()
        .route("/menu", get(handle_menu))
        .route("/orders/:email", get(handle_orders))
        .route("/orders", post(handle_place_order))
        .route("/login", post(handle_login))
        .route("/register", post(handle_register))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

async fn unreachable_base_url() -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

fn connect(base_url: &str) -> Arc<ViewController> {
    let service = HttpOrderService::new(base_url, DEFAULT_REQUEST_TIMEOUT).expect("service");
    ViewController::new(Arc::new(service))
}

#[test]
fn endpoints_extend_the_base_path() {
    let service =
        HttpOrderService::new("http://orders.example.test/api/", DEFAULT_REQUEST_TIMEOUT)
            .expect("service");
    assert_eq!(
        service.endpoint(&["orders", "a@b.com"]).as_str(),
        "http://orders.example.test/api/orders/a@b.com"
    );

    let service = HttpOrderService::new("http://localhost:8001", DEFAULT_REQUEST_TIMEOUT)
        .expect("service");
    assert_eq!(
        service.endpoint(&["menu"]).as_str(),
        "http://localhost:8001/menu"
    );
}

#[test]
fn email_path_segment_is_escaped() {
    let service = HttpOrderService::new("http://localhost:8001", DEFAULT_REQUEST_TIMEOUT)
        .expect("service");
    assert_eq!(
        service.endpoint(&["orders", "a b/c@d.com"]).as_str(),
        "http://localhost:8001/orders/a%20b%2Fc@d.com"
    );
}

#[test]
fn rejects_unusable_base_urls() {
    for raw in ["not a url", "mailto:orders@example.test", "ftp://example.test"] {
        let err = HttpOrderService::new(raw, DEFAULT_REQUEST_TIMEOUT)
            .err()
            .unwrap_or_else(|| panic!("{raw} must be rejected"));
        assert!(
            matches!(err, OrderServiceError::InvalidBaseUrl { .. }),
            "unexpected error for {raw}: {err}"
        );
    }
}

#[tokio::test]
async fn fetch_menu_parses_products() {
    let (server_url, _state) = spawn_order_service().await.expect("spawn server");
    let service = HttpOrderService::new(&server_url, DEFAULT_REQUEST_TIMEOUT).expect("service");

    let menu = service.fetch_menu().await.expect("menu");

    assert_eq!(menu.len(), 2);
    assert_eq!(menu[0].id.0, "latte");
    assert_eq!(menu[0].price, Decimal::new(425, 2));
    assert_eq!(menu[1].display_price(), "$5.25");
}

#[tokio::test]
async fn error_status_carries_server_detail() {
    let (server_url, _state) = spawn_order_service().await.expect("spawn server");
    let service = HttpOrderService::new(&server_url, DEFAULT_REQUEST_TIMEOUT).expect("service");

    let err = service
        .login("a@b.com", "0000")
        .await
        .expect_err("wrong passcode");
    match &err {
        OrderServiceError::Status { status, detail } => {
            assert_eq!(*status, 401);
            assert_eq!(detail.as_deref(), Some("Invalid passcode"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.detail(), Some("Invalid passcode"));
}

#[tokio::test]
async fn login_scenario_switches_to_menu_and_fetches_history_once() {
    let (server_url, state) = spawn_order_service().await.expect("spawn server");
    let controller = connect(&server_url);

    controller.login("a@b.com", "1234").await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.view, ViewState::Menu);
    let session = snapshot.session.expect("session");
    assert_eq!(session.email, "a@b.com");
    assert_eq!(session.name, "Ann");
    assert_eq!(state.requests_matching("GET /orders/a@b.com").await, 1);
}

#[tokio::test]
async fn validation_errors_fall_back_to_generic_login_message() {
    let (server_url, _state) = spawn_order_service().await.expect("spawn server");
    let controller = connect(&server_url);

    controller.login("", "1234").await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.error.as_deref(), Some("Login failed"));
    assert!(snapshot.session.is_none());
}

#[tokio::test]
async fn signup_scenario_shows_email_taken() {
    let (server_url, state) = spawn_order_service().await.expect("spawn server");
    let controller = connect(&server_url);
    controller.toggle_auth_view().await.expect("signup view");

    controller.signup("taken@b.com", "Ann", "1234").await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.error.as_deref(), Some("Email taken"));
    assert_eq!(snapshot.view, ViewState::Signup);
    assert_eq!(state.requests_matching("POST /register").await, 1);
}

#[tokio::test]
async fn placed_order_is_posted_and_history_reloaded() {
    let (server_url, state) = spawn_order_service().await.expect("spawn server");
    let controller = connect(&server_url);
    controller.load_menu().await;
    controller.login("a@b.com", "1234").await;

    let latte = controller.snapshot().await.menu[0].clone();
    controller.place_order(&latte).await;

    let posted = state.placed_orders.lock().await.clone();
    assert_eq!(posted.len(), 1);
    let body = &posted[0];
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["total_price"].as_f64(), Some(4.25));
    assert_eq!(body["items"][0]["product_id"], "latte");
    assert_eq!(body["items"][0]["name"], "Caffe Latte");
    assert_eq!(body["items"][0]["quantity"], 1);
    assert_eq!(body["items"][0]["price"].as_f64(), Some(4.25));

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.orders.len(), 1);
    assert_eq!(snapshot.orders[0].total_price, latte.price);
    assert_eq!(snapshot.orders[0].items[0].quantity, 1);
    assert_eq!(state.requests_matching("GET /orders/a@b.com").await, 2);
}

#[tokio::test]
async fn menu_network_failure_leaves_menu_empty_without_error() {
    let base_url = unreachable_base_url().await.expect("free port");
    let controller = connect(&base_url);
    let mut rx = controller.subscribe_events();

    controller.load_menu().await;

    let snapshot = controller.snapshot().await;
    assert!(snapshot.menu.is_empty());
    assert!(snapshot.error.is_none());
    assert!(matches!(
        rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn login_network_failure_uses_generic_message() {
    let base_url = unreachable_base_url().await.expect("free port");
    let controller = connect(&base_url);

    controller.login("a@b.com", "1234").await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.error.as_deref(), Some("Login failed"));
    assert_eq!(snapshot.view, ViewState::Login);
}

#[tokio::test]
async fn successful_signup_emits_notice() {
    let (server_url, _state) = spawn_order_service().await.expect("spawn server");
    let controller = connect(&server_url);
    controller.toggle_auth_view().await.expect("signup view");
    let mut rx = controller.subscribe_events();

    controller.signup("new@b.com", "Ned", "1234").await;

    assert_eq!(
        rx.recv().await.expect("event"),
        ControllerEvent::Notice("Profile created! Please login.".to_string())
    );
    assert_eq!(controller.snapshot().await.view, ViewState::Login);
}
