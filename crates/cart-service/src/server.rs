//! HTTP server for the cart admin API.
//!
//! All routes live under `/api` and speak JSON. Errors use the shared
//! `ErrorResponse` body.

use axum::{
	extract::{DefaultBodyLimit, Path, State},
	http::{HeaderValue, StatusCode},
	response::Json,
	routing::{get, post},
	Router,
};
use cart_config::{ApiConfig, CorsConfig};
use cart_core::AdminEngine;
use cart_types::{
	APIError, CategoriesVM, Category, CategoryVM, OrderDetailsVM, OrderHeader, ShipmentVM,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::apis;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<AdminEngine>,
}

/// Builds the router with its middleware stack.
pub fn router(engine: Arc<AdminEngine>, api_config: &ApiConfig) -> Router {
	let app_state = AppState { engine };

	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/health", get(handle_health))
				.route(
					"/categories",
					get(handle_list_categories).post(handle_upsert_category),
				)
				.route(
					"/categories/{id}",
					get(handle_get_category).delete(handle_delete_category),
				)
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/process", post(handle_process_order))
				.route("/orders/{id}/ship", post(handle_ship_order))
				.route("/orders/{id}/cancel", post(handle_cancel_order)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(app_state)
}

fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};
	if cors.allowed_origins.iter().any(|origin| origin == "*") {
		return CorsLayer::permissive();
	}

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!("Ignoring invalid CORS origin: {}", origin);
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_methods(Any)
		.allow_headers(Any)
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<AdminEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Cart admin API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles GET /api/health requests.
async fn handle_health(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"status": "ok",
		"service": state.engine.config().service.id,
	}))
}

/// Handles GET /api/categories requests.
async fn handle_list_categories(
	State(state): State<AppState>,
) -> Result<Json<CategoriesVM>, APIError> {
	apis::category::list_categories(&state.engine).await.map(Json)
}

/// Handles GET /api/categories/{id} requests.
async fn handle_get_category(
	Path(id): Path<i32>,
	State(state): State<AppState>,
) -> Result<Json<Option<Category>>, APIError> {
	apis::category::get_category(&state.engine, id)
		.await
		.map(Json)
}

/// Handles POST /api/categories requests. An id of zero creates.
async fn handle_upsert_category(
	State(state): State<AppState>,
	Json(vm): Json<CategoryVM>,
) -> Result<StatusCode, APIError> {
	apis::category::upsert_category(&state.engine, vm).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// Handles DELETE /api/categories/{id} requests.
async fn handle_delete_category(
	Path(id): Path<i32>,
	State(state): State<AppState>,
) -> Result<StatusCode, APIError> {
	apis::category::delete_category(&state.engine, id).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<i32>,
	State(state): State<AppState>,
) -> Result<Json<OrderDetailsVM>, APIError> {
	apis::order::get_order(&state.engine, id).await.map(Json)
}

/// Handles POST /api/orders/{id}/process requests.
async fn handle_process_order(
	Path(id): Path<i32>,
	State(state): State<AppState>,
) -> Result<StatusCode, APIError> {
	apis::order::process_order(&state.engine, id).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// Handles POST /api/orders/{id}/ship requests.
async fn handle_ship_order(
	Path(id): Path<i32>,
	State(state): State<AppState>,
	Json(shipment): Json<ShipmentVM>,
) -> Result<Json<OrderHeader>, APIError> {
	apis::order::ship_order(&state.engine, id, shipment)
		.await
		.map(Json)
}

/// Handles POST /api/orders/{id}/cancel requests.
async fn handle_cancel_order(
	Path(id): Path<i32>,
	State(state): State<AppState>,
) -> Result<StatusCode, APIError> {
	apis::order::cancel_order(&state.engine, id).await?;
	Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::{to_bytes, Body};
	use axum::http::Request;
	use cart_config::builders::ConfigBuilder;
	use cart_core::{AdminBuilder, AdminFactories};
	use cart_types::{OrderStatus, PaymentStatus};
	use tower::ServiceExt;

	fn api_config() -> ApiConfig {
		ApiConfig {
			enabled: true,
			host: "127.0.0.1".to_string(),
			port: 5000,
			timeout_seconds: 5,
			max_request_size: 64 * 1024,
			cors: None,
		}
	}

	async fn app() -> (Router, Arc<AdminEngine>) {
		let engine = AdminBuilder::new(ConfigBuilder::new().build())
			.build(AdminFactories::with_all_implementations())
			.await
			.unwrap();
		let engine = Arc::new(engine);
		(router(engine.clone(), &api_config()), engine)
	}

	async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let request = Request::builder()
			.method(method)
			.uri(uri)
			.header("content-type", "application/json")
			.body(match body {
				Some(body) => Body::from(body.to_string()),
				None => Body::empty(),
			})
			.unwrap();

		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	#[tokio::test]
	async fn test_health() {
		let (app, _) = app().await;
		let (status, body) = send(&app, "GET", "/api/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["service"], "test-cart-admin");
	}

	#[tokio::test]
	async fn test_category_endpoints() {
		let (app, _) = app().await;

		let (status, _) = send(
			&app,
			"POST",
			"/api/categories",
			Some(json!({ "category": { "id": 0, "name": "Books" } })),
		)
		.await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, body) = send(&app, "GET", "/api/categories", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["categories"][0]["name"], "Books");

		let (status, body) = send(&app, "GET", "/api/categories/99", None).await;
		assert_eq!(status, StatusCode::OK);
		assert!(body.is_null());

		let (status, _) = send(&app, "DELETE", "/api/categories/1", None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, body) = send(&app, "DELETE", "/api/categories/1", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["message"], "Category not found");
	}

	#[tokio::test]
	async fn test_invalid_category_is_bad_request() {
		let (app, _) = app().await;
		let (status, body) = send(
			&app,
			"POST",
			"/api/categories",
			Some(json!({ "category": { "name": "" } })),
		)
		.await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Model is invalid");
		assert!(body["details"]["category.name"].is_array());
	}

	#[tokio::test]
	async fn test_order_endpoints() {
		let (app, engine) = app().await;
		let header = OrderHeader {
			id: 1,
			customer_ref: "cust-1".to_string(),
			order_status: OrderStatus::Approved,
			payment_status: PaymentStatus::Approved,
			payment_intent_id: Some("pi_1".to_string()),
			..Default::default()
		};
		engine
			.storage()
			.store("order_headers", "1", &header)
			.await
			.unwrap();

		let (status, body) = send(&app, "GET", "/api/orders/1", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["availableActions"], json!(["process", "cancel"]));

		let (status, _) = send(&app, "POST", "/api/orders/1/process", None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, body) = send(
			&app,
			"POST",
			"/api/orders/1/ship",
			Some(json!({ "carrier": "", "trackingNumber": "" })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert!(body["details"]["carrier"].is_array());

		let (status, body) = send(
			&app,
			"POST",
			"/api/orders/1/ship",
			Some(json!({ "carrier": "UPS", "trackingNumber": "1Z" })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["orderStatus"], "shipped");

		let (status, _) = send(&app, "POST", "/api/orders/1/cancel", None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, body) = send(&app, "GET", "/api/orders/2", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["message"], "Order not found");
	}
}
