//! Order endpoints.

use super::api_error;
use cart_core::AdminEngine;
use cart_types::{APIError, ModelState, OrderDetailsVM, OrderHeader, ShipmentVM};
use tracing::warn;

pub async fn get_order(engine: &AdminEngine, order_id: i32) -> Result<OrderDetailsVM, APIError> {
	engine
		.orders()
		.order_details(order_id)
		.await
		.map_err(|e| api_error(e, None))
}

pub async fn process_order(engine: &AdminEngine, order_id: i32) -> Result<(), APIError> {
	engine
		.orders()
		.set_to_in_process(order_id)
		.await
		.map_err(|e| {
			warn!(order_id, "Processing failed: {}", e);
			api_error(e, None)
		})
}

pub async fn ship_order(
	engine: &AdminEngine,
	order_id: i32,
	shipment: ShipmentVM,
) -> Result<OrderHeader, APIError> {
	let model_state = ModelState::from_model(&shipment);
	engine
		.orders()
		.set_to_shipped(&model_state, order_id, shipment)
		.await
		.map_err(|e| {
			warn!(order_id, "Shipping failed: {}", e);
			api_error(e, Some(&model_state))
		})
}

pub async fn cancel_order(engine: &AdminEngine, order_id: i32) -> Result<(), APIError> {
	engine
		.orders()
		.set_to_cancel_order(order_id)
		.await
		.map_err(|e| {
			warn!(order_id, "Cancellation failed: {}", e);
			api_error(e, None)
		})
}
