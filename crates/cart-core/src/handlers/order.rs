//! Order operations exposed to the admin UI.
//!
//! Transitions are delegated to the [`OrderStateMachine`]; this handler
//! adds the validation gate and the read side.

use crate::error::AdminError;
use crate::state::OrderStateMachine;
use crate::validation::ensure_valid;
use cart_payment::RefundService;
use cart_storage::{Filter, UnitOfWork};
use cart_types::{ModelState, OrderDetailsVM, OrderHeader, ShipmentVM, INCLUDE_CUSTOMER};
use std::sync::Arc;
use tracing::instrument;

pub struct OrderHandler {
	uow: Arc<dyn UnitOfWork>,
	state_machine: OrderStateMachine,
}

impl OrderHandler {
	pub fn new(uow: Arc<dyn UnitOfWork>, refunds: Arc<RefundService>) -> Self {
		Self {
			state_machine: OrderStateMachine::new(uow.clone(), refunds),
			uow,
		}
	}

	pub async fn set_to_in_process(&self, order_id: i32) -> Result<(), AdminError> {
		self.state_machine.mark_in_process(order_id).await
	}

	pub async fn set_to_shipped(
		&self,
		model_state: &ModelState,
		order_id: i32,
		shipment: ShipmentVM,
	) -> Result<OrderHeader, AdminError> {
		ensure_valid(model_state)?;
		self.state_machine.mark_shipped(order_id, shipment).await
	}

	pub async fn set_to_cancel_order(&self, order_id: i32) -> Result<(), AdminError> {
		self.state_machine.cancel(order_id).await
	}

	/// Header with its customer and line items, plus the transitions the
	/// current status offers.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn order_details(&self, order_id: i32) -> Result<OrderDetailsVM, AdminError> {
		let order_header = self
			.uow
			.order_header()
			.get_one(&Filter::by_id(order_id), Some(INCLUDE_CUSTOMER))
			.await?
			.ok_or_else(|| AdminError::NotFound("Order not found".to_string()))?;

		let order_details = self
			.uow
			.order_detail()
			.get_all(None)
			.await?
			.into_iter()
			.filter(|detail| detail.order_header_id == order_id)
			.collect::<Vec<_>>();

		tracing::debug!(lines = order_details.len(), "Loaded order details");

		Ok(OrderDetailsVM {
			available_actions: OrderStateMachine::available_actions(order_header.order_status),
			order_header,
			order_details,
		})
	}
}
