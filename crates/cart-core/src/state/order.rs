//! Order state machine.
//!
//! Three transitions move an order through fulfillment: processing,
//! shipping and cancellation. Each one stages its writes on the unit of
//! work and commits exactly once. Cancelling a captured payment refunds it
//! first; a failed refund leaves the order untouched. The refund is keyed
//! by order, so retrying a cancellation whose commit failed does not
//! refund the payment again.

use crate::error::AdminError;
use cart_payment::{RefundRequest, RefundService};
use cart_storage::{Filter, UnitOfWork};
use cart_types::{OrderAction, OrderHeader, OrderStatus, PaymentStatus, ShipmentVM};
use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

const ORDER_NOT_FOUND: &str = "Order not found";

/// Idempotency key shared by every refund attempt for one order.
fn refund_key(order_id: i32) -> String {
	format!("refund-order-{}", order_id)
}

/// Drives status transitions of order headers.
pub struct OrderStateMachine {
	uow: Arc<dyn UnitOfWork>,
	refunds: Arc<RefundService>,
}

impl OrderStateMachine {
	pub fn new(uow: Arc<dyn UnitOfWork>, refunds: Arc<RefundService>) -> Self {
		Self { uow, refunds }
	}

	/// Moves the order to `Processing` with a status-only write.
	///
	/// Allowed from any status, so repeating it is harmless.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn mark_in_process(&self, order_id: i32) -> Result<(), AdminError> {
		self.uow
			.order_header()
			.update_status(order_id, OrderStatus::Processing, None)?;
		self.uow.save().await?;

		tracing::info!(order_id, status = %OrderStatus::Processing, "Order status updated");
		Ok(())
	}

	/// Records the shipment and moves the order to `Shipped` in one update.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn mark_shipped(
		&self,
		order_id: i32,
		shipment: ShipmentVM,
	) -> Result<OrderHeader, AdminError> {
		let mut header = self.load(order_id).await?;

		header.carrier = Some(shipment.carrier);
		header.tracking_number = Some(shipment.tracking_number);
		header.order_status = OrderStatus::Shipped;
		header.shipping_date = Some(Utc::now());

		self.uow.order_header().update(header.clone())?;
		self.uow.save().await?;

		tracing::info!(
			order_id,
			carrier = header.carrier.as_deref().unwrap_or_default(),
			status = %OrderStatus::Shipped,
			"Order shipped"
		);
		Ok(header)
	}

	/// Cancels the order, refunding a captured payment first.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn cancel(&self, order_id: i32) -> Result<(), AdminError> {
		let header = self.load(order_id).await?;

		let payment_status = if header.payment_status == PaymentStatus::Approved {
			let payment_intent_id = header.payment_intent_id.as_deref().ok_or_else(|| {
				tracing::error!(order_id, "Captured order has no payment intent");
				AdminError::ExternalService(format!(
					"Order {} has no payment intent to refund",
					order_id
				))
			})?;

			let request = RefundRequest::requested_by_customer(payment_intent_id)
				.with_idempotency_key(refund_key(order_id));
			let refund = self
				.refunds
				.create_refund(&request)
				.await
				.map_err(|e| {
					tracing::error!(order_id, error = %e, "Refund failed, order left unchanged");
					AdminError::from(e)
				})?;
			tracing::info!(order_id, refund_id = %refund.refund_id, "Payment refunded");
			Some(PaymentStatus::Refunded)
		} else {
			None
		};

		self.uow
			.order_header()
			.update_status(order_id, OrderStatus::Cancelled, payment_status)?;
		self.uow.save().await?;

		tracing::info!(order_id, status = %OrderStatus::Cancelled, "Order cancelled");
		Ok(())
	}

	async fn load(&self, order_id: i32) -> Result<OrderHeader, AdminError> {
		self.uow
			.order_header()
			.get_one(&Filter::by_id(order_id), None)
			.await?
			.ok_or_else(|| AdminError::NotFound(ORDER_NOT_FOUND.to_string()))
	}

	/// Transitions offered for an order in `status`.
	///
	/// Only a hint for the presentation layer; the transitions themselves
	/// do not consult it.
	pub fn available_actions(status: OrderStatus) -> Vec<OrderAction> {
		static ACTIONS: Lazy<HashMap<OrderStatus, Vec<OrderAction>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(OrderStatus::Pending, vec![OrderAction::Cancel]);
			m.insert(
				OrderStatus::Approved,
				vec![OrderAction::Process, OrderAction::Cancel],
			);
			m.insert(
				OrderStatus::Processing,
				vec![OrderAction::Ship, OrderAction::Cancel],
			);
			m.insert(OrderStatus::Declined, vec![OrderAction::Cancel]);
			m.insert(OrderStatus::Shipped, vec![]); // terminal
			m.insert(OrderStatus::Cancelled, vec![]); // terminal
			m.insert(OrderStatus::Refunded, vec![]); // terminal
			m
		});

		ACTIONS.get(&status).cloned().unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mocks::{refund_ok, unit_of_work, MockHeaderRepo, MockRefundProvider, MockUow};
	use cart_payment::implementations::mock::{MockRefundConfig, MockRefundProvider as LedgerProvider};
	use cart_payment::{RefundError, RefundReason};
	use cart_storage::{OrderHeaderRepository, StorageError};
	use mockall::{predicate::eq, Sequence};
	use std::time::Duration;

	fn header(id: i32, payment_status: PaymentStatus) -> OrderHeader {
		OrderHeader {
			id,
			customer_ref: "cust-1".to_string(),
			order_status: OrderStatus::Approved,
			payment_status,
			payment_intent_id: Some("pi_123".to_string()),
			..Default::default()
		}
	}

	fn machine(uow: impl UnitOfWork + 'static, refunds: MockRefundProvider) -> OrderStateMachine {
		OrderStateMachine::new(
			Arc::new(uow),
			Arc::new(RefundService::new(Arc::new(refunds), Duration::from_secs(1))),
		)
	}

	fn no_refunds() -> MockRefundProvider {
		let mut refunds = MockRefundProvider::new();
		refunds.expect_create_refund().never();
		refunds
	}

	#[tokio::test]
	async fn test_in_process_is_status_only_write() {
		let mut headers = MockHeaderRepo::new();
		headers
			.expect_update_status()
			.with(eq(5), eq(OrderStatus::Processing), eq(None))
			.times(1)
			.returning(|_, _, _| Ok(()));
		headers.expect_update().never();
		headers.expect_get_one().never();

		let sm = machine(unit_of_work(None, Some(headers), None, 1), no_refunds());
		sm.mark_in_process(5).await.unwrap();
	}

	#[tokio::test]
	async fn test_in_process_twice_is_idempotent() {
		let mut headers = MockHeaderRepo::new();
		headers
			.expect_update_status()
			.with(eq(5), eq(OrderStatus::Processing), eq(None))
			.times(2)
			.returning(|_, _, _| Ok(()));

		let sm = machine(unit_of_work(None, Some(headers), None, 2), no_refunds());
		sm.mark_in_process(5).await.unwrap();
		sm.mark_in_process(5).await.unwrap();
	}

	#[tokio::test]
	async fn test_shipped_writes_fields_together() {
		let mut headers = MockHeaderRepo::new();
		headers
			.expect_get_one()
			.withf(|filter, include| filter.description() == "id == 7" && include.is_none())
			.times(1)
			.returning(|_, _| Ok(Some(header(7, PaymentStatus::Approved))));
		headers
			.expect_update()
			.withf(|h| {
				h.id == 7 &&
					h.carrier.as_deref() == Some("UPS") &&
					h.tracking_number.as_deref() == Some("1Z999") &&
					h.order_status == OrderStatus::Shipped &&
					h.shipping_date.is_some()
			})
			.times(1)
			.returning(|_| Ok(()));
		headers.expect_update_status().never();

		let sm = machine(unit_of_work(None, Some(headers), None, 1), no_refunds());
		let shipped = sm
			.mark_shipped(
				7,
				ShipmentVM {
					carrier: "UPS".to_string(),
					tracking_number: "1Z999".to_string(),
				},
			)
			.await
			.unwrap();
		assert_eq!(shipped.order_status, OrderStatus::Shipped);
	}

	#[tokio::test]
	async fn test_shipped_missing_order_is_not_found() {
		let mut headers = MockHeaderRepo::new();
		headers.expect_get_one().returning(|_, _| Ok(None));
		headers.expect_update().never();

		let sm = machine(unit_of_work(None, Some(headers), None, 0), no_refunds());
		let result = sm
			.mark_shipped(
				9,
				ShipmentVM {
					carrier: "UPS".to_string(),
					tracking_number: "1Z".to_string(),
				},
			)
			.await;
		assert!(matches!(result, Err(AdminError::NotFound(msg)) if msg == "Order not found"));
	}

	#[tokio::test]
	async fn test_cancel_approved_refunds_before_status_write() {
		let mut seq = Sequence::new();

		let mut refunds = MockRefundProvider::new();
		refunds
			.expect_create_refund()
			.withf(|request| {
				request.payment_intent_id == "pi_123" &&
					request.reason == RefundReason::RequestedByCustomer &&
					request.idempotency_key.as_deref() == Some("refund-order-1")
			})
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_| Ok(refund_ok()));

		let mut headers = MockHeaderRepo::new();
		headers
			.expect_get_one()
			.returning(|_, _| Ok(Some(header(1, PaymentStatus::Approved))));
		headers
			.expect_update_status()
			.with(
				eq(1),
				eq(OrderStatus::Cancelled),
				eq(Some(PaymentStatus::Refunded)),
			)
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_, _, _| Ok(()));

		let sm = machine(unit_of_work(None, Some(headers), None, 1), refunds);
		sm.cancel(1).await.unwrap();
	}

	#[tokio::test]
	async fn test_retry_after_failed_commit_does_not_refund_twice() {
		let mut headers = MockHeaderRepo::new();
		// Nothing was committed, so the order still reads as captured
		headers
			.expect_get_one()
			.times(2)
			.returning(|_, _| Ok(Some(header(1, PaymentStatus::Approved))));
		headers
			.expect_update_status()
			.with(
				eq(1),
				eq(OrderStatus::Cancelled),
				eq(Some(PaymentStatus::Refunded)),
			)
			.times(2)
			.returning(|_, _, _| Ok(()));
		let headers: Arc<dyn OrderHeaderRepository> = Arc::new(headers);

		let mut uow = MockUow::new();
		uow.expect_order_header().returning(move || headers.clone());
		let mut seq = Sequence::new();
		uow.expect_save()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|| Err(StorageError::Backend("disk full".into())));
		uow.expect_save()
			.times(1)
			.in_sequence(&mut seq)
			.returning(|| Ok(()));

		let provider = Arc::new(LedgerProvider::new(MockRefundConfig::default()));
		let sm = OrderStateMachine::new(
			Arc::new(uow),
			Arc::new(RefundService::new(provider.clone(), Duration::from_secs(1))),
		);

		let first = sm.cancel(1).await;
		assert!(matches!(first, Err(AdminError::Persistence(msg)) if msg.contains("disk full")));
		sm.cancel(1).await.unwrap();

		let requests = provider.requests().await;
		assert_eq!(requests.len(), 2);
		assert!(requests
			.iter()
			.all(|r| r.idempotency_key.as_deref() == Some("refund-order-1")));
		assert_eq!(provider.refunds_issued().await, 1);
	}

	#[tokio::test]
	async fn test_cancel_not_approved_skips_refund() {
		let mut headers = MockHeaderRepo::new();
		headers
			.expect_get_one()
			.returning(|_, _| Ok(Some(header(2, PaymentStatus::Declined))));
		headers
			.expect_update_status()
			.with(eq(2), eq(OrderStatus::Cancelled), eq(None))
			.times(1)
			.returning(|_, _, _| Ok(()));

		let sm = machine(unit_of_work(None, Some(headers), None, 1), no_refunds());
		sm.cancel(2).await.unwrap();
	}

	#[tokio::test]
	async fn test_failed_refund_leaves_order_unchanged() {
		let mut refunds = MockRefundProvider::new();
		refunds
			.expect_create_refund()
			.times(1)
			.returning(|_| Err(RefundError::Provider("card_declined".to_string())));

		let mut headers = MockHeaderRepo::new();
		headers
			.expect_get_one()
			.returning(|_, _| Ok(Some(header(1, PaymentStatus::Approved))));
		headers.expect_update_status().never();

		let sm = machine(unit_of_work(None, Some(headers), None, 0), refunds);
		let result = sm.cancel(1).await;
		assert!(matches!(result, Err(AdminError::ExternalService(msg)) if msg.contains("card_declined")));
	}

	#[tokio::test]
	async fn test_cancel_missing_order_is_not_found() {
		let mut headers = MockHeaderRepo::new();
		headers.expect_get_one().returning(|_, _| Ok(None));
		headers.expect_update_status().never();

		let sm = machine(unit_of_work(None, Some(headers), None, 0), no_refunds());
		assert!(matches!(sm.cancel(3).await, Err(AdminError::NotFound(_))));
	}

	#[tokio::test]
	async fn test_approved_without_payment_intent_is_rejected() {
		let mut headers = MockHeaderRepo::new();
		headers.expect_get_one().returning(|_, _| {
			Ok(Some(OrderHeader {
				payment_intent_id: None,
				..header(4, PaymentStatus::Approved)
			}))
		});
		headers.expect_update_status().never();

		let sm = machine(unit_of_work(None, Some(headers), None, 0), no_refunds());
		assert!(matches!(
			sm.cancel(4).await,
			Err(AdminError::ExternalService(_))
		));
	}

	#[test]
	fn test_available_actions() {
		assert_eq!(
			OrderStateMachine::available_actions(OrderStatus::Approved),
			vec![OrderAction::Process, OrderAction::Cancel]
		);
		assert_eq!(
			OrderStateMachine::available_actions(OrderStatus::Processing),
			vec![OrderAction::Ship, OrderAction::Cancel]
		);
		assert!(OrderStateMachine::available_actions(OrderStatus::Shipped).is_empty());
		assert!(OrderStateMachine::available_actions(OrderStatus::Refunded).is_empty());
	}
}
