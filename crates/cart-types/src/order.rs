//! Order records and the statuses that drive the fulfillment workflow.
//!
//! Headers and details are written by checkout. The administration side
//! only reads them and moves `order_status` / `payment_status` forward.

use crate::{Entity, StorageKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Include path that eagerly loads [`OrderHeader::customer`].
pub const INCLUDE_CUSTOMER: &str = "customer";

/// Fulfillment status of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
	/// Order was placed and is awaiting payment.
	#[default]
	Pending,
	/// Payment went through; the order can be picked.
	Approved,
	/// Order is being picked and packed.
	Processing,
	/// Order left the warehouse.
	Shipped,
	/// Order was cancelled by an administrator.
	Cancelled,
	/// Order was refunded.
	Refunded,
	/// Payment was declined at checkout.
	Declined,
}

impl OrderStatus {
	/// Returns the display name used by the admin UI.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "Pending",
			OrderStatus::Approved => "Approved",
			OrderStatus::Processing => "Processing",
			OrderStatus::Shipped => "Shipped",
			OrderStatus::Cancelled => "Cancelled",
			OrderStatus::Refunded => "Refunded",
			OrderStatus::Declined => "Declined",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Payment status of an order, independent of [`OrderStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentStatus {
	#[default]
	Pending,
	/// Payment was captured by the provider.
	Approved,
	/// Company account approved for payment after delivery.
	DelayedPayment,
	Declined,
	/// Captured payment was returned to the customer.
	Refunded,
}

impl PaymentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			PaymentStatus::Pending => "Pending",
			PaymentStatus::Approved => "Approved",
			PaymentStatus::DelayedPayment => "ApprovedForDelayedPayment",
			PaymentStatus::Declined => "Declined",
			PaymentStatus::Refunded => "Refunded",
		}
	}
}

impl fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Customer account referenced by an order header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
	pub id: String,
	pub name: String,
	pub email: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone: Option<String>,
}

/// One order as placed by checkout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHeader {
	pub id: i32,
	/// Foreign key into the customer collection.
	pub customer_ref: String,
	pub order_date: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub shipping_date: Option<DateTime<Utc>>,
	#[serde(default)]
	pub order_total: f64,
	#[serde(default)]
	pub order_status: OrderStatus,
	#[serde(default)]
	pub payment_status: PaymentStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub carrier: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tracking_number: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	/// Provider reference of the captured payment, needed for refunds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payment_intent_id: Option<String>,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub phone: String,
	#[serde(default)]
	pub address: String,
	#[serde(default)]
	pub city: String,
	#[serde(default)]
	pub state: String,
	#[serde(default)]
	pub postal_code: String,
	/// Populated only when fetched with [`INCLUDE_CUSTOMER`]; never persisted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer: Option<Customer>,
}

impl Entity for OrderHeader {
	const KEY: StorageKey = StorageKey::OrderHeaders;

	fn id(&self) -> i32 {
		self.id
	}

	fn detach_navigation(&mut self) {
		self.customer = None;
	}
}

/// A single line item of an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
	pub id: i32,
	pub order_header_id: i32,
	#[serde(default)]
	pub product_id: i32,
	#[serde(default)]
	pub count: i32,
	#[serde(default)]
	pub price: f64,
}

impl Entity for OrderDetail {
	const KEY: StorageKey = StorageKey::OrderDetails;

	fn id(&self) -> i32 {
		self.id
	}
}

/// Transition an administrator may trigger on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderAction {
	/// Start processing.
	Process,
	/// Hand over to a carrier.
	Ship,
	/// Cancel, refunding a captured payment.
	Cancel,
}

/// Shipment data entered by an administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentVM {
	#[validate(length(min = 1, message = "Carrier is required"))]
	pub carrier: String,
	#[validate(length(min = 1, message = "Tracking number is required"))]
	pub tracking_number: String,
}

/// Order header with its line items, as shown on the order page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailsVM {
	pub order_header: OrderHeader,
	pub order_details: Vec<OrderDetail>,
	pub available_actions: Vec<OrderAction>,
}
