//! Mocks of the persistence and payment seams.

use async_trait::async_trait;
use cart_payment::{RefundError, RefundInterface, RefundRequest, RefundResult};
use cart_storage::{Filter, OrderHeaderRepository, Repository, StorageError, UnitOfWork};
use cart_types::{
	Category, ConfigSchema, OrderDetail, OrderHeader, OrderStatus, PaymentStatus,
};
use mockall::mock;
use std::sync::Arc;

mock! {
	pub Uow {}

	#[async_trait]
	impl UnitOfWork for Uow {
		fn category(&self) -> Arc<dyn Repository<Category>>;
		fn order_header(&self) -> Arc<dyn OrderHeaderRepository>;
		fn order_detail(&self) -> Arc<dyn Repository<OrderDetail>>;
		async fn save(&self) -> Result<(), StorageError>;
	}
}

mock! {
	pub CategoryRepo {}

	#[async_trait]
	impl Repository<Category> for CategoryRepo {
		async fn get_all(&self, include: Option<&'static str>) -> Result<Vec<Category>, StorageError>;
		async fn get_one(
			&self,
			filter: &Filter<Category>,
			include: Option<&'static str>,
		) -> Result<Option<Category>, StorageError>;
		fn add(&self, entity: Category) -> Result<(), StorageError>;
		fn update(&self, entity: Category) -> Result<(), StorageError>;
		fn delete(&self, entity: Category) -> Result<(), StorageError>;
	}
}

mock! {
	pub HeaderRepo {}

	#[async_trait]
	impl Repository<OrderHeader> for HeaderRepo {
		async fn get_all(&self, include: Option<&'static str>) -> Result<Vec<OrderHeader>, StorageError>;
		async fn get_one(
			&self,
			filter: &Filter<OrderHeader>,
			include: Option<&'static str>,
		) -> Result<Option<OrderHeader>, StorageError>;
		fn add(&self, entity: OrderHeader) -> Result<(), StorageError>;
		fn update(&self, entity: OrderHeader) -> Result<(), StorageError>;
		fn delete(&self, entity: OrderHeader) -> Result<(), StorageError>;
	}

	impl OrderHeaderRepository for HeaderRepo {
		fn update_status(
			&self,
			id: i32,
			order_status: OrderStatus,
			payment_status: Option<PaymentStatus>,
		) -> Result<(), StorageError>;
	}
}

mock! {
	pub DetailRepo {}

	#[async_trait]
	impl Repository<OrderDetail> for DetailRepo {
		async fn get_all(&self, include: Option<&'static str>) -> Result<Vec<OrderDetail>, StorageError>;
		async fn get_one(
			&self,
			filter: &Filter<OrderDetail>,
			include: Option<&'static str>,
		) -> Result<Option<OrderDetail>, StorageError>;
		fn add(&self, entity: OrderDetail) -> Result<(), StorageError>;
		fn update(&self, entity: OrderDetail) -> Result<(), StorageError>;
		fn delete(&self, entity: OrderDetail) -> Result<(), StorageError>;
	}
}

mock! {
	pub RefundProvider {}

	#[async_trait]
	impl RefundInterface for RefundProvider {
		fn config_schema(&self) -> Box<dyn ConfigSchema>;
		async fn create_refund(&self, request: &RefundRequest) -> Result<RefundResult, RefundError>;
	}
}

/// Unit of work handing out the given repositories. Repositories left as
/// `None` are empty mocks that fail the test when touched.
pub fn unit_of_work(
	categories: Option<MockCategoryRepo>,
	headers: Option<MockHeaderRepo>,
	details: Option<MockDetailRepo>,
	saves: usize,
) -> MockUow {
	let categories: Arc<dyn Repository<Category>> =
		Arc::new(categories.unwrap_or_default());
	let headers: Arc<dyn OrderHeaderRepository> = Arc::new(headers.unwrap_or_default());
	let details: Arc<dyn Repository<OrderDetail>> = Arc::new(details.unwrap_or_default());

	let mut uow = MockUow::new();
	uow.expect_category().returning(move || categories.clone());
	uow.expect_order_header().returning(move || headers.clone());
	uow.expect_order_detail().returning(move || details.clone());
	uow.expect_save().times(saves).returning(|| Ok(()));
	uow
}

pub fn refund_ok() -> RefundResult {
	RefundResult {
		refund_id: "re_1".to_string(),
		status: "succeeded".to_string(),
		amount: None,
	}
}
