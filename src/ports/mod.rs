use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::invoice::{Invoice, PaymentStatus};
use crate::domain::menu::{MenuItem, Restaurant};
use crate::domain::order::Order;
use crate::error::AppResult;

// ============================================================================
// Repository Ports - persistence contracts consumed by the services
// ============================================================================
//
// Every method receives the request's cancellation token. A cancelled token
// must fail with `AppError::Timeout` before anything is read or written.
// Lookups of a missing row fail with `AppError::NotFound`.
//
// ============================================================================

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist header and lines atomically; returns the new order id.
    async fn save(&self, cancel: &CancellationToken, order: &Order) -> AppResult<i64>;

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Order>;

    /// Replace header and the full item list atomically.
    async fn update(&self, cancel: &CancellationToken, order: &Order) -> AppResult<()>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn save(&self, cancel: &CancellationToken, invoice: &Invoice) -> AppResult<i64>;

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Invoice>;

    async fn find_by_order_id(
        &self,
        cancel: &CancellationToken,
        order_id: i64,
    ) -> AppResult<Vec<Invoice>>;

    async fn change_status(
        &self,
        cancel: &CancellationToken,
        id: i64,
        status: PaymentStatus,
    ) -> AppResult<()>;

    /// Cancel every `Unpaid` invoice of `invoice.order_id` and insert
    /// `invoice`, all or nothing. Returns the stored invoice and how many
    /// invoices were cancelled.
    async fn supersede_and_save(
        &self,
        cancel: &CancellationToken,
        invoice: &Invoice,
    ) -> AppResult<(Invoice, u64)>;

    /// Compare-and-set on the status column. Returns false when the stored
    /// status no longer equals `expected`.
    async fn change_status_if(
        &self,
        cancel: &CancellationToken,
        id: i64,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> AppResult<bool>;
}

#[async_trait]
pub trait MenuItemRepository: Send + Sync {
    async fn save(&self, cancel: &CancellationToken, item: &MenuItem) -> AppResult<i64>;

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<MenuItem>;

    async fn find_by_restaurant_id(
        &self,
        cancel: &CancellationToken,
        restaurant_id: i64,
    ) -> AppResult<Vec<MenuItem>>;

    async fn update_availability(
        &self,
        cancel: &CancellationToken,
        id: i64,
        available: bool,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait RestaurantRepository: Send + Sync {
    async fn save(&self, cancel: &CancellationToken, restaurant: &Restaurant) -> AppResult<i64>;

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Restaurant>;

    /// Every restaurant, ordered by id.
    async fn find_all(&self, cancel: &CancellationToken) -> AppResult<Vec<Restaurant>>;
}
