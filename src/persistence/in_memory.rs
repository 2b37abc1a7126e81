use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::domain::invoice::{Invoice, PaymentStatus};
use crate::domain::menu::{MenuItem, Restaurant};
use crate::domain::order::Order;
use crate::error::{AppError, AppResult};
use crate::ports::{InvoiceRepository, MenuItemRepository, OrderRepository, RestaurantRepository};

// ============================================================================
// In-Memory Store - all repositories behind one lock
// ============================================================================
//
// Ids start at 1 and grow monotonically per table. Every mutation happens
// under a single write guard, so a saved or updated order is never visible
// with half of its lines.
//
// ============================================================================

#[derive(Default)]
struct Tables {
    restaurants: BTreeMap<i64, Restaurant>,
    menu_items: BTreeMap<i64, MenuItem>,
    orders: BTreeMap<i64, Order>,
    invoices: BTreeMap<i64, Invoice>,
}

fn next_id<V>(table: &BTreeMap<i64, V>) -> i64 {
    table.keys().next_back().copied().unwrap_or(0) + 1
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `Internal`, as a broken
    /// database would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_restaurant(&self, restaurant: Restaurant) -> i64 {
        let mut tables = self.tables.write().await;
        let id = next_id(&tables.restaurants);
        tables.restaurants.insert(id, Restaurant { id, ..restaurant });
        id
    }

    pub async fn insert_menu_item(&self, item: MenuItem) -> i64 {
        let mut tables = self.tables.write().await;
        let id = next_id(&tables.menu_items);
        tables.menu_items.insert(id, item.with_id(id));
        id
    }

    pub async fn insert_invoice(&self, invoice: Invoice) -> i64 {
        let mut tables = self.tables.write().await;
        let id = next_id(&tables.invoices);
        tables.invoices.insert(id, Invoice { id, ..invoice });
        id
    }

    pub async fn invoice_count(&self) -> usize {
        self.tables.read().await.invoices.len()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    fn ensure_live(&self, cancel: &CancellationToken) -> AppResult<()> {
        if cancel.is_cancelled() {
            return Err(AppError::cancelled());
        }
        Ok(())
    }

    fn ensure_writable(&self, cancel: &CancellationToken) -> AppResult<()> {
        self.ensure_live(cancel)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::internal(
                "database error",
                anyhow::anyhow!("write rejected by storage"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn save(&self, cancel: &CancellationToken, order: &Order) -> AppResult<i64> {
        self.ensure_writable(cancel)?;
        let mut tables = self.tables.write().await;
        let id = next_id(&tables.orders);
        tables.orders.insert(id, Order { id, ..order.clone() });
        Ok(id)
    }

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Order> {
        self.ensure_live(cancel)?;
        self.tables
            .read()
            .await
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("order not found"))
    }

    async fn update(&self, cancel: &CancellationToken, order: &Order) -> AppResult<()> {
        self.ensure_writable(cancel)?;
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&order.id) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(AppError::not_found("order not found")),
        }
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn save(&self, cancel: &CancellationToken, invoice: &Invoice) -> AppResult<i64> {
        self.ensure_writable(cancel)?;
        let mut tables = self.tables.write().await;
        let id = next_id(&tables.invoices);
        tables.invoices.insert(id, Invoice { id, ..invoice.clone() });
        Ok(id)
    }

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Invoice> {
        self.ensure_live(cancel)?;
        self.tables
            .read()
            .await
            .invoices
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("invoice not found"))
    }

    async fn find_by_order_id(
        &self,
        cancel: &CancellationToken,
        order_id: i64,
    ) -> AppResult<Vec<Invoice>> {
        self.ensure_live(cancel)?;
        Ok(self
            .tables
            .read()
            .await
            .invoices
            .values()
            .filter(|invoice| invoice.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn change_status(
        &self,
        cancel: &CancellationToken,
        id: i64,
        status: PaymentStatus,
    ) -> AppResult<()> {
        self.ensure_writable(cancel)?;
        let mut tables = self.tables.write().await;
        match tables.invoices.get_mut(&id) {
            Some(invoice) => {
                invoice.payment_status = status;
                Ok(())
            }
            None => Err(AppError::not_found("invoice not found")),
        }
    }

    async fn supersede_and_save(
        &self,
        cancel: &CancellationToken,
        invoice: &Invoice,
    ) -> AppResult<(Invoice, u64)> {
        self.ensure_writable(cancel)?;
        let mut tables = self.tables.write().await;

        let mut superseded = 0;
        for stored in tables
            .invoices
            .values_mut()
            .filter(|stored| stored.order_id == invoice.order_id && stored.is_unpaid())
        {
            stored.payment_status = PaymentStatus::Cancelled;
            superseded += 1;
        }

        let id = next_id(&tables.invoices);
        let stored = Invoice { id, ..invoice.clone() };
        tables.invoices.insert(id, stored.clone());
        Ok((stored, superseded))
    }

    async fn change_status_if(
        &self,
        cancel: &CancellationToken,
        id: i64,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> AppResult<bool> {
        self.ensure_writable(cancel)?;
        let mut tables = self.tables.write().await;
        match tables.invoices.get_mut(&id) {
            Some(invoice) if invoice.payment_status == expected => {
                invoice.payment_status = next;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AppError::not_found("invoice not found")),
        }
    }
}

#[async_trait]
impl MenuItemRepository for InMemoryStore {
    async fn save(&self, cancel: &CancellationToken, item: &MenuItem) -> AppResult<i64> {
        self.ensure_writable(cancel)?;
        Ok(self.insert_menu_item(item.clone()).await)
    }

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<MenuItem> {
        self.ensure_live(cancel)?;
        self.tables
            .read()
            .await
            .menu_items
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("menu item not found"))
    }

    async fn find_by_restaurant_id(
        &self,
        cancel: &CancellationToken,
        restaurant_id: i64,
    ) -> AppResult<Vec<MenuItem>> {
        self.ensure_live(cancel)?;
        Ok(self
            .tables
            .read()
            .await
            .menu_items
            .values()
            .filter(|item| item.restaurant_id == restaurant_id)
            .cloned()
            .collect())
    }

    async fn update_availability(
        &self,
        cancel: &CancellationToken,
        id: i64,
        available: bool,
    ) -> AppResult<()> {
        self.ensure_writable(cancel)?;
        let mut tables = self.tables.write().await;
        match tables.menu_items.get_mut(&id) {
            Some(item) => {
                item.available = available;
                Ok(())
            }
            None => Err(AppError::not_found("menu item not found")),
        }
    }
}

#[async_trait]
impl RestaurantRepository for InMemoryStore {
    async fn save(&self, cancel: &CancellationToken, restaurant: &Restaurant) -> AppResult<i64> {
        self.ensure_writable(cancel)?;
        Ok(self.insert_restaurant(restaurant.clone()).await)
    }

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Restaurant> {
        self.ensure_live(cancel)?;
        self.tables
            .read()
            .await
            .restaurants
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("restaurant not found"))
    }

    async fn find_all(&self, cancel: &CancellationToken) -> AppResult<Vec<Restaurant>> {
        self.ensure_live(cancel)?;
        Ok(self.tables.read().await.restaurants.values().cloned().collect())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
