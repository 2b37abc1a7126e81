use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::order::{Order, OrderItem};
use crate::domain::{Actor, Role};
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::ports::{MenuItemRepository, OrderRepository};

use super::menu_availability::MenuAvailabilityResolver;
use super::observe;

// ============================================================================
// Order Service
// ============================================================================
//
// Orchestrates: Actor check → Menu snapshot → Order rules → Repository
//
// Validation always completes before the first repository write, so a
// refused request never leaves a partial order behind.
//
// ============================================================================

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    menu_items: Arc<dyn MenuItemRepository>,
    resolver: MenuAvailabilityResolver,
    metrics: Option<Arc<Metrics>>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>, menu_items: Arc<dyn MenuItemRepository>) -> Self {
        Self {
            orders,
            resolver: MenuAvailabilityResolver::new(menu_items.clone()),
            menu_items,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create `order` on behalf of its own customer; returns the new order id.
    pub async fn create_order(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        order: Order,
    ) -> AppResult<i64> {
        let started = Instant::now();
        let result = self.create_order_inner(cancel, actor, order).await;
        observe(self.metrics.as_ref(), "create_order", started, &result);
        result
    }

    async fn create_order_inner(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        mut order: Order,
    ) -> AppResult<i64> {
        let actor = actor.require_authenticated()?;
        if actor.role != Role::Customer || actor.user_id != order.customer_id {
            return Err(AppError::forbidden("only customers can create orders for themselves"));
        }

        let menu = self.resolver.resolve(cancel, order.restaurant_id).await?;
        order
            .check(&menu.availability())
            .map_err(|e| AppError::invalid(format!("invalid order data: {e}")))?;
        order
            .merge_duplicate_lines()
            .map_err(|e| AppError::invalid(format!("invalid order data: {e}")))?;

        let id = self.orders.save(cancel, &order).await?;

        if let Some(metrics) = &self.metrics {
            metrics.orders_created.inc();
        }
        tracing::info!(
            order_id = id,
            customer_id = order.customer_id,
            restaurant_id = order.restaurant_id,
            item_count = order.items.len(),
            "✅ Order created"
        );

        Ok(id)
    }

    /// Fetch an order. A customer who does not own it gets `Forbidden`, and
    /// only after the lookup succeeded.
    pub async fn get_order_by_id(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        id: i64,
    ) -> AppResult<Order> {
        let started = Instant::now();
        let result = self.get_order_by_id_inner(cancel, actor, id).await;
        observe(self.metrics.as_ref(), "get_order_by_id", started, &result);
        result
    }

    async fn get_order_by_id_inner(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        id: i64,
    ) -> AppResult<Order> {
        if id <= 0 {
            return Err(AppError::invalid("invalid order id"));
        }
        let actor = actor.require_role(Role::Customer, "only customers can access orders")?;

        let order = self.orders.find_by_id(cancel, id).await?;
        if !order.is_owned_by(actor.user_id) {
            return Err(AppError::forbidden("access to the order is forbidden"));
        }

        Ok(order)
    }

    /// Append `item` to an existing order and store the whole updated order.
    pub async fn add_order_item(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        order_id: i64,
        item: OrderItem,
    ) -> AppResult<()> {
        let started = Instant::now();
        let result = self.add_order_item_inner(cancel, actor, order_id, item).await;
        observe(self.metrics.as_ref(), "add_order_item", started, &result);
        result
    }

    async fn add_order_item_inner(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        order_id: i64,
        item: OrderItem,
    ) -> AppResult<()> {
        if order_id <= 0 || !item.validate() {
            return Err(AppError::invalid("invalid input data"));
        }
        let actor = actor.require_role(Role::Customer, "only customers can modify orders")?;

        let mut order = self.orders.find_by_id(cancel, order_id).await?;
        if !order.is_owned_by(actor.user_id) {
            return Err(AppError::forbidden("access to the order is forbidden"));
        }

        let menu_item = match self.menu_items.find_by_id(cancel, item.menu_item_id).await {
            Ok(menu_item) => menu_item,
            Err(err) if err.is_not_found() => {
                return Err(AppError::invalid("menu item does not exist"));
            }
            Err(err) => return Err(err),
        };
        if menu_item.restaurant_id != order.restaurant_id {
            return Err(AppError::invalid(
                "menu item does not belong to the restaurant of the order",
            ));
        }
        if !menu_item.is_available() {
            return Err(AppError::invalid("menu item is not available"));
        }

        order.add_item(item.menu_item_id, item.quantity)?;
        self.orders.update(cancel, &order).await?;

        if let Some(metrics) = &self.metrics {
            metrics.order_items_added.inc();
        }
        tracing::info!(
            order_id = order.id,
            menu_item_id = item.menu_item_id,
            quantity = item.quantity,
            "Order item added"
        );

        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
