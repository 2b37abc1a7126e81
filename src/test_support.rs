//! Shared fixture for service tests: restaurant 1 (owned by user 10) with
//! two available items priced 100 and 200, all on one in-memory store.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::menu::{MenuItem, Restaurant};
use crate::domain::order::{Order, OrderItem};
use crate::domain::Actor;
use crate::metrics::Metrics;
use crate::persistence::InMemoryStore;
use crate::services::{InvoiceService, MenuService, OrderService};

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub metrics: Arc<Metrics>,
    pub cancel: CancellationToken,
    pub orders: OrderService,
    pub invoices: InvoiceService,
    pub menus: MenuService,
}

impl Fixture {
    pub const RESTAURANT_ID: i64 = 1;
    pub const OWNER_ID: i64 = 10;
    pub const ITEM_100: i64 = 1;
    pub const ITEM_200: i64 = 2;

    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_restaurant(Restaurant::new("Tandoor House", Self::OWNER_ID))
            .await;
        store
            .insert_menu_item(MenuItem::new("Butter Naan", Decimal::from(100), true, Self::RESTAURANT_ID))
            .await;
        store
            .insert_menu_item(MenuItem::new("Dal Makhani", Decimal::from(200), true, Self::RESTAURANT_ID))
            .await;

        let metrics = Arc::new(Metrics::new().expect("metrics registry"));

        Self {
            orders: OrderService::new(store.clone(), store.clone()).with_metrics(metrics.clone()),
            invoices: InvoiceService::new(store.clone(), store.clone(), store.clone())
                .with_metrics(metrics.clone()),
            menus: MenuService::new(store.clone(), store.clone()).with_metrics(metrics.clone()),
            store,
            metrics,
            cancel: CancellationToken::new(),
        }
    }

    /// Place `[ITEM_100 x2, ITEM_200 x1]` for `customer_id`; priced at 400.
    pub async fn place_order(&self, customer_id: i64) -> i64 {
        let order = Order::draft(
            customer_id,
            Self::RESTAURANT_ID,
            vec![OrderItem::new(Self::ITEM_100, 2), OrderItem::new(Self::ITEM_200, 1)],
        );
        self.orders
            .create_order(&self.cancel, &Actor::customer(customer_id), order)
            .await
            .expect("fixture order")
    }
}
