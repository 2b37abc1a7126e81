use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use food_ordering::config::AppConfig;
use food_ordering::domain::menu::{MenuItem, Restaurant};
use food_ordering::domain::order::{Order, OrderItem};
use food_ordering::domain::Actor;
use food_ordering::metrics::{self, Metrics};
use food_ordering::persistence::{InMemoryStore, PostgresStore};
use food_ordering::ports::{
    InvoiceRepository, MenuItemRepository, OrderRepository, RestaurantRepository,
};
use food_ordering::services::{InvoiceService, MenuService, OrderService};

/// One adapter seen through every repository port.
struct Repositories {
    backend: &'static str,
    orders: Arc<dyn OrderRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    menu_items: Arc<dyn MenuItemRepository>,
    restaurants: Arc<dyn RestaurantRepository>,
}

impl Repositories {
    fn from_store<S>(backend: &'static str, store: Arc<S>) -> Self
    where
        S: OrderRepository + InvoiceRepository + MenuItemRepository + RestaurantRepository + 'static,
    {
        Self {
            backend,
            orders: store.clone(),
            invoices: store.clone(),
            menu_items: store.clone(),
            restaurants: store,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,food_ordering=debug")),
        )
        .init();

    tracing::info!("🚀 Starting food ordering core");

    let config = AppConfig::from_env()?;

    // === 1. Pick the persistence adapter ===
    let repos = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL...");
            let store = PostgresStore::connect(url, config.db_max_connections).await?;
            store.migrate().await?;
            tracing::info!("✅ PostgreSQL schema ready");
            Repositories::from_store("postgres", Arc::new(store))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            Repositories::from_store("in_memory", Arc::new(InMemoryStore::new()))
        }
    };

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // Start metrics HTTP server in background thread
    let server_state = metrics::ServerState::new(metrics.clone(), repos.backend);
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Failed to build metrics runtime: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(server_state, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 3. Wire services ===
    let menus = MenuService::new(repos.menu_items.clone(), repos.restaurants.clone())
        .with_metrics(metrics.clone());
    let orders = OrderService::new(repos.orders.clone(), repos.menu_items.clone())
        .with_metrics(metrics.clone());
    let invoices = InvoiceService::new(
        repos.invoices.clone(),
        repos.orders.clone(),
        repos.menu_items.clone(),
    )
    .with_metrics(metrics.clone());

    if config.run_demo {
        run_demo(&menus, &orders, &invoices).await?;
    }

    tracing::info!("Metrics available on port {}; press Ctrl-C to stop", config.metrics_port);
    tokio::signal::ctrl_c().await?;
    tracing::info!("👋 Shutting down");

    Ok(())
}

/// Walk one order through its whole lifecycle.
async fn run_demo(
    menus: &MenuService,
    orders: &OrderService,
    invoices: &InvoiceService,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let owner = Actor::owner(10);
    let customer = Actor::customer(1);

    tracing::info!("📝 Demonstrating order lifecycle");

    let restaurant_id = menus
        .create_restaurant(&cancel, &owner, Restaurant::new("Tandoor House", owner.user_id))
        .await?;
    let naan = menus
        .create_menu_item(
            &cancel,
            &owner,
            MenuItem::new("Butter Naan", Decimal::from(100), true, restaurant_id),
        )
        .await?;
    let dal = menus
        .create_menu_item(
            &cancel,
            &owner,
            MenuItem::new("Dal Makhani", Decimal::from(200), true, restaurant_id),
        )
        .await?;

    for restaurant in menus.list_restaurants(&cancel).await? {
        tracing::info!(restaurant_id = restaurant.id, "Open for orders: {}", restaurant.name);
    }

    let order_id = orders
        .create_order(
            &cancel,
            &customer,
            Order::draft(
                customer.user_id,
                restaurant_id,
                vec![OrderItem::new(naan, 2), OrderItem::new(dal, 1)],
            ),
        )
        .await?;

    let invoice = invoices.generate_invoice(&cancel, &customer, order_id).await?;
    tracing::info!(
        "Invoice {} for order {}: total {} + tax {} = {}",
        invoice.id,
        order_id,
        invoice.total,
        invoice.tax,
        invoice.bill_with_tax()
    );

    invoices
        .do_invoice_payment(&cancel, &customer, invoice.id, invoice.bill_with_tax())
        .await?;

    match invoices
        .do_invoice_payment(&cancel, &customer, invoice.id, invoice.bill_with_tax())
        .await
    {
        Ok(()) => tracing::warn!("Second payment unexpectedly accepted"),
        Err(e) => tracing::info!("✅ Second payment refused: {}", e),
    }

    tracing::info!("🎉 Demo complete!");
    Ok(())
}
