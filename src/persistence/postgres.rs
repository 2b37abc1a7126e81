use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::domain::invoice::{Invoice, PaymentStatus};
use crate::domain::menu::{MenuItem, Restaurant};
use crate::domain::order::{Order, OrderItem};
use crate::error::{AppError, AppResult};
use crate::ports::{InvoiceRepository, MenuItemRepository, OrderRepository, RestaurantRepository};

// ============================================================================
// PostgreSQL Store - sqlx-backed repositories
// ============================================================================
//
// Responsibilities:
// 1. Bootstrap the schema
// 2. Save/update an order header together with its lines in ONE transaction
// 3. Conditional invoice status writes (compare-and-set on payment_status)
//
// Reads race the request's cancellation token. Writes check it before the
// first statement and then run to completion; transactions are committed
// only while the token is still live, otherwise they are dropped and roll
// back.
//
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS restaurants (
    id       BIGSERIAL PRIMARY KEY,
    name     TEXT NOT NULL,
    owner_id BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS menu_items (
    id            BIGSERIAL PRIMARY KEY,
    name          TEXT NOT NULL,
    price         NUMERIC(12, 2) NOT NULL CHECK (price >= 0),
    available     BOOLEAN NOT NULL DEFAULT TRUE,
    restaurant_id BIGINT NOT NULL REFERENCES restaurants (id)
);

CREATE TABLE IF NOT EXISTS orders (
    id            BIGSERIAL PRIMARY KEY,
    customer_id   BIGINT NOT NULL,
    restaurant_id BIGINT NOT NULL REFERENCES restaurants (id)
);

CREATE TABLE IF NOT EXISTS order_items (
    order_id     BIGINT NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    position     INTEGER NOT NULL,
    menu_item_id BIGINT NOT NULL REFERENCES menu_items (id),
    quantity     BIGINT NOT NULL CHECK (quantity > 0),
    PRIMARY KEY (order_id, position)
);

CREATE TABLE IF NOT EXISTS invoices (
    id             BIGSERIAL PRIMARY KEY,
    order_id       BIGINT NOT NULL REFERENCES orders (id),
    total          NUMERIC(12, 2) NOT NULL CHECK (total >= 0),
    tax            NUMERIC(12, 2) NOT NULL CHECK (tax >= 0),
    payment_status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS invoices_order_id_idx ON invoices (order_id);
"#;

type InvoiceRow = (i64, i64, Decimal, Decimal, String);
type MenuItemRow = (i64, String, Decimal, bool, i64);

fn db_error(context: &str) -> impl Fn(sqlx::Error) -> AppError + '_ {
    move |err| match err {
        sqlx::Error::RowNotFound => AppError::not_found(format!("{context}: record not found")),
        other => AppError::internal(format!("{context}: database error"), other),
    }
}

fn invoice_from_row((id, order_id, total, tax, status): InvoiceRow) -> AppResult<Invoice> {
    let payment_status = status
        .parse::<PaymentStatus>()
        .map_err(|e| AppError::internal("corrupt invoice row", e))?;

    Ok(Invoice {
        id,
        order_id,
        total,
        tax,
        payment_status,
    })
}

fn menu_item_from_row((id, name, price, available, restaurant_id): MenuItemRow) -> MenuItem {
    MenuItem {
        id,
        name,
        price,
        available,
        restaurant_id,
    }
}

async fn guarded_read<T, F>(cancel: &CancellationToken, operation: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(AppError::cancelled());
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(AppError::cancelled()),
        result = operation => result,
    }
}

/// An autocommit statement that was already sent may still land, so a write
/// is never abandoned halfway: the result always reports what the database did.
async fn guarded_write<T, F>(cancel: &CancellationToken, operation: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(AppError::cancelled());
    }
    operation.await
}

async fn commit_if_live(
    cancel: &CancellationToken,
    tx: sqlx::Transaction<'_, sqlx::Postgres>,
) -> AppResult<()> {
    if cancel.is_cancelled() {
        tx.rollback().await.map_err(db_error("rollback"))?;
        return Err(AppError::cancelled());
    }
    tx.commit().await.map_err(db_error("commit"))
}

fn position_of(index: usize) -> AppResult<i32> {
    i32::try_from(index).map_err(|_| AppError::invalid("order has too many lines"))
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<Self> {
        tracing::info!(max_connections = max_connections, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(db_error("connect"))?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(db_error("migrate"))?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    async fn insert_items(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: i64,
        items: &[OrderItem],
    ) -> AppResult<()> {
        for (index, item) in items.iter().enumerate() {
            let position = position_of(index)?;
            sqlx::query(
                "INSERT INTO order_items (order_id, position, menu_item_id, quantity)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(position)
            .bind(item.menu_item_id)
            .bind(item.quantity)
            .execute(&mut **tx)
            .await
            .map_err(db_error("insert order item"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn save(&self, cancel: &CancellationToken, order: &Order) -> AppResult<i64> {
        guarded_write(cancel, async {
            let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO orders (customer_id, restaurant_id) VALUES ($1, $2) RETURNING id",
            )
            .bind(order.customer_id)
            .bind(order.restaurant_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("insert order"))?;

            Self::insert_items(&mut tx, id, &order.items).await?;
            commit_if_live(cancel, tx).await?;

            tracing::debug!(order_id = id, lines = order.items.len(), "Order rows written");
            Ok(id)
        })
        .await
    }

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Order> {
        guarded_read(cancel, async {
            let header: Option<(i64, i64, i64)> =
                sqlx::query_as("SELECT id, customer_id, restaurant_id FROM orders WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_error("find order"))?;

            let Some((id, customer_id, restaurant_id)) = header else {
                return Err(AppError::not_found("order not found"));
            };

            let lines: Vec<(i64, i64)> = sqlx::query_as(
                "SELECT menu_item_id, quantity FROM order_items
                 WHERE order_id = $1 ORDER BY position ASC",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find order items"))?;

            Ok(Order {
                id,
                customer_id,
                restaurant_id,
                items: lines
                    .into_iter()
                    .map(|(menu_item_id, quantity)| OrderItem::new(menu_item_id, quantity))
                    .collect(),
            })
        })
        .await
    }

    async fn update(&self, cancel: &CancellationToken, order: &Order) -> AppResult<()> {
        guarded_write(cancel, async {
            let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

            let updated = sqlx::query(
                "UPDATE orders SET customer_id = $1, restaurant_id = $2 WHERE id = $3",
            )
            .bind(order.customer_id)
            .bind(order.restaurant_id)
            .bind(order.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("update order"))?;

            if updated.rows_affected() == 0 {
                return Err(AppError::not_found("order not found"));
            }

            sqlx::query("DELETE FROM order_items WHERE order_id = $1")
                .bind(order.id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("clear order items"))?;

            Self::insert_items(&mut tx, order.id, &order.items).await?;
            commit_if_live(cancel, tx).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl InvoiceRepository for PostgresStore {
    async fn save(&self, cancel: &CancellationToken, invoice: &Invoice) -> AppResult<i64> {
        guarded_write(cancel, async {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO invoices (order_id, total, tax, payment_status)
                 VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(invoice.order_id)
            .bind(invoice.total)
            .bind(invoice.tax)
            .bind(invoice.payment_status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("insert invoice"))?;
            Ok(id)
        })
        .await
    }

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Invoice> {
        guarded_read(cancel, async {
            let row: InvoiceRow = sqlx::query_as(
                "SELECT id, order_id, total, tax, payment_status FROM invoices WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("find invoice"))?;
            invoice_from_row(row)
        })
        .await
    }

    async fn find_by_order_id(
        &self,
        cancel: &CancellationToken,
        order_id: i64,
    ) -> AppResult<Vec<Invoice>> {
        guarded_read(cancel, async {
            let rows: Vec<InvoiceRow> = sqlx::query_as(
                "SELECT id, order_id, total, tax, payment_status FROM invoices
                 WHERE order_id = $1 ORDER BY id ASC",
            )
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find invoices by order"))?;
            rows.into_iter().map(invoice_from_row).collect()
        })
        .await
    }

    async fn change_status(
        &self,
        cancel: &CancellationToken,
        id: i64,
        status: PaymentStatus,
    ) -> AppResult<()> {
        guarded_write(cancel, async {
            let result = sqlx::query("UPDATE invoices SET payment_status = $1 WHERE id = $2")
                .bind(status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_error("change invoice status"))?;

            if result.rows_affected() == 0 {
                return Err(AppError::not_found("invoice not found"));
            }
            Ok(())
        })
        .await
    }

    async fn supersede_and_save(
        &self,
        cancel: &CancellationToken,
        invoice: &Invoice,
    ) -> AppResult<(Invoice, u64)> {
        guarded_write(cancel, async {
            let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

            let superseded = sqlx::query(
                "UPDATE invoices SET payment_status = $1
                 WHERE order_id = $2 AND payment_status = $3",
            )
            .bind(PaymentStatus::Cancelled.as_str())
            .bind(invoice.order_id)
            .bind(PaymentStatus::Unpaid.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error("supersede invoices"))?
            .rows_affected();

            let row: InvoiceRow = sqlx::query_as(
                "INSERT INTO invoices (order_id, total, tax, payment_status)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, order_id, total, tax, payment_status",
            )
            .bind(invoice.order_id)
            .bind(invoice.total)
            .bind(invoice.tax)
            .bind(invoice.payment_status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("insert invoice"))?;
            let stored = invoice_from_row(row)?;

            commit_if_live(cancel, tx).await?;
            Ok((stored, superseded))
        })
        .await
    }

    async fn change_status_if(
        &self,
        cancel: &CancellationToken,
        id: i64,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> AppResult<bool> {
        guarded_write(cancel, async {
            let result = sqlx::query(
                "UPDATE invoices SET payment_status = $1 WHERE id = $2 AND payment_status = $3",
            )
            .bind(next.as_str())
            .bind(id)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error("change invoice status"))?;

            if result.rows_affected() == 1 {
                return Ok(true);
            }

            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM invoices WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find invoice"))?;

            match exists {
                Some(_) => Ok(false),
                None => Err(AppError::not_found("invoice not found")),
            }
        })
        .await
    }
}

#[async_trait]
impl MenuItemRepository for PostgresStore {
    async fn save(&self, cancel: &CancellationToken, item: &MenuItem) -> AppResult<i64> {
        guarded_write(cancel, async {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO menu_items (name, price, available, restaurant_id)
                 VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(&item.name)
            .bind(item.price)
            .bind(item.available)
            .bind(item.restaurant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("insert menu item"))?;
            Ok(id)
        })
        .await
    }

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<MenuItem> {
        guarded_read(cancel, async {
            let row: MenuItemRow = sqlx::query_as(
                "SELECT id, name, price, available, restaurant_id FROM menu_items WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("find menu item"))?;
            Ok(menu_item_from_row(row))
        })
        .await
    }

    async fn find_by_restaurant_id(
        &self,
        cancel: &CancellationToken,
        restaurant_id: i64,
    ) -> AppResult<Vec<MenuItem>> {
        guarded_read(cancel, async {
            let rows: Vec<MenuItemRow> = sqlx::query_as(
                "SELECT id, name, price, available, restaurant_id FROM menu_items
                 WHERE restaurant_id = $1 ORDER BY id ASC",
            )
            .bind(restaurant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("find menu items"))?;
            Ok(rows.into_iter().map(menu_item_from_row).collect())
        })
        .await
    }

    async fn update_availability(
        &self,
        cancel: &CancellationToken,
        id: i64,
        available: bool,
    ) -> AppResult<()> {
        guarded_write(cancel, async {
            let result = sqlx::query("UPDATE menu_items SET available = $1 WHERE id = $2")
                .bind(available)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_error("update menu item"))?;

            if result.rows_affected() == 0 {
                return Err(AppError::not_found("menu item not found"));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RestaurantRepository for PostgresStore {
    async fn save(&self, cancel: &CancellationToken, restaurant: &Restaurant) -> AppResult<i64> {
        guarded_write(cancel, async {
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO restaurants (name, owner_id) VALUES ($1, $2) RETURNING id",
            )
            .bind(&restaurant.name)
            .bind(restaurant.owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("insert restaurant"))?;
            Ok(id)
        })
        .await
    }

    async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Restaurant> {
        guarded_read(cancel, async {
            let (id, name, owner_id): (i64, String, i64) =
                sqlx::query_as("SELECT id, name, owner_id FROM restaurants WHERE id = $1")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_error("find restaurant"))?;
            Ok(Restaurant { id, name, owner_id })
        })
        .await
    }
    async fn find_all(&self, cancel: &CancellationToken) -> AppResult<Vec<Restaurant>> {
        guarded_read(cancel, async {
            let rows: Vec<(i64, String, i64)> =
                sqlx::query_as("SELECT id, name, owner_id FROM restaurants ORDER BY id ASC")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_error("find restaurants"))?;
            Ok(rows
                .into_iter()
                .map(|(id, name, owner_id)| Restaurant { id, name, owner_id })
                .collect())
        })
        .await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Queries themselves need a live PostgreSQL; these cover the row mapping
// and error translation around them.
//
// ============================================================================
