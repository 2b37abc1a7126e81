use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::invoice::{Invoice, PaymentStatus};
use crate::domain::{Actor, Role};
use crate::error::{AppError, AppResult, ErrorKind};
use crate::metrics::Metrics;
use crate::ports::{InvoiceRepository, MenuItemRepository, OrderRepository};

use super::menu_availability::MenuAvailabilityResolver;
use super::observe;

// ============================================================================
// Invoice Service - invoice generation and payment authorization
// ============================================================================
//
// Generation re-validates the order against the current menu, then cancels
// every unpaid invoice of the order and persists a fresh one in a single
// repository call, so a cancelled request never leaves the order without a
// live invoice.
//
// Payments go through `change_status_if`; a payment and a supersession
// racing on the same invoice cannot both win.
//
// ============================================================================

#[derive(Clone)]
pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    orders: Arc<dyn OrderRepository>,
    resolver: MenuAvailabilityResolver,
    metrics: Option<Arc<Metrics>>,
}

impl InvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        orders: Arc<dyn OrderRepository>,
        menu_items: Arc<dyn MenuItemRepository>,
    ) -> Self {
        Self {
            invoices,
            orders,
            resolver: MenuAvailabilityResolver::new(menu_items),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Price `order_id` against the current menu and issue a new unpaid
    /// invoice for it, cancelling any unpaid invoice issued before.
    pub async fn generate_invoice(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        order_id: i64,
    ) -> AppResult<Invoice> {
        let started = Instant::now();
        let result = self.generate_invoice_inner(cancel, actor, order_id).await;
        observe(self.metrics.as_ref(), "generate_invoice", started, &result);
        result
    }

    async fn generate_invoice_inner(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        order_id: i64,
    ) -> AppResult<Invoice> {
        if order_id <= 0 {
            return Err(AppError::invalid("invalid order id"));
        }

        let order = self.orders.find_by_id(cancel, order_id).await?;

        let actor = actor.require_authenticated()?;
        if actor.role != Role::Customer || !order.is_owned_by(actor.user_id) {
            return Err(AppError::forbidden(
                "only the customer who placed the order can generate its invoice",
            ));
        }

        let menu = self.resolver.resolve(cancel, order.restaurant_id).await?;
        if !order.validate(&menu.availability()) {
            return Err(AppError::invalid("invalid order data, or item not available"));
        }

        let total = order
            .total_price(&menu)
            .map_err(|e| AppError::invalid(format!("invalid order data: {e}")))?;
        let invoice = Invoice::issue(order.id, total);
        if !invoice.validate() {
            return Err(AppError::invalid("invoice amount out of range"));
        }

        let (stored, superseded) = self.invoices.supersede_and_save(cancel, &invoice).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_invoice_generated(superseded);
        }
        tracing::info!(
            invoice_id = stored.id,
            order_id = stored.order_id,
            total = %stored.total,
            tax = %stored.tax,
            superseded = superseded,
            "🧾 Invoice generated"
        );

        Ok(stored)
    }

    pub async fn get_invoice_by_id(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        id: i64,
    ) -> AppResult<Invoice> {
        let started = Instant::now();
        let result = self.owned_invoice(cancel, actor, id).await;
        observe(self.metrics.as_ref(), "get_invoice_by_id", started, &result);
        result
    }

    /// Invoice `id` after the id, role and ownership checks shared by reads
    /// and payments.
    async fn owned_invoice(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        id: i64,
    ) -> AppResult<Invoice> {
        if id <= 0 {
            return Err(AppError::invalid("invalid invoice id"));
        }
        let actor = actor.require_role(Role::Customer, "only customers can access invoices")?;

        let invoice = self.invoices.find_by_id(cancel, id).await?;
        let order = self.orders.find_by_id(cancel, invoice.order_id).await?;
        if !order.is_owned_by(actor.user_id) {
            return Err(AppError::forbidden("access to the invoice is forbidden"));
        }

        Ok(invoice)
    }

    /// Settle invoice `id` with `amount`. The amount must cover the full
    /// tax-inclusive bill; a second payment of the same invoice is refused.
    pub async fn do_invoice_payment(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        id: i64,
        amount: Decimal,
    ) -> AppResult<()> {
        let started = Instant::now();
        let result = self.do_invoice_payment_inner(cancel, actor, id, amount).await;
        if let (Some(metrics), Err(err)) = (&self.metrics, &result) {
            if err.kind() == ErrorKind::Invalid {
                metrics.record_payment(false);
            }
        }
        observe(self.metrics.as_ref(), "do_invoice_payment", started, &result);
        result
    }

    async fn do_invoice_payment_inner(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        id: i64,
        amount: Decimal,
    ) -> AppResult<()> {
        let invoice = self.owned_invoice(cancel, actor, id).await?;

        if !invoice.is_unpaid() {
            return Err(AppError::invalid("invalid request"));
        }
        let bill = invoice.bill_with_tax();
        if amount < bill {
            return Err(AppError::invalid("insufficient payment amount"));
        }

        let paid = self
            .invoices
            .change_status_if(cancel, invoice.id, PaymentStatus::Unpaid, PaymentStatus::Paid)
            .await?;
        if !paid {
            return Err(AppError::invalid("invalid request"));
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_payment(true);
        }
        tracing::info!(
            invoice_id = invoice.id,
            order_id = invoice.order_id,
            amount = %amount,
            bill = %bill,
            "💰 Invoice paid"
        );

        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::menu::MenuItem;
    use crate::domain::order::{Order, OrderItem};
    use crate::persistence::InMemoryStore;
    use async_trait::async_trait;
    use crate::test_support::Fixture;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    async fn status_of(fx: &Fixture, id: i64) -> PaymentStatus {
        InvoiceRepository::find_by_id(fx.store.as_ref(), &fx.cancel, id)
            .await
            .unwrap()
            .payment_status
    }

    #[tokio::test]
    async fn test_end_to_end_order_invoice_payment() {
        let fx = Fixture::new().await;
        let customer = Actor::customer(1);

        let order_id = fx
            .orders
            .create_order(
                &fx.cancel,
                &customer,
                Order::draft(
                    1,
                    Fixture::RESTAURANT_ID,
                    vec![OrderItem::new(Fixture::ITEM_100, 2), OrderItem::new(Fixture::ITEM_200, 1)],
                ),
            )
            .await
            .unwrap();

        let invoice = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();
        assert_eq!(invoice.order_id, order_id);
        assert_eq!(invoice.total, dec("400"));
        assert_eq!(invoice.tax, dec("40"));
        assert_eq!(invoice.bill_with_tax(), dec("440.0"));
        assert_eq!(invoice.payment_status, PaymentStatus::Unpaid);

        fx.invoices
            .do_invoice_payment(&fx.cancel, &customer, invoice.id, dec("440.0"))
            .await
            .unwrap();
        assert_eq!(status_of(&fx, invoice.id).await, PaymentStatus::Paid);

        let err = fx
            .invoices
            .do_invoice_payment(&fx.cancel, &customer, invoice.id, dec("440.0"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        assert_eq!(fx.metrics.invoices_generated.get(), 1);
        assert_eq!(fx.metrics.payments.with_label_values(&["paid"]).get(), 1);
        assert_eq!(fx.metrics.payments.with_label_values(&["rejected"]).get(), 1);
    }

    #[tokio::test]
    async fn test_generate_invoice_returns_stored_invoice() {
        let fx = Fixture::new().await;
        let order_id = fx.place_order(1).await;

        let invoice = fx
            .invoices
            .generate_invoice(&fx.cancel, &Actor::customer(1), order_id)
            .await
            .unwrap();

        let stored = InvoiceRepository::find_by_id(fx.store.as_ref(), &fx.cancel, invoice.id)
            .await
            .unwrap();
        assert!(invoice.id > 0);
        assert_eq!(invoice, stored);
    }

    #[tokio::test]
    async fn test_generate_invoice_step_order() {
        let fx = Fixture::new().await;
        let order_id = fx.place_order(1).await;

        let err = fx.invoices.generate_invoice(&fx.cancel, &Actor::customer(1), 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        // The order lookup comes before the authentication check.
        let err = fx.invoices.generate_invoice(&fx.cancel, &Actor::anonymous(), 99).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = fx
            .invoices
            .generate_invoice(&fx.cancel, &Actor::anonymous(), order_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = fx
            .invoices
            .generate_invoice(&fx.cancel, &Actor::customer(2), order_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = fx
            .invoices
            .generate_invoice(&fx.cancel, &Actor::owner(10), order_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(fx.store.invoice_count().await, 0);
    }

    #[tokio::test]
    async fn test_generate_invoice_fails_when_item_became_unavailable() {
        let fx = Fixture::new().await;
        let order_id = fx.place_order(1).await;
        fx.store
            .update_availability(&fx.cancel, Fixture::ITEM_200, false)
            .await
            .unwrap();

        let err = fx
            .invoices
            .generate_invoice(&fx.cancel, &Actor::customer(1), order_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(fx.store.invoice_count().await, 0);
    }

    #[tokio::test]
    async fn test_second_invoice_supersedes_only_unpaid() {
        let fx = Fixture::new().await;
        let customer = Actor::customer(1);
        let order_id = fx.place_order(1).await;

        let paid = fx
            .store
            .insert_invoice(Invoice {
                payment_status: PaymentStatus::Paid,
                ..Invoice::issue(order_id, dec("400"))
            })
            .await;
        let cancelled = fx
            .store
            .insert_invoice(Invoice {
                payment_status: PaymentStatus::Cancelled,
                ..Invoice::issue(order_id, dec("400"))
            })
            .await;

        let first = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();
        let second = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();

        assert_eq!(status_of(&fx, first.id).await, PaymentStatus::Cancelled);
        assert_eq!(status_of(&fx, second.id).await, PaymentStatus::Unpaid);
        assert_eq!(status_of(&fx, paid).await, PaymentStatus::Paid);
        assert_eq!(status_of(&fx, cancelled).await, PaymentStatus::Cancelled);
        assert_eq!(fx.metrics.invoices_superseded.get(), 1);
    }

    #[tokio::test]
    async fn test_invoice_reflects_items_added_after_first_invoice() {
        let fx = Fixture::new().await;
        let customer = Actor::customer(1);
        let order_id = fx.place_order(1).await;

        fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();
        fx.orders
            .add_order_item(&fx.cancel, &customer, order_id, OrderItem::new(Fixture::ITEM_200, 1))
            .await
            .unwrap();
        let invoice = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();

        assert_eq!(invoice.total, dec("600"));
        assert_eq!(invoice.tax, dec("60"));
    }

    #[tokio::test]
    async fn test_payment_boundary() {
        let fx = Fixture::new().await;
        let customer = Actor::customer(1);
        let order_id = fx.place_order(1).await;
        let invoice = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();

        let err = fx
            .invoices
            .do_invoice_payment(&fx.cancel, &customer, invoice.id, dec("439.99"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(status_of(&fx, invoice.id).await, PaymentStatus::Unpaid);

        fx.invoices
            .do_invoice_payment(&fx.cancel, &customer, invoice.id, dec("500"))
            .await
            .unwrap();
        assert_eq!(status_of(&fx, invoice.id).await, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_paying_superseded_invoice_is_invalid() {
        let fx = Fixture::new().await;
        let customer = Actor::customer(1);
        let order_id = fx.place_order(1).await;
        let stale = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();
        fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();

        let err = fx
            .invoices
            .do_invoice_payment(&fx.cancel, &customer, stale.id, dec("440"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(status_of(&fx, stale.id).await, PaymentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_invoice_ownership_isolation() {
        let fx = Fixture::new().await;
        let order_id = fx.place_order(1).await;
        let invoice = fx
            .invoices
            .generate_invoice(&fx.cancel, &Actor::customer(1), order_id)
            .await
            .unwrap();
        let stranger = Actor::customer(2);

        let err = fx.invoices.get_invoice_by_id(&fx.cancel, &stranger, invoice.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = fx
            .invoices
            .do_invoice_payment(&fx.cancel, &stranger, invoice.id, dec("440"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(status_of(&fx, invoice.id).await, PaymentStatus::Unpaid);

        let own = fx
            .invoices
            .get_invoice_by_id(&fx.cancel, &Actor::customer(1), invoice.id)
            .await
            .unwrap();
        assert_eq!(own, invoice);
    }

    #[tokio::test]
    async fn test_get_invoice_by_id_checks() {
        let fx = Fixture::new().await;

        let err = fx.invoices.get_invoice_by_id(&fx.cancel, &Actor::customer(1), -1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let err = fx.invoices.get_invoice_by_id(&fx.cancel, &Actor::anonymous(), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = fx.invoices.get_invoice_by_id(&fx.cancel, &Actor::owner(10), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = fx.invoices.get_invoice_by_id(&fx.cancel, &Actor::customer(1), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Invoice whose parent order is gone.
        let orphan = fx.store.insert_invoice(Invoice::issue(42, dec("10"))).await;
        let err = fx
            .invoices
            .do_invoice_payment(&fx.cancel, &Actor::customer(1), orphan, dec("11"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_payment_storage_failure_is_internal() {
        let fx = Fixture::new().await;
        let customer = Actor::customer(1);
        let order_id = fx.place_order(1).await;
        let invoice = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();
        fx.store.set_fail_writes(true);

        let err = fx
            .invoices
            .do_invoice_payment(&fx.cancel, &customer, invoice.id, dec("440"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        fx.store.set_fail_writes(false);
        assert_eq!(status_of(&fx, invoice.id).await, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_cancelled_generation_leaves_no_invoice() {
        let fx = Fixture::new().await;
        let order_id = fx.place_order(1).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fx
            .invoices
            .generate_invoice(&cancel, &Actor::customer(1), order_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(fx.store.invoice_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_payments_only_one_wins() {
        let fx = Fixture::new().await;
        let customer = Actor::customer(1);
        let order_id = fx.place_order(1).await;
        let invoice = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();
        let invoice_id = invoice.id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = fx.invoices.clone();
            let cancel = fx.cancel.clone();
            handles.push(tokio::spawn(async move {
                service
                    .do_invoice_payment(&cancel, &customer, invoice_id, dec("440"))
                    .await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(status_of(&fx, invoice_id).await, PaymentStatus::Paid);
    }

    /// Invoice repository that fires the request token as supersession starts.
    struct CancelOnSupersede {
        inner: Arc<InMemoryStore>,
        token: CancellationToken,
    }

    #[async_trait]
    impl InvoiceRepository for CancelOnSupersede {
        async fn save(&self, cancel: &CancellationToken, invoice: &Invoice) -> AppResult<i64> {
            InvoiceRepository::save(self.inner.as_ref(), cancel, invoice).await
        }

        async fn find_by_id(&self, cancel: &CancellationToken, id: i64) -> AppResult<Invoice> {
            InvoiceRepository::find_by_id(self.inner.as_ref(), cancel, id).await
        }

        async fn find_by_order_id(
            &self,
            cancel: &CancellationToken,
            order_id: i64,
        ) -> AppResult<Vec<Invoice>> {
            self.inner.find_by_order_id(cancel, order_id).await
        }

        async fn change_status(
            &self,
            cancel: &CancellationToken,
            id: i64,
            status: PaymentStatus,
        ) -> AppResult<()> {
            self.inner.change_status(cancel, id, status).await
        }

        async fn supersede_and_save(
            &self,
            cancel: &CancellationToken,
            invoice: &Invoice,
        ) -> AppResult<(Invoice, u64)> {
            self.token.cancel();
            self.inner.supersede_and_save(cancel, invoice).await
        }

        async fn change_status_if(
            &self,
            cancel: &CancellationToken,
            id: i64,
            expected: PaymentStatus,
            next: PaymentStatus,
        ) -> AppResult<bool> {
            self.inner.change_status_if(cancel, id, expected, next).await
        }
    }

    #[tokio::test]
    async fn test_cancellation_during_supersession_keeps_live_invoice() {
        let fx = Fixture::new().await;
        let customer = Actor::customer(1);
        let order_id = fx.place_order(1).await;
        let first = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap();

        let cancel = CancellationToken::new();
        let invoices = InvoiceService::new(
            Arc::new(CancelOnSupersede {
                inner: fx.store.clone(),
                token: cancel.clone(),
            }),
            fx.store.clone(),
            fx.store.clone(),
        );

        let err = invoices.generate_invoice(&cancel, &customer, order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(status_of(&fx, first.id).await, PaymentStatus::Unpaid);
        assert_eq!(fx.store.invoice_count().await, 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_total_is_invalid() {
        let fx = Fixture::new().await;
        let gold = fx
            .store
            .insert_menu_item(MenuItem::new(
                "Gold Leaf Thali",
                Decimal::from(10_000_000_000_i64),
                true,
                Fixture::RESTAURANT_ID,
            ))
            .await;
        let customer = Actor::customer(1);
        let order_id = fx
            .orders
            .create_order(
                &fx.cancel,
                &customer,
                Order::draft(1, Fixture::RESTAURANT_ID, vec![OrderItem::new(gold, i64::MAX)]),
            )
            .await
            .unwrap();

        let err = fx.invoices.generate_invoice(&fx.cancel, &customer, order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(fx.store.invoice_count().await, 0);
    }
}
