// Private module declaration
mod server;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::error::ErrorKind;

// Re-export for public API
pub use server::{start_metrics_server, ServerState};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order creation and item additions
// - Invoice generation and supersession
// - Payment outcomes
// - Per-operation latency and refusals by error kind
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounter,
    pub order_items_added: IntCounter,

    // Invoice Metrics
    pub invoices_generated: IntCounter,
    pub invoices_superseded: IntCounter,
    pub payments: IntCounterVec,

    // Service Metrics
    pub service_errors: IntCounterVec,
    pub operation_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_items_added = IntCounter::new(
            "order_items_added_total",
            "Total items appended to existing orders",
        )?;
        registry.register(Box::new(order_items_added.clone()))?;

        let invoices_generated =
            IntCounter::new("invoices_generated_total", "Total invoices generated")?;
        registry.register(Box::new(invoices_generated.clone()))?;

        let invoices_superseded = IntCounter::new(
            "invoices_superseded_total",
            "Unpaid invoices cancelled because a newer invoice replaced them",
        )?;
        registry.register(Box::new(invoices_superseded.clone()))?;

        let payments = IntCounterVec::new(
            Opts::new("payments_total", "Invoice payment attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(payments.clone()))?;

        let service_errors = IntCounterVec::new(
            Opts::new("service_errors_total", "Failed service operations by error kind"),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(service_errors.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new("operation_duration_seconds", "Service operation duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_items_added,
            invoices_generated,
            invoices_superseded,
            payments,
            service_errors,
            operation_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Helper to record one service call
    pub fn record_operation(&self, operation: &str, duration_secs: f64, failure: Option<ErrorKind>) {
        self.operation_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
        if let Some(kind) = failure {
            self.service_errors
                .with_label_values(&[operation, kind.as_str()])
                .inc();
        }
    }

    pub fn record_invoice_generated(&self, superseded: u64) {
        self.invoices_generated.inc();
        self.invoices_superseded.inc_by(superseded);
    }

    pub fn record_payment(&self, paid: bool) {
        let outcome = if paid { "paid" } else { "rejected" };
        self.payments.with_label_values(&[outcome]).inc();
    }
}
