// ============================================================================
// Services Layer - authorization, validation and persistence orchestration
// ============================================================================
//
// Services are stateless: they hold `Arc`s to repository ports and can be
// shared by any number of concurrent request tasks. All state lives behind
// the ports.
//
// ============================================================================

pub mod menu_availability;
pub mod menu_service;
pub mod order_service;
pub mod invoice_service;

pub use menu_availability::MenuAvailabilityResolver;
pub use menu_service::MenuService;
pub use order_service::OrderService;
pub use invoice_service::InvoiceService;

use std::sync::Arc;
use std::time::Instant;

use crate::error::AppResult;
use crate::metrics::Metrics;

/// Report an operation outcome to metrics (if any) and log failures.
pub(crate) fn observe<T>(
    metrics: Option<&Arc<Metrics>>,
    operation: &'static str,
    started: Instant,
    result: &AppResult<T>,
) {
    if let Err(err) = result {
        tracing::warn!(operation = operation, kind = %err.kind(), error = %err, "Operation refused");
    }
    if let Some(metrics) = metrics {
        metrics.record_operation(
            operation,
            started.elapsed().as_secs_f64(),
            result.as_ref().err().map(|e| e.kind()),
        );
    }
}
