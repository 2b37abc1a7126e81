use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use std::sync::Arc;
use std::time::Instant;

use super::Metrics;

/// What the scrape and health endpoints report on.
#[derive(Clone)]
pub struct ServerState {
    metrics: Arc<Metrics>,
    backend: &'static str,
    started: Instant,
}

impl ServerState {
    pub fn new(metrics: Arc<Metrics>, backend: &'static str) -> Self {
        Self {
            metrics,
            backend,
            started: Instant::now(),
        }
    }
}

/// Serve `/metrics` and `/health` until the server stops.
/// Runs on its own runtime so scrapes never compete with request tasks.
pub async fn start_metrics_server(state: ServerState, port: u16) -> std::io::Result<()> {
    tracing::info!(
        backend = state.backend,
        "📊 Starting metrics server on http://0.0.0.0:{}/metrics",
        port
    );

    HttpServer::new(move || App::new().configure(routes(state.clone())))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}

fn routes(state: ServerState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(state))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler));
    }
}

async fn metrics_handler(state: web::Data<ServerState>) -> impl Responder {
    match state.metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn health_handler(state: web::Data<ServerState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "food-ordering",
        "backend": state.backend,
        "uptime_seconds": state.started.elapsed().as_secs(),
        "orders_created": state.metrics.orders_created.get(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    fn state() -> ServerState {
        ServerState::new(Arc::new(Metrics::new().unwrap()), "in_memory")
    }

    #[actix_web::test]
    async fn test_health_reports_backend() {
        let state = state();
        state.metrics.orders_created.inc_by(3);
        let app = test::init_service(App::new().configure(routes(state))).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "in_memory");
        assert_eq!(body["orders_created"], 3);
    }

    #[actix_web::test]
    async fn test_metrics_endpoint_serves_domain_counters() {
        let state = state();
        state.metrics.record_invoice_generated(2);
        let app = test::init_service(App::new().configure(routes(state))).await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("invoices_generated_total 1"));
        assert!(text.contains("invoices_superseded_total 2"));
    }

    #[actix_web::test]
    async fn test_unknown_path_is_not_found() {
        let app = test::init_service(App::new().configure(routes(state()))).await;

        let req = test::TestRequest::get().uri("/orders").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }
}
