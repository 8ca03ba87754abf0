//! HTTP API server with observability for the checkout system.
//!
//! Provides REST endpoints for placing orders with payment and reading
//! them back, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::CheckoutCoordinator;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{MealCatalog, OrderStore};
use payment::PaymentGateway;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, G>(state: Arc<AppState<S, G>>, metrics_handle: PrometheusHandle) -> Router
where
    S: OrderStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S, G>))
        .route("/orders/{id}", get(routes::orders::get::<S, G>))
        .route(
            "/orders/{id}/status",
            post(routes::orders::update_status::<S, G>),
        )
        .route(
            "/users/{user_id}/orders",
            get(routes::orders::list_for_user::<S, G>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over the given store, catalog, and gateway.
pub fn create_state<S, G>(
    store: S,
    catalog: Arc<dyn MealCatalog>,
    gateway: G,
) -> Arc<AppState<S, G>>
where
    S: OrderStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let coordinator = CheckoutCoordinator::new(store.clone(), gateway);
    Arc::new(AppState {
        coordinator,
        store,
        catalog,
    })
}
