//! HTTP API server for the ordering portal.
//!
//! Provides REST endpoints for catalog browsing, order placement and admin
//! management, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::OrderService;
use metrics_exporter_prometheus::PrometheusHandle;
use notify::OrderNotifier;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/orders/{id}",
            put(routes::orders::update::<S>).delete(routes::orders::remove::<S>),
        )
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/{id}",
            put(routes::products::update::<S>).delete(routes::products::remove::<S>),
        )
        .route(
            "/products/{id}/assignment",
            post(routes::products::assign::<S>).delete(routes::products::unassign::<S>),
        )
        .route("/categories", get(routes::categories::list::<S>))
        .route("/categories/{id}", get(routes::categories::get::<S>))
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

/// Creates the application state around a store and a notifier.
pub fn create_state<S: Store + Clone + 'static>(
    store: S,
    notifier: Arc<dyn OrderNotifier>,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        orders: OrderService::new(store.clone(), notifier),
        store,
    })
}
