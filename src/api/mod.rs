//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the REST API of the order intake service using Axum.
// It is a thin mapping from HTTP requests onto the order service.
//
// | Component      | Description                                                |
// |----------------|------------------------------------------------------------|
// | API            | Main API structure coordinating routes and services        |
// | Routes         | Handler functions for API endpoints                        |
// | States         | Shared application state                                   |
// | DTOs           | HTTP-only request/response bodies                          |
//
//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name           | Description                                       | Key Methods       |
// |----------------|---------------------------------------------------|-------------------|
// | AppState       | Shared application state                          | new               |
// | Api            | Main API structure                                | routes, serve     |
// | ApiError       | API error types                                   | into_response     |
//--------------------------------------------------------------------------------------------------

mod dto;
mod error;
mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Extension, Router,
    http::{Method, header},
    routing::{get, patch},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::domain::services::order_service::OrderService;

pub use dto::{HealthResponse, UpdateOrderStatusRequest};
pub use error::{ApiError, ApiResult};

/// Shared application state accessible by all handlers
pub struct AppState {
    pub order_service: Arc<dyn OrderService>,
}

impl AppState {
    pub fn new(order_service: Arc<dyn OrderService>) -> Self {
        Self { order_service }
    }
}

/// Main API structure
pub struct Api {
    /// API address
    addr: SocketAddr,
    /// Shared application state
    state: Arc<AppState>,
}

impl Api {
    /// Creates a new API instance
    pub fn new(addr: SocketAddr, order_service: Arc<dyn OrderService>) -> Self {
        let state = Arc::new(AppState::new(order_service));
        Self { addr, state }
    }

    /// Creates all routes for the API
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers([header::LOCATION]);

        Router::new()
            // Health check
            .route("/health", get(routes::health))
            // Order management
            .route(
                "/api/orders",
                get(routes::get_all_orders).post(routes::create_order),
            )
            .route(
                "/api/orders/:id",
                get(routes::get_order).delete(routes::delete_order),
            )
            .route("/api/orders/:id/status", patch(routes::update_order_status))
            // Attach application state
            .layer(Extension(self.state.clone()))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Starts the API server and runs until `shutdown` resolves
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound or the server fails
    pub async fn serve<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.routes();

        let listener = TcpListener::bind(self.addr).await?;
        info!("API listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API stopped");
        Ok(())
    }
}
