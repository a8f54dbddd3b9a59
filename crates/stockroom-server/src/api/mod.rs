//! Top-level HTTP router
//!
//! Mounts the feature routes under `/api/v1`, the health check at the root,
//! and the shared middleware stack.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::db;
use crate::features::{self, FeatureState};
use crate::middleware;

/// Application state for the top-level routes
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
}

/// Create the application router with all routes and middleware
pub fn create_router(db: PgPool, feature_state: FeatureState, config: &Config) -> Router {
    let feature_routes = features::router(feature_state);

    Router::new()
        .route("/health", get(health_check))
        .with_state(AppState { db })
        .nest("/api/v1", feature_routes)
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Health check handler; 503 when the database is unreachable
async fn health_check(State(state): State<AppState>) -> Response {
    match db::health_check(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "disconnected"
                })),
            )
                .into_response()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::testing::{InMemoryImportJobRepository, InMemoryQueue};
    use crate::storage::UploadStorage;
    use axum::body::Body;
    use axum::http::Request;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn unreachable_pool() -> PgPool {
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgresql://stockroom@127.0.0.1:1/stockroom")
            .unwrap()
    }

    fn app(upload_dir: &std::path::Path) -> Router {
        let feature_state = FeatureState {
            repository: Arc::new(InMemoryImportJobRepository::new()),
            queue: Arc::new(InMemoryQueue::new()),
            storage: UploadStorage::new(upload_dir),
            max_upload_bytes: 1024,
        };
        create_router(unreachable_pool(), feature_state, &Config::default())
    }

    #[tokio::test]
    async fn test_health_reports_unreachable_database() {
        let dir = tempfile::tempdir().unwrap();

        let response = app(dir.path())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_imports_are_mounted_under_api_v1() {
        let dir = tempfile::tempdir().unwrap();

        let response = app(dir.path())
            .oneshot(Request::builder().uri("/api/v1/imports").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
