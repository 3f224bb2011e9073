//! HTTP server facade for the bookstore service: routing, middleware, error
//! envelope and the listen/drain lifecycle.

use anyhow::Context;
use axum::{routing::get, Router};
use std::future::Future;

use bookstore_kernel::{settings::Settings, ModuleRegistry};

pub mod error;
pub mod lifecycle;
pub mod router;

use lifecycle::{DrainOutcome, Lifecycle};
use router::{RouterBuilder, API_PREFIX};

/// Fixed liveness payload, independent of storage availability.
pub const PONG: &str = "Pong!";

/// Bind the configured address and serve every registered module until
/// `shutdown` resolves, then drain within the lifecycle's timeout.
pub async fn start_server<F>(
    registry: &ModuleRegistry,
    settings: &Settings,
    lifecycle: &Lifecycle,
    shutdown: F,
) -> anyhow::Result<DrainOutcome>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = settings.bind_address();
    tracing::info!("starting HTTP server on {}", address);

    let app = build_router(registry, settings).context("failed to build HTTP router")?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to address {}", address))?;

    tracing::info!("HTTP server listening on http://{}", address);

    lifecycle.serve(listener, app, shutdown).await
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<Router> {
    let mut router_builder = RouterBuilder::new()
        .route("/health", get(health_check))
        .route(&format!("{}/ping", API_PREFIX), get(health_check));

    for module in registry.modules() {
        let module_name = module.name();
        tracing::info!(
            module = module_name,
            "mounting module routes under {}/{}",
            API_PREFIX,
            module_name
        );
        router_builder = router_builder.mount_module(module_name, module.routes());
    }

    let router = router_builder
        .with_openapi(registry)
        .with_timeout(settings.server.request_timeout_ms)
        .with_cors(&settings.cors)?
        .with_tracing()
        .with_request_id()
        .build();

    Ok(router)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    PONG
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_answers_pong_without_modules() {
        let router = build_router(&ModuleRegistry::new(), &Settings::default()).unwrap();

        for uri in ["/health", "/api/v1/ping"] {
            let request = axum::http::Request::builder()
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = router.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&bytes[..], PONG.as_bytes());
        }
    }

    #[tokio::test]
    async fn unreachable_bind_address_is_an_error() {
        let mut settings = Settings::default();
        settings.server.host = "256.256.256.256".to_string();
        let lifecycle = Lifecycle::new(std::time::Duration::from_millis(10));

        let err = start_server(&ModuleRegistry::new(), &settings, &lifecycle, async {})
            .await
            .unwrap_err();

        assert!(err.to_string().contains("failed to bind"));
    }
}
