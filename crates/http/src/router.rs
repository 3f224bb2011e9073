//! Router builder for the bookstore HTTP server
//!
//! Layers only wrap the routes added before them, so callers add routes, module
//! routers and documentation first and middleware last.

use anyhow::Context;
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue, Method, Response, StatusCode},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, TraceLayer},
};
use tracing::Span;
use uuid::{Timestamp, Uuid};

use bookstore_kernel::{settings::CorsSettings, ModuleRegistry};

/// Prefix every module router is nested under.
pub const API_PREFIX: &str = "/api/v1";

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router under `/api/v1/{module_name}`
    pub fn mount_module(mut self, module_name: &str, module_router: Router) -> Self {
        let api_path = format!("{}/{}", API_PREFIX, module_name);
        self.router = self.router.nest(&api_path, module_router);
        self
    }

    /// Add tracing middleware. Responses are logged at INFO, client errors at
    /// WARN and server errors at ERROR.
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(tracing::Level::DEBUG))
                .on_response(|response: &Response<Body>, latency: Duration, _span: &Span| {
                    let status = response.status().as_u16();
                    let latency_ms = latency.as_millis() as u64;
                    if response.status().is_server_error() {
                        tracing::error!(status, latency_ms, "request failed");
                    } else if response.status().is_client_error() {
                        tracing::warn!(status, latency_ms, "request rejected");
                    } else {
                        tracing::info!(status, latency_ms, "request completed");
                    }
                }),
        );
        self
    }

    /// Add CORS middleware from the configured policy
    pub fn with_cors(mut self, settings: &CorsSettings) -> anyhow::Result<Self> {
        let methods = settings
            .allowed_methods
            .iter()
            .map(|m| {
                m.parse::<Method>()
                    .with_context(|| format!("invalid CORS method '{}'", m))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let allowed_headers = parse_header_names(&settings.allowed_headers)?;
        let exposed_headers = parse_header_names(&settings.exposed_headers)?;

        let mut cors = CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(allowed_headers)
            .expose_headers(exposed_headers)
            .max_age(Duration::from_secs(settings.max_age_secs));

        if settings.allows_any_origin() {
            if settings.allow_credentials {
                tracing::warn!("CORS credentials are not allowed together with a wildcard origin");
            }
            cors = cors.allow_origin(Any);
        } else {
            let origins = settings
                .allowed_origins
                .iter()
                .map(|o| {
                    o.parse::<HeaderValue>()
                        .with_context(|| format!("invalid CORS origin '{}'", o))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            cors = cors
                .allow_origin(origins)
                .allow_credentials(settings.allow_credentials);
        }

        self.router = self.router.layer(cors);
        Ok(self)
    }

    /// Add request ID middleware: generate `x-request-id` when absent and echo it
    /// on the response
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));
        self
    }

    /// Add timeout middleware. Requests exceeding the limit answer 408.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self.router.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_millis(timeout_ms),
        ));
        self
    }

    /// Add OpenAPI documentation by collecting specs from all modules
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        let openapi_spec = merged_openapi(registry);

        // Deserialize our JSON spec into a proper utoipa OpenApi object
        // This allows SwaggerUI to serve it correctly
        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(openapi_spec.clone())
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "merged OpenAPI document is not valid; serving a stub");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title("Bookstore API")
                            .version("1.0.0")
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );

        // Also serve the raw JSON spec at /docs/openapi.json for external consumers
        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(openapi_spec.clone()) }),
        );

        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_header_names(names: &[String]) -> anyhow::Result<Vec<HeaderName>> {
    names
        .iter()
        .map(|h| {
            h.parse::<HeaderName>()
                .with_context(|| format!("invalid CORS header '{}'", h))
        })
        .collect()
}

/// Base document plus the paths and schemas every module contributes. Module
/// paths are prefixed with their mount point.
fn merged_openapi(registry: &ModuleRegistry) -> serde_json::Value {
    let mut openapi_spec = serde_json::json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Bookstore API",
            "version": "1.0.0",
            "description": "Book catalogue service"
        },
        "paths": {},
        "components": {
            "schemas": {}
        }
    });

    openapi_spec["components"]["schemas"]["ErrorResponse"] = serde_json::json!({
        "type": "object",
        "properties": {
            "error": { "type": "string" },
            "code": { "type": "string" },
            "details": { "type": "array", "items": {} },
            "trace_id": { "type": "string" },
            "timestamp": { "type": "string" }
        },
        "required": ["error", "code", "trace_id", "timestamp"]
    });

    openapi_spec["paths"]["/health"] = serde_json::json!({
        "get": {
            "summary": "Liveness probe",
            "responses": {
                "200": {
                    "description": "OK",
                    "content": {
                        "text/plain": {
                            "schema": { "type": "string" }
                        }
                    }
                }
            }
        }
    });

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_spec.get("paths").and_then(|p| p.as_object()) {
            for (path, path_item) in paths {
                let prefixed_path = format!("{}/{}{}", API_PREFIX, module.name(), path);
                openapi_spec["paths"][prefixed_path] = path_item.clone();
            }
        }

        if let Some(schemas) = module_spec
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.as_object())
        {
            for (schema_name, schema_def) in schemas {
                openapi_spec["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    openapi_spec
}

/// Request ID generator producing time-ordered UUIDs
#[derive(Clone)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let timestamp = Timestamp::now(uuid::NoContext);
        let request_id = Uuid::new_v7(timestamp)
            .to_string()
            .parse::<HeaderValue>()
            .ok()?;
        Some(RequestId::new(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{header, StatusCode};
    use bookstore_kernel::Module;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct ShelfModule;

    #[async_trait]
    impl Module for ShelfModule {
        fn name(&self) -> &'static str {
            "shelves"
        }

        fn routes(&self) -> Router {
            Router::new().route("/", get(|| async { "shelves" }))
        }

        fn openapi(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({
                "paths": { "/": { "get": { "summary": "List shelves", "responses": {} } } },
                "components": { "schemas": { "Shelf": { "type": "object" } } }
            }))
        }
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_router_builder_basic() {
        let router = RouterBuilder::new()
            .route("/test", get(|| async { "test" }))
            .build();

        let response = router.oneshot(get_request("/test")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_module_mounting() {
        let module_router = Router::new().route("/", get(|| async { "module" }));

        let router = RouterBuilder::new()
            .mount_module("test", module_router)
            .build();

        let response = router.oneshot(get_request("/api/v1/test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_chain() {
        let router = RouterBuilder::new()
            .route("/health", get(|| async { "ok" }))
            .with_timeout(5000)
            .with_cors(&CorsSettings::default())
            .unwrap()
            .with_tracing()
            .with_request_id()
            .build();

        let response = router.oneshot(get_request("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response.headers().get("x-request-id").unwrap();
        assert!(Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_slow_request_answers_request_timeout() {
        let router = RouterBuilder::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .with_timeout(20)
            .build();

        let response = router.oneshot(get_request("/slow")).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_cors_preflight_for_listed_origin() {
        let settings = CorsSettings {
            allowed_origins: vec!["https://books.example".to_string()],
            allow_credentials: true,
            ..CorsSettings::default()
        };
        let router = RouterBuilder::new()
            .route("/health", get(|| async { "ok" }))
            .with_cors(&settings)
            .unwrap()
            .build();

        let request = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/health")
            .header(header::ORIGIN, "https://books.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://books.example"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[test]
    fn test_invalid_cors_method_is_rejected() {
        let settings = CorsSettings {
            allowed_methods: vec!["NOT A METHOD".to_string()],
            ..CorsSettings::default()
        };

        assert!(RouterBuilder::new().with_cors(&settings).is_err());
    }

    #[test]
    fn test_openapi_merges_module_paths() {
        let mut registry = ModuleRegistry::new();
        registry.register_custom(Arc::new(ShelfModule));

        let spec = merged_openapi(&registry);

        assert!(spec["paths"]["/api/v1/shelves/"]["get"].is_object());
        assert!(spec["paths"]["/health"]["get"].is_object());
        assert!(spec["components"]["schemas"]["Shelf"].is_object());
        assert!(spec["components"]["schemas"]["ErrorResponse"].is_object());
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let mut registry = ModuleRegistry::new();
        registry.register_custom(Arc::new(ShelfModule));

        let router = RouterBuilder::new().with_openapi(&registry).build();
        let response = router
            .oneshot(get_request("/docs/openapi.json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
