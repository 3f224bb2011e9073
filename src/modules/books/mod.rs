//! Book catalogue: models, validation, storage, service and HTTP routes.

pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod validation;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookstore_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use repository::BookStore;
use service::BookService;

pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self {
            service: Arc::new(BookService::new(store)),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![repository::mongo::unique_title_pages()]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create the books module over the given store
pub fn create_module(store: Arc<dyn BookStore>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store))
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_response(description: &str, wrapped: bool) -> serde_json::Value {
    let book = json!({ "$ref": "#/components/schemas/Book" });
    let schema = if wrapped {
        json!({ "type": "object", "properties": { "data": book }, "required": ["data"] })
    } else {
        book
    };
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema } }
    })
}

fn id_parameter() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "description": "24-character hexadecimal book identifier",
        "schema": { "type": "string" }
    })
}

fn request_body(schema: &str) -> serde_json::Value {
    json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": format!("#/components/schemas/{}", schema) }
            }
        }
    })
}

fn openapi_fragment() -> serde_json::Value {
    json!({
        "paths": {
            "": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "Every stored book",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "data": {
                                                "type": "array",
                                                "items": { "$ref": "#/components/schemas/Book" }
                                            }
                                        },
                                        "required": ["data"]
                                    }
                                }
                            }
                        },
                        "500": error_response("Storage unavailable")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": request_body("CreateBook"),
                    "responses": {
                        "201": book_response("Created book", false),
                        "400": error_response("Malformed body, invalid fields or duplicate book"),
                        "500": error_response("Storage unavailable")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Read a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": book_response("The book", true),
                        "400": error_response("Malformed identifier"),
                        "404": error_response("No such book"),
                        "500": error_response("Storage unavailable")
                    }
                },
                "put": {
                    "summary": "Partially update a book",
                    "description": "Absent members, an empty title and a zero page count leave the stored values unchanged.",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "requestBody": request_body("UpdateBook"),
                    "responses": {
                        "200": book_response("Updated book", false),
                        "400": error_response("Malformed identifier or body"),
                        "404": error_response("No such book"),
                        "500": error_response("Storage unavailable")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": {
                            "description": "Confirmation message",
                            "content": {
                                "application/json": { "schema": { "type": "string" } }
                            }
                        },
                        "400": error_response("Malformed identifier"),
                        "404": error_response("No such book"),
                        "500": error_response("Storage unavailable")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Book identifier" },
                        "title": { "type": "string" },
                        "pages": { "type": "integer", "format": "int64", "minimum": 1 },
                        "created_at": { "type": "string", "format": "date-time" },
                        "updated_at": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "title", "pages", "created_at", "updated_at"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "minLength": 1 },
                        "pages": { "type": "integer", "format": "int64", "minimum": 1 }
                    },
                    "required": ["title", "pages"]
                },
                "UpdateBook": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "pages": { "type": "integer", "format": "int64" }
                    }
                }
            }
        }
    })
}
