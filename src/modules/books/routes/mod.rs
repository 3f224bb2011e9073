//! HTTP handlers for `/api/v1/books`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use bookstore_http::error::AppError;

use super::models::{Book, CreateBook, UpdateBook};
use super::service::BookService;

/// Confirmation body returned by a successful delete.
pub const DELETED: &str = "book deleted";

type ApiResult<T> = Result<T, AppError>;

/// Envelope for successful reads.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

pub fn router(service: Arc<BookService>) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .with_state(service)
}

async fn list_books(State(service): State<Arc<BookService>>) -> ApiResult<Json<Data<Vec<Book>>>> {
    let books = service.read_all().await?;
    Ok(Json(Data { data: books }))
}

async fn get_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Data<Book>>> {
    let book = service.read_by_id(&id).await?;
    Ok(Json(Data { data: book }))
}

async fn create_book(
    State(service): State<Arc<BookService>>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let Json(request) = payload?;
    let book = service.create(request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBook>, JsonRejection>,
) -> ApiResult<Json<Book>> {
    let Json(patch) = payload?;
    let book = service.update(&id, patch).await?;
    Ok(Json(book))
}

async fn delete_book(
    State(service): State<Arc<BookService>>,
    Path(id): Path<String>,
) -> ApiResult<Json<&'static str>> {
    service.delete(&id).await?;
    Ok(Json(DELETED))
}
