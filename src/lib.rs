//! Bookstore application library
//!
//! Wires the book catalogue module onto the kernel, the document store and the
//! HTTP server.

pub mod app;
pub mod modules;
