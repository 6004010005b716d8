//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → request.rs (request ID, proxy origin)
//!     → [routing layer classifies the path]
//!     → pages.rs | passthrough.rs | api.rs
//!     → client.rs (upstream call)
//!     → response.rs (relay headers)
//!     → Send to client
//! ```

pub mod api;
pub mod client;
pub mod pages;
pub mod passthrough;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
