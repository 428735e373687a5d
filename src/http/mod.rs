//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → request.rs (ParsedRequest snapshot)
//!     → [routing rewrites the path] → upstream call (hyper-util client)
//!     → response.rs (snapshots, header pass-through, cookie scrub)
//!     → [pipeline decides the body] → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{ParsedRequest, X_REQUEST_ID};
pub use response::{OutgoingResponse, ProxyResponseSnapshot, ServerResponseSnapshot};
pub use server::HttpServer;
