//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Resolve with hooks → Start metrics → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C / SIGTERM → Shutdown::trigger → stop accepting → drain in-flight → exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal before the first request
//! - Listeners start last (traffic only when ready)

pub mod shutdown;

pub use shutdown::Shutdown;
