//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Catch-panic (500 with a retry hint)
//! 2. Sentry layers (hub per request, HTTP transaction)
//! 3. `TraceLayer` (request tracing)
//! 4. Request ID (propagate or generate `x-request-id`)
//! 5. Session layer (tower-sessions with in-memory store)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{OptionalAuth, RequireAdmin, RequireAuth};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
