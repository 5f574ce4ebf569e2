//! Network layer: connectivity observation and the HTTP transport chain
//!
//! - [`connectivity`]: online/offline signal derivation, reachability
//!   probing, and latency-bucketed quality classification.
//! - [`transport`]: the [`transport::Transport`] trait plus the middleware
//!   chain (logging, retry, header injection) over a reqwest-backed HTTP
//!   transport.

pub mod connectivity;
pub mod transport;
