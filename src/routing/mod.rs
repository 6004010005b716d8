//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (literal pages, then /proxy/, then registry)
//!     → registry.rs (prefix → upstream base)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: RouteMatch (page, passthrough, api, not found)
//!
//! Route Compilation (at startup):
//!     UpstreamConfig[]
//!     → Compile prefix matchers
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Longest registered prefix wins; prefixes only match whole segments

pub mod matcher;
pub mod registry;
pub mod router;

pub use registry::{Upstream, UpstreamRegistry};
pub use router::{Page, RouteMatch, Router, PROXY_PREFIX};
