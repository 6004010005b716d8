//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → headers.rs (allow-list per policy, rewrite Referer, inject defaults)
//!     → upstream
//! Response:
//!     → headers.rs (strip hop-by-hop, add CORS + security headers)
//!     → client
//! ```
//!
//! # Design Decisions
//! - No trust in client input: only allow-listed headers leave the proxy
//! - Hop-by-hop headers are stripped in both directions

pub mod headers;
