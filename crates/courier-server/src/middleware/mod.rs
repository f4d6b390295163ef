//! Router-level middleware.
//!
//! Apply in this order, so recovery wraps everything:
//!
//! ```rust,ignore
//! routes(state)
//!     .with_cors(&cors)
//!     .with_recovery(request_timeout);
//! ```

mod cors;
mod recovery;

pub use cors::{CorsConfig, RouterCorsExt};
pub use recovery::RouterRecoveryExt;
