//! Line selection and signal routing.
//!
//! A line is one (transport, path) pair. The router keeps the selected line
//! per action and hands every signal to the venue from a spawned task.
//!
//! # Key Components
//!
//! - [`LineRouter`]: Selected-line store plus place/amend/cancel routing
//! - [`DispatchHandle`]: Observable fire-and-forget dispatch
//! - [`ensure_stream_logged_in`]: Bounded request-stream login
//!
//! # Routing order (in `LineRouter::resolve`)
//!
//! 1. Signal pinned to REST -> REST over the selected path, no feature check
//! 2. Selected colo route unsupported -> same transport over the normal path
//! 3. Otherwise -> the selected line as is

pub mod config;
pub mod dispatch;
pub mod error;
pub mod line_router;
pub mod login;

pub use config::RouterConfig;
pub use dispatch::{DispatchHandle, DispatchOutcome};
pub use error::{RouterError, RouterResult};
pub use line_router::{LineRouter, LOGIN_FAILED_REASON};
pub use login::ensure_stream_logged_in;
