//! HTTP API for the record-advance exchange
//!
//! - GET / - First unprocessed record (seeds the operator session)
//! - POST /advance - Submit the current recording, receive the next record
//! - GET /health - Health check
//!
//! The server is stateless across requests: the `current_row` field the
//! client round-trips on every advance is the sole continuation token.

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, TerminalResponse, NO_MORE_RECORDS};
pub use routes::create_router;
pub use state::AppState;
