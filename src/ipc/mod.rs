mod error;
mod handlers;
mod helpers;
mod page;
mod router;
mod types;

pub use router::handle_request;
pub use types::{AppState, Request};
