//! Price Editor web surface
//!
//! The editor page, CSV download and a small JSON API, served with axum.
//! Run with `price-editor serve`.

pub mod handlers;
pub mod page;
pub mod server;

pub use server::{build_router, run_server, AppState};
