//! HTTP API: auth, lists and tasks under `/api`.

mod auth;
mod lists;
mod routes;
mod tasks;
pub mod types;

pub use auth::AuthUser;
pub use routes::{router, serve, AppState};
