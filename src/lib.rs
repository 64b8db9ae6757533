//! # Taskflow
//!
//! Multi-user task lists whose tasks can be reordered within a list and
//! dragged between lists.
//!
//! This library provides:
//! - An HTTP API (axum + SQLite) that persists users, lists and tasks and
//!   keeps every ordering contiguous
//! - The client-side ordering & move engine: placement planning, optimistic
//!   application and reconciliation with the server
//! - A reqwest client that connects the two
//!
//! ## Architecture
//!
//! ```text
//!  drag events ──▶ BoardController ──▶ ApiClient ──HTTP──▶ api::router ──▶ Store (SQLite)
//!                   (board, drag FSM)   (TaskStore)
//! ```
//!
//! ## Modules
//! - `model`: tasks, lists and request payloads
//! - `board`: ordering model, move planner, drag state machine, reconciliation
//! - `store`: SQLite persistence with owner-scoped, transactional reordering
//! - `api`: REST routes and JWT auth
//! - `client`: HTTP implementation of the engine's storage trait
//! - `config`: environment configuration

pub mod api;
pub mod board;
pub mod client;
pub mod config;
pub mod model;
pub mod store;

pub use board::{Board, BoardController};
pub use client::ApiClient;
pub use config::Config;
