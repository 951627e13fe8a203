//! Conversation sessions.
//!
//! A `Session` owns one conversation's history and usage counters. The
//! `SessionController` maps session ids to sessions and starts at most one
//! agent loop per session at a time.

mod controller;
mod types;


pub use controller::SessionController;
pub use types::{BusyGuard, Session};
