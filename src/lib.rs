//! chatterd - multi-process chat routing daemon.
//!
//! Several independent chatterd processes present one logical chat service.
//! Each process owns its live client connections; rooms, sessions, and
//! subscriptions live in a shared directory, and cross-process delivery rides
//! a publish/subscribe bus. See DESIGN.md for the full architecture.

pub mod auth;
pub mod bus;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod network;
pub mod state;
