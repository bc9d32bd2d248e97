//! Front Desk API Library Crate
//!
//! This library contains the web service around the live session gateway:
//! configuration, shared state, HTTP handlers, routing, and the WebSocket
//! logic. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
