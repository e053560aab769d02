//! Daemon side of the priority scaler: configuration and the HTTP API

pub mod api;
pub mod config;
