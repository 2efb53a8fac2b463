//! Gerai API library.
//!
//! This crate provides the order backend as a library so the HTTP server
//! (`gerai-api`) and the payment reconciliation worker (`gerai-worker`)
//! can share the same repositories, service clients, and queue.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod queue;
pub mod routes;
pub mod services;
pub mod state;
