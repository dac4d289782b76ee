//! REST API module for the huddle service
//!
//! Exposes transcript Q&A, smart replies and document upload over HTTP.
//! Uses axum for routing and schemars for request schema generation.

pub mod handlers;
pub mod middleware;
pub mod routing;
pub mod services;
pub mod startup;
pub mod state;
pub mod types;
