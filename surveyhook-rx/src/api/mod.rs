//! HTTP API handlers for surveyhook-rx

pub mod health;
pub mod webhook;

pub use health::health_routes;
pub use webhook::webhook_routes;
