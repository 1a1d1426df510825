//! Image bucket backend
//!
//! Hands browsers presigned POST policies so uploads go straight to S3, and
//! lists or deletes the caller's objects under their own key prefix.

#![deny(clippy::all)]
#![warn(clippy::pedantic, clippy::nursery)]

/// Object storage adapter
pub mod bucket;

/// Request authorization
pub mod middleware;

/// HTTP routes
pub mod routes;

/// Server bootstrap
pub mod server;

/// Configuration and error types
pub mod types;
