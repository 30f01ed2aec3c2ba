//! docker-netview - network identity resolution and resource views
//!
//! This library resolves user supplied network references against a host-local
//! network backend and a cluster manager, builds Engine API network resources,
//! and routes network mutations to the backend that owns them.

pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
pub mod network;

pub use error::AppError;
