//! Backend API access
//!
//! Typed client for the todo backend's auth, todo and user routes.

mod client;
pub mod types;

pub use client::{lookup, ApiClient, ApiResponse};
pub use types::*;
