//! HTTP API for cloudshelf.
//!
//! Thin transport over [`crate::resource::ResourceService`]: query parsing, bearer token
//! verification, JSON shaping and status mapping.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::{create_app, create_router};
pub use server::WebServer;
