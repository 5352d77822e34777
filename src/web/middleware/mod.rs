//! Middleware for the HTTP surface.

pub mod auth;
pub mod cors;

pub use auth::{auth_layer, AuthUser, BearerCredential, SharedAuthenticator};
pub use cors::create_cors_layer;
