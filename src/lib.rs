//! figma-fetch - authenticated, cached access to Figma design files
//!
//! The access layer: OAuth2 authorization-code flow with refresh, a static
//! personal-token alternative, request dispatch against the REST API, and a
//! local cache of fetched files.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::FigmaAccess;
pub use auth::{AuthManager, AuthMode, Credentials, OAuthCredentials, TokenState};
pub use cache::DocumentCache;
pub use error::AccessError;
