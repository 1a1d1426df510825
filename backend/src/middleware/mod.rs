pub mod auth;

pub use auth::{auth_middleware, AccessControl, AccessToken, UserScope, DEFAULT_UPLOAD_PREFIX};
