use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use aide::OperationIo;
use axum::{
    extract::{FromRequestParts, Query, Request},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::Response,
    Extension,
};
use serde::Deserialize;

use crate::types::{optional_var, AppError, ConfigError, Environment};

/// Prefix used when auth is disabled
pub const DEFAULT_UPLOAD_PREFIX: &str = "user1/";

/// The part of the bucket the caller may upload to, list and delete from
#[derive(Debug, Clone, PartialEq, Eq, OperationIo)]
pub struct UserScope {
    /// User the token belongs to
    pub user_id: String,
    /// Key prefix owned by the user, always ending in `/`
    pub prefix: String,
}

impl UserScope {
    /// Whether `key` lies inside this scope
    #[must_use]
    pub fn owns(&self, key: &str) -> bool {
        key.len() > self.prefix.len() && key.starts_with(&self.prefix)
    }
}

/// Axum extractor for the caller's scope
///
/// Only usable behind [`auth_middleware`], which puts the scope into the
/// request extensions.
impl<S> FromRequestParts<S> for UserScope
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            AppError::new(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                "Authentication required but user not found in request extensions",
                false,
            )
        })
    }
}

/// Token the caller authenticated with, handed to pages that call back into
/// the API. `None` when auth is disabled and no token was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessToken(pub Option<String>);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

/// Maps bearer tokens to per-user prefixes
#[derive(Clone, Default)]
pub struct AccessControl {
    tokens: HashMap<String, String>,
    prefix_root: String,
    fallback: Option<UserScope>,
}

impl AccessControl {
    /// Token-checked access. Each user owns `{prefix_root}{user_id}/`.
    #[must_use]
    pub fn new(tokens: HashMap<String, String>, prefix_root: impl Into<String>) -> Self {
        Self {
            tokens,
            prefix_root: prefix_root.into(),
            fallback: None,
        }
    }

    /// Every request is granted `prefix`, with or without a token
    #[must_use]
    pub fn disabled(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            fallback: Some(UserScope {
                user_id: prefix.trim_end_matches('/').to_string(),
                prefix,
            }),
            ..Self::default()
        }
    }

    /// Reads `ACCESS_TOKENS`, `UPLOAD_PREFIX_ROOT` and `UPLOAD_PREFIX`.
    ///
    /// `ACCESS_TOKENS` is a comma separated list of `token:user_id` pairs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for malformed pairs, user ids containing
    /// `/`, or prefixes not ending in `/`
    pub fn from_env(environment: &Environment) -> Result<Self, ConfigError> {
        if environment.disable_auth() {
            let prefix = optional_var("UPLOAD_PREFIX")
                .unwrap_or_else(|| DEFAULT_UPLOAD_PREFIX.to_string());
            if !prefix.ends_with('/') {
                return Err(ConfigError::Invalid {
                    name: "UPLOAD_PREFIX",
                    reason: "must end with '/'".to_string(),
                });
            }
            tracing::warn!("Authorization disabled, every caller is scoped to {prefix}");
            return Ok(Self::disabled(prefix));
        }

        let prefix_root = optional_var("UPLOAD_PREFIX_ROOT").unwrap_or_default();
        if !prefix_root.is_empty() && !prefix_root.ends_with('/') {
            return Err(ConfigError::Invalid {
                name: "UPLOAD_PREFIX_ROOT",
                reason: "must end with '/'".to_string(),
            });
        }

        let tokens = optional_var("ACCESS_TOKENS")
            .map(|raw| parse_tokens(&raw))
            .transpose()?
            .unwrap_or_default();

        if tokens.is_empty() {
            tracing::warn!("ACCESS_TOKENS is empty, every scoped request will be rejected");
        }

        Ok(Self::new(tokens, prefix_root))
    }

    /// Resolves a bearer token to the caller's scope
    #[must_use]
    pub fn resolve(&self, token: Option<&str>) -> Option<UserScope> {
        if let Some(fallback) = &self.fallback {
            return Some(fallback.clone());
        }

        let user_id = self.tokens.get(token?)?;
        Some(UserScope {
            user_id: user_id.clone(),
            prefix: format!("{}{user_id}/", self.prefix_root),
        })
    }
}

impl fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessControl")
            .field("tokens", &self.tokens.len())
            .field("prefix_root", &self.prefix_root)
            .field("fallback", &self.fallback)
            .finish()
    }
}

fn parse_tokens(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (token, user_id) = pair
                .split_once(':')
                .map(|(token, user_id)| (token.trim(), user_id.trim()))
                .filter(|(token, user_id)| !token.is_empty() && !user_id.is_empty())
                .ok_or_else(|| ConfigError::Invalid {
                    name: "ACCESS_TOKENS",
                    reason: "expected comma separated token:user_id pairs".to_string(),
                })?;

            if user_id.contains('/') {
                return Err(ConfigError::Invalid {
                    name: "ACCESS_TOKENS",
                    reason: format!("user id {user_id} must not contain '/'"),
                });
            }

            Ok((token.to_string(), user_id.to_string()))
        })
        .collect()
}

/// Reads the bearer token from the `Authorization` header, falling back to the
/// `access_token` query parameter so the upload page can be opened from an
/// address bar.
fn request_token(request: &Request) -> Option<String> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::to_string);

    header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(query)| query.access_token)
    })
    .filter(|token| !token.is_empty())
}

/// Bearer token authorization middleware
///
/// This middleware:
/// 1. Extracts the Bearer token from the Authorization header or the
///    `access_token` query parameter
/// 2. Resolves it to a `UserScope` through `AccessControl`
/// 3. Adds the scope and the token to request extensions
/// 4. Returns 401 for missing or unknown tokens
///
/// # Errors
///
/// - `AppError` - Invalid/missing token with 401 status code
pub async fn auth_middleware(
    Extension(access): Extension<Arc<AccessControl>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_token(&request);

    let scope = access.resolve(token.as_deref()).ok_or_else(|| {
        if token.is_none() {
            AppError::new(
                StatusCode::UNAUTHORIZED,
                "missing_token",
                "Authorization header must contain a valid Bearer token",
                false,
            )
        } else {
            AppError::new(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid or expired token",
                false,
            )
        }
    })?;

    tracing::Span::current().record("user_id", scope.user_id.as_str());
    request.extensions_mut().insert(scope);
    request.extensions_mut().insert(AccessToken(token));

    Ok(next.run(request).await)
}
