//! Bearer authentication middleware.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::{Authenticator, Identity};
use crate::web::error::ApiError;

/// Authenticator shared through request extensions.
pub type SharedAuthenticator = Arc<dyn Authenticator>;

/// Raw bearer credential taken from the request.
///
/// Read from the `Authorization: Bearer` header, falling back to a `token`
/// query parameter for WebSocket upgrades where browsers cannot set headers.
#[derive(Debug, Clone)]
pub struct BearerCredential(pub String);

impl BearerCredential {
    fn from_parts(parts: &Parts) -> Option<Self> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(token) = header {
            return Some(Self(token));
        }

        let query = parts.uri.query().unwrap_or("");
        query.split('&').find_map(|pair| {
            let mut kv = pair.splitn(2, '=');
            let key = kv.next()?;
            let value = kv.next()?;
            if key == "token" && !value.is_empty() {
                urlencoding::decode(value).ok().map(|s| Self(s.into_owned()))
            } else {
                None
            }
        })
    }
}

impl<S> FromRequestParts<S> for BearerCredential
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            Self::from_parts(parts).ok_or_else(|| ApiError::unauthorized("Missing authorization"))
        })
    }
}

/// Extractor for authenticated users.
///
/// Use this extractor to require authentication for a handler.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let BearerCredential(token) = BearerCredential::from_parts(parts)
                .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

            // Set by `auth_layer`
            let authenticator = parts
                .extensions
                .get::<SharedAuthenticator>()
                .ok_or_else(|| ApiError::internal("Authenticator not configured"))?;

            let identity = authenticator.authenticate(&token)?;
            Ok(AuthUser(identity))
        })
    }
}

/// Middleware function to inject the authenticator into request extensions.
pub async fn auth_layer(
    authenticator: SharedAuthenticator,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(authenticator);
    next.run(request).await
}
