use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    models::Role,
    repository::RepositoryState,
};

/// Name of the http-only cookie that carries the session JWT for browser clients.
pub const SESSION_COOKIE: &str = "session_token";

/// Claims
///
/// Payload of a session JWT, signed with `AppConfig::session_secret`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: Uuid,
    /// Unix seconds after which the token is rejected.
    pub exp: usize,
    /// Unix seconds at issuance.
    pub iat: usize,
}

/// Identity
///
/// The resolved caller of a request. Resolved once per request; an anonymous caller
/// is represented by the absence of an `Identity`, never by a placeholder value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
    pub active: bool,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// IdentityResolver
///
/// The session/identity provider seam. Implementations turn request headers into the
/// caller's identity. Any failure (missing, malformed or expired token, unknown or
/// disabled account) resolves to `None`.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// IdentityState
///
/// The concrete type used to share the identity provider across the application state.
pub type IdentityState = Arc<dyn IdentityResolver>;

/// JwtIdentityResolver
///
/// Resolves callers from an HS256 session JWT, taken from the `Authorization: Bearer`
/// header or, failing that, the `session_token` cookie. The subject is looked up in the
/// store on every request so that role changes and disabled accounts take effect
/// immediately rather than at token expiry.
pub struct JwtIdentityResolver {
    repo: RepositoryState,
    config: AppConfig,
}

impl JwtIdentityResolver {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self { repo, config }
    }

    async fn load(&self, user_id: Uuid) -> Option<Identity> {
        match self.repo.get_user(user_id).await {
            Ok(Some(user)) if user.is_active => Some(Identity {
                id: user.id,
                role: user.role,
                active: user.is_active,
            }),
            Ok(Some(_)) => {
                tracing::debug!(%user_id, "session belongs to a disabled account");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::error!("identity lookup failed: {:?}", e);
                None
            }
        }
    }

    fn token<'a>(&self, headers: &'a HeaderMap, jar: &'a CookieJar) -> Option<&'a str> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        bearer.or_else(|| jar.get(SESSION_COOKIE).map(|cookie| cookie.value()))
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        // Local development bypass: a known account id in `x-user-id` is trusted as-is.
        if self.config.env == Env::Local {
            let bypass = headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());
            if let Some(user_id) = bypass {
                if let Some(identity) = self.load(user_id).await {
                    return Some(identity);
                }
            }
        }

        let jar = CookieJar::from_headers(headers);
        let token = self.token(headers, &jar)?;

        let decoding_key = DecodingKey::from_secret(self.config.session_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("session token expired"),
                    _ => tracing::debug!("rejected session token: {}", e),
                }
                return None;
            }
        };

        self.load(claims.sub).await
    }
}

/// ResolvedCaller
///
/// Request extension written by the route gate middleware so a classified page does
/// not resolve its caller twice.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedCaller(pub Option<Identity>);

/// Caller
///
/// Extractor yielding the current caller, or `None` for anonymous requests. It never
/// rejects: whether an anonymous caller may proceed is the action authorizer's decision.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Option<Identity>);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    IdentityState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ResolvedCaller(identity)) = parts.extensions.get::<ResolvedCaller>() {
            return Ok(Caller(*identity));
        }

        let resolver = IdentityState::from_ref(state);
        Ok(Caller(resolver.resolve(&parts.headers).await))
    }
}
