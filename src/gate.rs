use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::{Identity, IdentityState, ResolvedCaller};

/// PathClass
///
/// The protection class of a page route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Only meaningful to anonymous visitors (sign-in, sign-up).
    AuthOnly,
    /// Requires any signed-in account.
    Member,
    /// Requires an administrator.
    Admin,
}

/// GateDecision
///
/// Redirects are issued as 307 Temporary Redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(String),
}

/// GateConfig
///
/// The three prefix sets plus the two redirect targets.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub auth_only: Vec<String>,
    pub member: Vec<String>,
    pub admin: Vec<String>,
    pub home: String,
    pub sign_in: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            auth_only: vec!["/auth/signin".to_string(), "/auth/signup".to_string()],
            member: vec!["/prayer".to_string(), "/profile".to_string()],
            admin: vec!["/admin".to_string()],
            home: "/".to_string(),
            sign_in: "/auth/signin".to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateConfigError {
    #[error("route prefixes overlap: {0} and {1}")]
    Overlap(String, String),

    #[error("route prefix must start with '/' and must not end with one: {0}")]
    InvalidPrefix(String),
}

/// RouteGate
///
/// Path-based page authorization. Holds the validated prefix table; immutable after
/// construction and shared through `AppState`.
#[derive(Debug)]
pub struct RouteGate {
    // (prefix, class), sorted longest prefix first.
    prefixes: Vec<(String, PathClass)>,
    home: String,
    sign_in: String,
}

impl RouteGate {
    /// new
    ///
    /// Validates the prefix sets. Two prefixes overlap when one is a segment prefix of
    /// the other (including duplicates); overlapping sets would make a path's class
    /// depend on table order, so they are rejected outright.
    pub fn new(config: GateConfig) -> Result<Self, GateConfigError> {
        let mut prefixes: Vec<(String, PathClass)> = Vec::new();
        let sets = [
            (config.auth_only, PathClass::AuthOnly),
            (config.member, PathClass::Member),
            (config.admin, PathClass::Admin),
        ];

        for (set, class) in sets {
            for prefix in set {
                if !prefix.starts_with('/') || (prefix.len() > 1 && prefix.ends_with('/')) {
                    return Err(GateConfigError::InvalidPrefix(prefix));
                }
                if let Some((existing, _)) = prefixes.iter().find(|(existing, _)| {
                    segment_prefix(existing, &prefix) || segment_prefix(&prefix, existing)
                }) {
                    return Err(GateConfigError::Overlap(existing.clone(), prefix));
                }
                prefixes.push((prefix, class));
            }
        }

        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Ok(Self {
            prefixes,
            home: config.home,
            sign_in: config.sign_in,
        })
    }

    /// Longest-prefix classification; `None` means the path is not gated.
    pub fn classify(&self, path: &str) -> Option<PathClass> {
        self.prefixes
            .iter()
            .find(|(prefix, _)| segment_prefix(prefix, path))
            .map(|(_, class)| *class)
    }

    /// decide
    ///
    /// The gate's decision table. Pure: the caller has already been resolved.
    pub fn decide(&self, path: &str, caller: Option<&Identity>) -> GateDecision {
        match (self.classify(path), caller) {
            (None, _) => GateDecision::Allow,
            (Some(PathClass::AuthOnly), Some(_)) => GateDecision::Redirect(self.home.clone()),
            (Some(PathClass::AuthOnly), None) => GateDecision::Allow,
            (Some(PathClass::Member), Some(_)) => GateDecision::Allow,
            (Some(PathClass::Admin), Some(identity)) if identity.is_admin() => GateDecision::Allow,
            (Some(PathClass::Admin), Some(_)) => GateDecision::Redirect(self.home.clone()),
            (Some(PathClass::Member | PathClass::Admin), None) => {
                GateDecision::Redirect(self.sign_in_with_callback(path))
            }
        }
    }

    fn sign_in_with_callback(&self, path: &str) -> String {
        match serde_urlencoded::to_string([("callbackUrl", path)]) {
            Ok(query) => format!("{}?{}", self.sign_in, query),
            Err(e) => {
                tracing::warn!("could not encode callback url {}: {}", path, e);
                self.sign_in.clone()
            }
        }
    }
}

/// `prefix` matches `path` when it is equal to it or is followed by a `/` in it.
fn segment_prefix(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// GateState
///
/// Everything the gate middleware needs from the application state.
#[derive(Clone)]
pub struct GateState {
    pub gate: Arc<RouteGate>,
    pub identity: IdentityState,
}

/// route_gate
///
/// Middleware applied to the whole router. Unclassified paths are forwarded without
/// touching the identity provider. For classified paths the resolved caller is stored
/// in the request extensions for the `Caller` extractor.
pub async fn route_gate(State(state): State<GateState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if state.gate.classify(&path).is_none() {
        return next.run(req).await;
    }

    let caller = state.identity.resolve(req.headers()).await;
    match state.gate.decide(&path, caller.as_ref()) {
        GateDecision::Allow => {
            req.extensions_mut().insert(ResolvedCaller(caller));
            next.run(req).await
        }
        GateDecision::Redirect(location) => {
            tracing::debug!(%path, %location, authenticated = caller.is_some(), "route gate redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}
