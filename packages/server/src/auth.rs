//! Bearer-token auth for the enqueue endpoint, grounded on
//! `server/middleware/jwt_auth.rs` (extract `Authorization` header, strip
//! the `Bearer ` prefix, attach the resolved identity to request
//! extensions) — simplified to a static shared-secret token set since
//! this pipeline has no session/JWT infrastructure of its own. Tokens are
//! configured via `STAFF_AUTH_TOKENS` / `ADMIN_AUTH_TOKENS` (comma
//! separated); either role may call `/api/jobs/enqueue`.

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::app_state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRole {
    Staff,
    Admin,
}

#[derive(Debug, Clone)]
pub struct AuthTokens {
    staff: Vec<String>,
    admin: Vec<String>,
}

impl AuthTokens {
    pub fn from_env() -> Self {
        Self {
            staff: split_tokens("STAFF_AUTH_TOKENS"),
            admin: split_tokens("ADMIN_AUTH_TOKENS"),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.staff.is_empty() || !self.admin.is_empty()
    }

    fn resolve(&self, token: &str) -> Option<AuthRole> {
        if self.admin.iter().any(|t| t == token) {
            Some(AuthRole::Admin)
        } else if self.staff.iter().any(|t| t == token) {
            Some(AuthRole::Staff)
        } else {
            None
        }
    }
}

fn split_tokens(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extracts and verifies the bearer token, attaching [`AuthRole`] to
/// request extensions on success. Unauthenticated requests are rejected
/// here rather than left to the handler, since this pipeline has exactly
/// one protected route.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let role = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|raw| raw.strip_prefix("Bearer ").unwrap_or(raw))
        .and_then(|token| state.auth_tokens.resolve(token));

    match role {
        Some(role) => {
            request.extensions_mut().insert(role);
            next.run(request).await
        }
        None => axum::response::IntoResponse::into_response((
            axum::http::StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({"error": "missing or invalid bearer token"})),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_token_resolves_to_admin_role() {
        let tokens = AuthTokens { staff: vec!["s1".to_string()], admin: vec!["a1".to_string()] };
        assert_eq!(tokens.resolve("a1"), Some(AuthRole::Admin));
    }

    #[test]
    fn staff_token_resolves_to_staff_role() {
        let tokens = AuthTokens { staff: vec!["s1".to_string()], admin: vec!["a1".to_string()] };
        assert_eq!(tokens.resolve("s1"), Some(AuthRole::Staff));
    }

    #[test]
    fn unknown_token_resolves_to_none() {
        let tokens = AuthTokens { staff: vec!["s1".to_string()], admin: vec![] };
        assert_eq!(tokens.resolve("bogus"), None);
    }

    #[test]
    fn unconfigured_tokens_report_not_configured() {
        let tokens = AuthTokens { staff: vec![], admin: vec![] };
        assert!(!tokens.is_configured());
    }
}
