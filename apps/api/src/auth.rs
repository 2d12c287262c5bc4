//! Session lookup for the NextAuth-issued session cookie.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// Secure-prefixed name first: it is what production (HTTPS) deployments set.
pub const SESSION_COOKIES: [&str; 2] = [
    "__Secure-next-auth.session-token",
    "next-auth.session-token",
];

/// The authenticated caller. Extracting it rejects with 401 when the session
/// is absent, unknown or expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
}

/// Session token from the NextAuth cookie, or from an `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    SESSION_COOKIES
        .iter()
        .find_map(|name| jar.get(name).map(|c| c.value().to_string()))
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AppError::Unauthorized)?;

        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM sessions WHERE session_token = $1 AND expires > NOW()",
        )
        .bind(&token)
        .fetch_optional(&state.db)
        .await?;

        user_id
            .map(|id| CurrentUser { id })
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_from_plain_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; next-auth.session-token=abc123"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_secure_cookie_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static(
                "next-auth.session-token=plain; __Secure-next-auth.session-token=secure",
            ),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("secure"));
    }

    #[test]
    fn test_token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-1"));
        assert_eq!(session_token(&headers).as_deref(), Some("tok-1"));
    }

    #[test]
    fn test_no_credentials() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(session_token(&headers), None);
    }
}
