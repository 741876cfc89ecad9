/// Request middleware
use crate::{
    account::ValidatedSession,
    admin::Role,
    context::AppContext,
    error::{HubError, HubResult},
};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Ban enforcement middleware
///
/// Blocks authenticated requests from banned accounts. Admins and the
/// principal are exempt. The validated session is stored in the request
/// extensions for `AuthContext`. Unauthenticated requests pass through; the
/// handler's extractor decides whether identity is required.
pub async fn check_account_ban(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> HubResult<Response> {
    if let Some(token) = extract_bearer_token(req.headers()) {
        if let Ok(session) = ctx.account_manager.validate_access_token(&token).await {
            if ctx.profile_manager.is_banned(&session.user_id).await?
                && !is_ban_exempt(&ctx, &session).await?
            {
                tracing::warn!("Rejected request from banned account {}", session.user_id);
                return Err(HubError::AccountBanned(
                    "Account has been banned".to_string(),
                ));
            }

            req.extensions_mut().insert(session);
        }
    }

    Ok(next.run(req).await)
}

/// Admins and the principal keep access while flagged
async fn is_ban_exempt(ctx: &AppContext, session: &ValidatedSession) -> HubResult<bool> {
    if ctx.role_manager.has_role(&session.user_id, Role::Admin).await? {
        return Ok(true);
    }

    let caller = ctx
        .admin_console
        .authorize(&session.user_id, session.email.as_deref())
        .await?;
    Ok(caller.has_admin_access())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer_token(&headers).is_none());
    }
}
