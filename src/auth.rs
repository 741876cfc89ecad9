/// Authentication extractors
use crate::{
    account::ValidatedSession,
    admin::Caller,
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::HubError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - extracts and validates session from request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub session: ValidatedSession,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = HubError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        // Already validated by the ban middleware
        if let Some(session) = parts.extensions.get::<ValidatedSession>().cloned() {
            return Ok(AuthContext {
                user_id: session.user_id.clone(),
                session,
            });
        }

        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| HubError::Authentication("Missing authorization header".to_string()))?;

        let session = state.account_manager.validate_access_token(&token).await?;
        let user_id = session.user_id.clone();

        Ok(AuthContext { user_id, session })
    }
}

/// Optional authenticated context - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = HubError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = match extract_bearer_token(&parts.headers) {
            Some(token) => match state.account_manager.validate_access_token(&token).await {
                Ok(session) => Some(AuthContext {
                    user_id: session.user_id.clone(),
                    session,
                }),
                Err(HubError::Authentication(_)) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        Ok(OptionalAuthContext { auth })
    }
}

/// Admin authentication context - requires the admin role or principal status
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub caller: Caller,
    pub session: ValidatedSession,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = HubError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthContext { user_id, session } = AuthContext::from_request_parts(parts, state).await?;

        let caller = state
            .admin_console
            .authorize(&user_id, session.email.as_deref())
            .await?;

        if !caller.has_admin_access() {
            tracing::warn!("AdminAuthContext: {} is not an admin", user_id);
            return Err(HubError::Authorization("Admin only".to_string()));
        }

        tracing::debug!(
            "AdminAuthContext: {} authorized (principal: {})",
            user_id,
            caller.is_principal
        );

        Ok(AdminAuthContext { caller, session })
    }
}
