use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{User, UserRole};
use crate::util::extract_bearer_token;

/// The authenticated caller, inserted into request extensions by the auth layers.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user: User,
}

impl UserContext {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == UserRole::Admin
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let api_key = extract_bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;
    let conn = state.db.get()?;
    queries::get_user_by_api_key(&conn, api_key)?
        .ok_or_else(|| AppError::Unauthorized("Invalid API key".into()))
}

/// Any signed-in user (customers and admins alike).
pub async fn customer_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(UserContext { user });
    Ok(next.run(request).await)
}

pub async fn admin_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let ctx = UserContext {
        user: authenticate(&state, request.headers())?,
    };
    if !ctx.is_admin() {
        return Err(AppError::Forbidden("Admin access required".into()));
    }
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
