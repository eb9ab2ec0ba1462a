//! Session Handlers

use serde::Deserialize;
use serde_json::{Value, json};

use crate::message::{HandlerContext, IDENTITY_KEY, Outcome, parse_params};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub token: String,
}

/// session.login - 令牌换身份
pub async fn login(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    let req: LoginRequest = parse_params(params)?;
    let peer = ctx.session.peer().unwrap_or("unknown").to_string();

    let Some(identity) = ctx.state.identity.resolve(req.token.trim()).await? else {
        crate::security_log!(warn, "login_failed", peer = %peer, "Login failed - unknown token");
        return Err(AppError::Unauthorized);
    };

    ctx.session.set(IDENTITY_KEY, &identity)?;
    crate::security_log!(info, "login", peer = %peer, identity = %identity.id, role = %identity.role, "Session authenticated");
    Outcome::ok(&identity)
}

/// session.whoami
pub async fn whoami(ctx: HandlerContext, _params: Value) -> AppResult<Outcome> {
    let identity = ctx.session.require_identity()?;
    Outcome::ok(&identity)
}

/// session.logout
pub async fn logout(ctx: HandlerContext, _params: Value) -> AppResult<Outcome> {
    if let Some(identity) = ctx.session.identity() {
        crate::security_log!(info, "logout", identity = %identity.id, "Session closed");
    }
    let logged_out = ctx.session.remove(IDENTITY_KEY);
    Outcome::ok(&json!({ "logged_out": logged_out }))
}
