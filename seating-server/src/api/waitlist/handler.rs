//! Waitlist Handlers

use serde::Deserialize;
use serde_json::{Value, json};

use crate::message::{HandlerContext, Outcome, parse_params};
use crate::seating::WalkInOutcome;
use crate::utils::AppResult;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub party_size: u32,
    #[serde(default)]
    pub contact: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

/// waitlist.join - 现场客人：能坐就直接入座 (`.seated`)，否则排队 (`.queued`)
pub async fn join(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    let identity = ctx.session.require_identity()?;
    let req: JoinRequest = parse_params(params)?;
    let contact = req.contact.filter(|c| !c.trim().is_empty());
    let waitlist = &ctx.state.waitlist;

    match waitlist
        .check_availability_and_seat(req.party_size, &identity, contact.clone())
        .await?
    {
        WalkInOutcome::Seated(entry) => Outcome::with_suffix("seated", &entry),
        WalkInOutcome::NotImmediate { estimated_wait_minutes } => {
            let entry = waitlist
                .join(req.party_size, &identity, contact, estimated_wait_minutes)
                .await?;
            Outcome::with_suffix("queued", &entry)
        }
    }
}

/// waitlist.status - 排队位置 + 预计等待
pub async fn status(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    ctx.session.require_identity()?;
    let req: CodeRequest = parse_params(params)?;
    let position = ctx.state.waitlist.position(req.code.trim()).await?;
    Outcome::ok(&position)
}

/// waitlist.notify - 员工叫号
pub async fn notify_next(ctx: HandlerContext, _params: Value) -> AppResult<Outcome> {
    let staff = ctx.session.require_staff()?;
    let notified = ctx.state.waitlist.notify_next().await?;
    match &notified {
        Some(entry) => tracing::info!(code = %entry.code, staff = %staff.id, table_id = ?entry.table_id, "Waitlist entry called"),
        None => tracing::debug!(staff = %staff.id, "No waitlist entry fits a free table"),
    }
    Outcome::ok(&json!({ "notified": notified }))
}

/// waitlist.cancel - 本人或员工
pub async fn cancel(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    let identity = ctx.session.require_identity()?;
    let req: CodeRequest = parse_params(params)?;
    let entry = ctx.state.waitlist.cancel(req.code.trim(), &identity).await?;
    Outcome::ok(&entry)
}
