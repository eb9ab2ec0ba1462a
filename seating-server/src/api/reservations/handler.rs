//! Reservation Handlers
//!
//! 日期 `YYYY-MM-DD`，时间 `HH:MM`。

use serde::Deserialize;
use serde_json::{Value, json};

use crate::message::{HandlerContext, Outcome, parse_params};
use crate::seating::BookingRequest;
use crate::utils::AppResult;
use crate::utils::time::{parse_date, parse_time};

#[derive(Debug, Deserialize)]
pub struct SlotsRequest {
    pub date: String,
    pub party_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub date: String,
    pub time: String,
    pub party_size: u32,
    #[serde(default)]
    pub contact: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct DateRequest {
    pub date: String,
}

/// reservation.slots - 可预订时段 (无需登录)
pub async fn slots(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    let req: SlotsRequest = parse_params(params)?;
    let date = parse_date(&req.date)?;
    let slots = ctx.state.registry.available_slots(date, req.party_size).await?;
    Outcome::ok(&json!({ "date": date, "party_size": req.party_size, "slots": slots }))
}

/// reservation.create
pub async fn create(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    let identity = ctx.session.require_identity()?;
    let req: CreateRequest = parse_params(params)?;
    let booking = BookingRequest {
        date: parse_date(&req.date)?,
        time: parse_time(&req.time)?,
        party_size: req.party_size,
        contact: req.contact.filter(|c| !c.trim().is_empty()),
    };
    let reservation = ctx.state.registry.create_reservation(&identity, booking).await?;
    Outcome::ok(&reservation)
}

/// reservation.get - 确认码即凭证
pub async fn get_by_code(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    ctx.session.require_identity()?;
    let req: CodeRequest = parse_params(params)?;
    let reservation = ctx.state.registry.find_by_code(req.code.trim()).await?;
    Outcome::ok(&reservation)
}

/// reservation.cancel - 本人或员工
pub async fn cancel(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    let identity = ctx.session.require_identity()?;
    let req: CodeRequest = parse_params(params)?;
    let reservation = ctx.state.registry.cancel(req.code.trim(), &identity).await?;
    Outcome::ok(&reservation)
}

/// reservation.checkin - 员工；预订或已叫号候位入座
pub async fn check_in(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    let staff = ctx.session.require_staff()?;
    let req: CodeRequest = parse_params(params)?;
    let reservation = ctx.state.registry.check_in(req.code.trim()).await?;
    tracing::info!(code = %reservation.code, staff = %staff.id, table_id = ?reservation.table_id, "Checked in");
    Outcome::ok(&reservation)
}

/// reservation.complete - 员工
pub async fn complete(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    let staff = ctx.session.require_staff()?;
    let req: CodeRequest = parse_params(params)?;
    let reservation = ctx.state.registry.complete(req.code.trim()).await?;
    tracing::info!(code = %reservation.code, staff = %staff.id, "Completed");
    Outcome::ok(&reservation)
}

/// reservation.list - 员工；某日全部记录
pub async fn list(ctx: HandlerContext, params: Value) -> AppResult<Outcome> {
    ctx.session.require_staff()?;
    let req: DateRequest = parse_params(params)?;
    let records = ctx.state.registry.list_for_date(parse_date(&req.date)?).await?;
    Outcome::ok(&records)
}
