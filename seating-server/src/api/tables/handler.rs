//! Dining Table Handlers

use serde_json::{Value, json};

use crate::message::{HandlerContext, Outcome};
use crate::utils::AppResult;

/// table.list - 员工；当前桌台与占用
pub async fn list(ctx: HandlerContext, _params: Value) -> AppResult<Outcome> {
    ctx.session.require_staff()?;
    let tables = ctx.state.registry.allocator().tables().await?;
    let occupied = tables.iter().filter(|t| t.is_occupied()).count();
    Outcome::ok(&json!({
        "tables": tables,
        "occupied": occupied,
        "free": tables.len() - occupied,
        "pool": ctx.state.db.pool.status(),
    }))
}
