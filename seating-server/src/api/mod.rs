//! 请求处理模块
//!
//! # 结构
//!
//! - [`session`] - 登录 / 身份
//! - [`reservations`] - 预订
//! - [`waitlist`] - 现场候位
//! - [`tables`] - 桌台

pub mod reservations;
pub mod session;
pub mod tables;
pub mod waitlist;

use crate::message::RequestRouter;

/// 构建完整路由表
pub fn build_router() -> RequestRouter {
    let mut router = RequestRouter::new();
    session::register(&mut router);
    reservations::register(&mut router);
    waitlist::register(&mut router);
    tables::register(&mut router);
    router
}
