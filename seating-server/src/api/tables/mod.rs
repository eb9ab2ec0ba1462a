//! Dining Table API 模块

mod handler;

use crate::message::RequestRouter;

pub fn register(router: &mut RequestRouter) {
    router.register("table.list", handler::list);
}
