//! Waitlist API 模块

mod handler;

use crate::message::RequestRouter;

pub fn register(router: &mut RequestRouter) {
    router.register("waitlist.join", handler::join);
    router.register("waitlist.status", handler::status);
    router.register("waitlist.notify", handler::notify_next);
    router.register("waitlist.cancel", handler::cancel);
}
