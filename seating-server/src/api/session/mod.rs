//! Session API 模块
//!
//! 令牌登录后身份保存在连接会话中，后续请求直接读取。

mod handler;

use crate::message::RequestRouter;

pub fn register(router: &mut RequestRouter) {
    router.register("session.login", handler::login);
    router.register("session.whoami", handler::whoami);
    router.register("session.logout", handler::logout);
}
