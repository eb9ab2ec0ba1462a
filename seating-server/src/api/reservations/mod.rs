//! Reservation API 模块

mod handler;

use crate::message::RequestRouter;

pub fn register(router: &mut RequestRouter) {
    router.register("reservation.slots", handler::slots);
    router.register("reservation.create", handler::create);
    router.register("reservation.get", handler::get_by_code);
    router.register("reservation.cancel", handler::cancel);
    router.register("reservation.checkin", handler::check_in);
    router.register("reservation.complete", handler::complete);
    router.register("reservation.list", handler::list);
}
