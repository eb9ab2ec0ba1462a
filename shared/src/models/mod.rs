//! Domain models shared between server and clients

pub mod dining_table;
pub mod reservation;

pub use dining_table::DiningTable;
pub use reservation::{NewReservation, Reservation, ReservationKind, ReservationStatus, TimeSlot};
