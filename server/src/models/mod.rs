pub mod booking;
pub mod event;
pub mod payment;
pub mod reservation;
pub mod user;

pub use booking::{ArtifactRef, BookingRecord, BookingStatus, EntryStatus, NewBooking};
pub use event::Event;
pub use payment::{NewPayment, PaymentRecord, PaymentStatus};
pub use reservation::{NewReservation, Reservation, PAY_LATER_METHOD};
pub use user::{Role, User};
