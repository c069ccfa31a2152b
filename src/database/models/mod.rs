pub mod attendance;
pub mod board;
pub mod course;
pub mod facility;
pub mod user;

pub use attendance::{AttendanceRecord, AttendanceRequest, NewAttendanceRequest, RequestResolution, RequestStatus};
pub use board::{Board, BoardPage, NewBoard};
pub use course::{Assignment, AssignmentGrade, Enrollment, Lecture, NewAssignment, NewLecture};
pub use facility::{Facility, NewFacility, NewReservation, Reservation, ReservationStatus};
pub use user::{NewUser, Role, User};
