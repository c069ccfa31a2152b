// handlers/protected/attendance/mod.rs - Attendance workflow
//
// Students ask to be marked present for a session; the course professor
// approves in bulk (the same call also marks sessions directly). Pending
// requests that reach their expiry are auto-approved by the scheduler.

pub mod approve; // POST /api/attendance/approve
pub mod request; // POST /api/attendance/request
pub mod view; // POST /api/attendance/student/view, /api/attendance/professor/view

pub use approve::approve_post;
pub use request::request_post;
pub use view::{professor_view_post, student_view_post};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureRef {
    pub lec_serial: String,
}
