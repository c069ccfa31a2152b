// handlers/protected/courses/mod.rs - Course records that grades are built from

pub mod assignment; // POST /api/assignments/create, /api/assignments/grade
pub mod lecture; // POST /api/lectures/create, /api/enrollments/enroll

pub use assignment::{assignment_create_post, assignment_grade_post};
pub use lecture::{enroll_post, lecture_create_post};
