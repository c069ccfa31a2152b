// handlers/protected/enrollments/mod.rs - Grade endpoints
//
// Each endpoint takes a JSON body with an `action` discriminator and a
// `lecSerial`. Grades are computed from current attendance and assignment
// scores on every read; only finalization writes letter grades back.
//
// /api/enrollments/grade-config   set-config | get-config   course professor
// /api/enrollments/grade-info     get-grade | professor-view
// /api/enrollments/grade-list     list-all                  course professor
// /api/enrollments/grade-finalize finalize                  course professor

pub mod grade_config;
pub mod grade_finalize;
pub mod grade_info;
pub mod grade_list;

pub use grade_config::grade_config_post;
pub use grade_finalize::grade_finalize_post;
pub use grade_info::grade_info_post;
pub use grade_list::grade_list_post;
