pub mod attendance;
pub mod auth;
pub mod grade;
pub mod server;
