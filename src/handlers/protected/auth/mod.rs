// handlers/protected/auth/mod.rs - Session handlers for authenticated users

pub mod logout; // POST /api/auth/logout - revoke a refresh token
pub mod whoami; // GET /api/auth/whoami - current account

pub use logout::logout_post;
pub use whoami::whoami_get;
