// handlers/public/auth/mod.rs - Public authentication handlers
//
// Login issues an access/refresh token pair; refresh rotates the pair.
// Failed logins are counted per username by the LoginRateLimiter.

pub mod login; // POST /api/auth/login - authenticate and receive tokens
pub mod refresh; // POST /api/auth/refresh - rotate the refresh token

pub use login::login_post;
pub use refresh::refresh_post;
