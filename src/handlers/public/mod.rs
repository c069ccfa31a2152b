// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition only. Everything else sits behind the JWT middleware.
//
// Security Level: None
// Route Prefix: /api/auth/login, /api/auth/refresh
// Middleware: none beyond the global CORS and trace layers

pub mod auth;

pub use auth::*;
