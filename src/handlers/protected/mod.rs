// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here runs behind jwt_auth_middleware, which puts an AuthUser in
// the request extensions. Role and ownership checks happen in the services.
//
// Security Level: JWT Authentication Required (access tokens only)
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware, plus require_admin_middleware for admin/*

pub mod admin; // Account and facility provisioning (administrators)
pub mod attendance; // Attendance requests, approval and views
pub mod auth; // whoami, logout
pub mod boards; // Notice boards
pub mod courses; // Lectures, enrollment, assignments
pub mod enrollments; // Grade config, grade reads, list and finalize
pub mod facilities; // Facilities and reservations
