// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (JWT auth). Administrator routes live under
// protected/admin and get an extra role check layered on in app.rs.
pub mod protected; // JWT authentication required (/api/*)
pub mod public; // No authentication required (/api/auth/login, /api/auth/refresh)

use crate::error::ApiError;

/// Reject a body whose `action` is not the one this endpoint serves.
pub(crate) fn expect_action(action: &str, allowed: &[&str]) -> Result<(), ApiError> {
    if allowed.contains(&action) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Unsupported action '{}', expected {}",
            action,
            allowed.join(" or ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_must_match() {
        assert!(expect_action("set-config", &["set-config"]).is_ok());
        let err = expect_action("delete", &["get-grade", "professor-view"]).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("get-grade or professor-view"));
    }
}
