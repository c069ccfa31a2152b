// handlers/protected/facilities/mod.rs - Facilities and reservations
//
// New reservations start PENDING; PENDING and APPROVED reservations hold
// their slot, so an overlapping request is a 409.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::database::models::{Facility, Reservation};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::reservation_service::CreateReservationRequest;

/// POST /api/facilities - Active facilities.
pub async fn facility_list_post(State(state): State<AppState>) -> ApiResult<Vec<Facility>> {
    let facilities = state.reservations().list_facilities().await?;
    Ok(ApiResponse::success(facilities))
}

/**
 * POST /api/reservations - Book a facility
 *
 * Expected Input:
 * ```json
 * { "facilityIdx": 3, "startTime": "2024-05-02T10:00:00Z",
 *   "endTime": "2024-05-02T12:00:00Z", "partySize": 4, "purpose": "study group" }
 * ```
 *
 * Errors: 400 booking rule violated, 404 unknown facility, 409 overlap.
 */
pub async fn reservation_create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateReservationRequest>, JsonRejection>,
) -> ApiResult<Reservation> {
    let Json(request) = payload?;
    let reservation = state
        .reservations()
        .create(&user, request, chrono::Utc::now())
        .await?;
    Ok(ApiResponse::created(reservation))
}

/// POST /api/reservations/my - Caller's reservations, newest first.
pub async fn reservation_my_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<Reservation>> {
    let reservations = state.reservations().my_reservations(&user).await?;
    Ok(ApiResponse::success(reservations))
}

/// POST /api/reservations/:id/cancel - Owner cancels a PENDING or APPROVED reservation.
pub async fn reservation_cancel_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(reservation_idx): Path<i64>,
) -> ApiResult<Reservation> {
    let reservation = state.reservations().cancel(&user, reservation_idx).await?;
    Ok(ApiResponse::success(reservation))
}
