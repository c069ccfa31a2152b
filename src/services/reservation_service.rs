use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, ReservationConfig};
use crate::database::models::{
    Facility, NewFacility, NewReservation, Reservation, ReservationStatus, Role,
};
use crate::database::Store;
use crate::middleware::AuthUser;
use crate::services::{require_role, ServiceError, ServiceResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFacilityRequest {
    pub name: String,
    pub facility_type: String,
    pub description: Option<String>,
    pub capacity: i32,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    pub facility_idx: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub party_size: Option<i32>,
    pub purpose: Option<String>,
}

pub struct ReservationService {
    store: Arc<dyn Store>,
    config: Arc<AppConfig>,
}

impl ReservationService {
    pub fn new(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    pub async fn list_facilities(&self) -> ServiceResult<Vec<Facility>> {
        Ok(self.store.list_facilities(true).await?)
    }

    pub async fn create_facility(&self, user: &AuthUser, request: CreateFacilityRequest) -> ServiceResult<Facility> {
        require_role(user, &[Role::Admin])?;

        let mut errors = HashMap::new();
        if request.name.trim().is_empty() {
            errors.insert("name".to_string(), "is required".to_string());
        }
        if request.facility_type.trim().is_empty() {
            errors.insert("facilityType".to_string(), "is required".to_string());
        }
        if request.capacity < 1 {
            errors.insert("capacity".to_string(), "must be at least 1".to_string());
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let facility = self
            .store
            .create_facility(NewFacility {
                name: request.name.trim().to_string(),
                facility_type: request.facility_type.trim().to_string(),
                description: request.description,
                capacity: request.capacity,
                location: request.location,
            })
            .await?;
        tracing::info!("Facility {} '{}' created by {}", facility.facility_idx, facility.name, user.username);
        Ok(facility)
    }

    pub async fn create(
        &self,
        user: &AuthUser,
        request: CreateReservationRequest,
        now: DateTime<Utc>,
    ) -> ServiceResult<Reservation> {
        let facility = self
            .store
            .find_facility(request.facility_idx)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Facility {} not found", request.facility_idx)))?;

        let party_size = request.party_size.unwrap_or(1);
        check_booking(&self.config.reservation, &facility, &request, party_size, now)
            .map_err(ServiceError::BadRequest)?;

        let reservation = self
            .store
            .create_reservation(NewReservation {
                facility_idx: facility.facility_idx,
                user_idx: user.user_id,
                start_time: request.start_time,
                end_time: request.end_time,
                party_size,
                purpose: request.purpose.filter(|p| !p.trim().is_empty()),
            })
            .await?;

        tracing::info!(
            "Reservation {} of '{}' by {} ({} to {})",
            reservation.reservation_idx,
            facility.name,
            user.username,
            reservation.start_time,
            reservation.end_time
        );
        Ok(reservation)
    }

    pub async fn my_reservations(&self, user: &AuthUser) -> ServiceResult<Vec<Reservation>> {
        Ok(self.store.list_user_reservations(user.user_id).await?)
    }

    pub async fn cancel(&self, user: &AuthUser, reservation_idx: i64) -> ServiceResult<Reservation> {
        let reservation = self
            .store
            .find_reservation(reservation_idx)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Reservation {} not found", reservation_idx)))?;

        if reservation.user_idx != user.user_id {
            return Err(ServiceError::Forbidden("You can only cancel your own reservations".to_string()));
        }
        if !reservation.status.holds_slot() {
            return Err(ServiceError::BadRequest(format!(
                "A {} reservation cannot be cancelled",
                reservation.status.as_str()
            )));
        }

        let cancelled = self
            .store
            .update_reservation_status(reservation_idx, ReservationStatus::Cancelled)
            .await?;
        tracing::info!("Reservation {} cancelled by {}", reservation_idx, user.username);
        Ok(cancelled)
    }
}

/// Booking rules checked before the store looks for overlaps.
fn check_booking(
    rules: &ReservationConfig,
    facility: &Facility,
    request: &CreateReservationRequest,
    party_size: i32,
    now: DateTime<Utc>,
) -> Result<(), String> {
    if !facility.is_active {
        return Err(format!("Facility '{}' is not accepting reservations", facility.name));
    }
    if request.end_time <= request.start_time {
        return Err("endTime must be after startTime".to_string());
    }
    if request.start_time <= now {
        return Err("Reservations must start in the future".to_string());
    }
    if request.start_time.date_naive() != request.end_time.date_naive() {
        return Err("A reservation must start and end on the same day".to_string());
    }
    if request.start_time > now + Duration::days(rules.max_days_in_advance) {
        return Err(format!(
            "Reservations can be made at most {} days in advance",
            rules.max_days_in_advance
        ));
    }

    let minutes = (request.end_time - request.start_time).num_minutes();
    if minutes < rules.min_duration_minutes || minutes > rules.max_duration_minutes {
        return Err(format!(
            "Duration must be between {} and {} minutes",
            rules.min_duration_minutes, rules.max_duration_minutes
        ));
    }
    if party_size < 1 || party_size > facility.capacity {
        return Err(format!("partySize must be between 1 and {}", facility.capacity));
    }
    Ok(())
}
