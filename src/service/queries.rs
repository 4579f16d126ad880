use ulid::Ulid;

use crate::engine::{calculate_availability, preview_booking_with, validate_request, EngineError};
use crate::limits::MAX_AVAILABILITY_DAYS;
use crate::model::*;

use super::BookingService;

impl BookingService {
    /// Read-only booking check against the store's current occupancy.
    pub async fn preview(
        &self,
        request: &BookingRequest,
        now: Ts,
    ) -> Result<PreviewResult, EngineError> {
        let facility = self.load_facility(request.facility_id).await?;
        // Bad requests are answered without touching occupancy.
        let errors = validate_request(request, &facility);
        if !errors.is_empty() {
            return Ok(PreviewResult {
                can_book: false,
                price_breakdown: None,
                conflict: None,
                suggested_alternatives: Vec::new(),
                validation_errors: errors,
            });
        }
        let occupied = self.occupancy_around(&facility, &request.span, now).await?;
        Ok(preview_booking_with(
            request,
            &facility,
            &occupied,
            self.promos.as_ref(),
            &self.options,
        ))
    }

    pub async fn availability(
        &self,
        facility_id: Ulid,
        range: &DateRange,
        now: Ts,
    ) -> Result<AvailabilityMap, EngineError> {
        let facility = self.load_facility(facility_id).await?;
        if range.end < range.start {
            return Err(EngineError::InvalidInput(format!(
                "date range end {} is before start {}",
                range.end, range.start
            )));
        }
        if range.len_days() > MAX_AVAILABILITY_DAYS {
            return Err(EngineError::LimitExceeded("date range too wide"));
        }
        let window = range.to_span()?;
        let occupied = self.store.occupied_slots(facility_id, &window, now).await?;
        calculate_availability(&facility, range, &occupied)
    }
}
