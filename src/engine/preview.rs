use crate::model::*;

use super::conflict::{detect_conflicts_with, SearchOptions};
use super::pricing::{calculate_price, PromoLookup};

/// Problems that stop a request from being evaluated at all.
pub fn validate_request(request: &BookingRequest, facility: &FacilityConfig) -> Vec<String> {
    let mut errors = Vec::new();
    if request.facility_id != facility.id {
        errors.push(format!(
            "request targets facility {} but configuration is for {}",
            request.facility_id, facility.id
        ));
    }
    if let Err(e) = facility.validate() {
        errors.push(e.to_string());
    }
    match request.span.validate() {
        Err(e) => errors.push(e.to_string()),
        Ok(()) if !facility.is_within_operating_hours(&request.span) => {
            errors.push(format!(
                "requested interval is outside operating hours {}-{}",
                facility.open_time.format("%H:%M"),
                facility.close_time.format("%H:%M")
            ));
        }
        Ok(()) => {}
    }
    errors
}

pub fn preview_booking(
    request: &BookingRequest,
    facility: &FacilityConfig,
    occupied: &[OccupiedSlot],
    promos: &dyn PromoLookup,
) -> PreviewResult {
    preview_booking_with(request, facility, occupied, promos, &SearchOptions::default())
}

/// Read-only "can I book this, and for how much". Same inputs, same output.
pub fn preview_booking_with(
    request: &BookingRequest,
    facility: &FacilityConfig,
    occupied: &[OccupiedSlot],
    promos: &dyn PromoLookup,
    options: &SearchOptions,
) -> PreviewResult {
    let validation_errors = validate_request(request, facility);
    if !validation_errors.is_empty() {
        return rejected(validation_errors);
    }

    let mut conflict = detect_conflicts_with(facility, &request.span, occupied, options);
    if conflict.has_conflict {
        let suggested_alternatives = std::mem::take(&mut conflict.suggested_alternatives);
        return PreviewResult {
            can_book: false,
            price_breakdown: None,
            conflict: Some(conflict),
            suggested_alternatives,
            validation_errors: Vec::new(),
        };
    }

    match calculate_price(
        &request.span,
        &facility.pricing,
        request.promo_code.as_deref(),
        promos,
    ) {
        Ok(breakdown) => PreviewResult {
            can_book: true,
            price_breakdown: Some(breakdown),
            conflict: None,
            suggested_alternatives: Vec::new(),
            validation_errors: Vec::new(),
        },
        Err(e) => rejected(vec![e.to_string()]),
    }
}

fn rejected(validation_errors: Vec<String>) -> PreviewResult {
    PreviewResult {
        can_book: false,
        price_breakdown: None,
        conflict: None,
        suggested_alternatives: Vec::new(),
        validation_errors,
    }
}
