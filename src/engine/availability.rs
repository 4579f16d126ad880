use rust_decimal::Decimal;

use crate::limits::MAX_AVAILABILITY_DAYS;
use crate::model::*;

use super::pricing::{money, slot_price};
use super::EngineError;

// ── Availability Algorithm ────────────────────────────────────────

/// Expand a facility's opening hours over `range` into fixed-length slots,
/// each priced and marked booked if any occupied slot touches it.
pub fn calculate_availability(
    facility: &FacilityConfig,
    range: &DateRange,
    occupied: &[OccupiedSlot],
) -> Result<AvailabilityMap, EngineError> {
    facility.validate()?;
    if range.end < range.start {
        return Err(EngineError::InvalidInput(format!(
            "date range end {} is before start {}",
            range.end, range.start
        )));
    }
    if range.len_days() > MAX_AVAILABILITY_DAYS {
        return Err(EngineError::LimitExceeded("date range too wide"));
    }

    let mut blocked: Vec<Span> = occupied
        .iter()
        .filter(|slot| slot.facility_id == facility.id)
        .map(|slot| slot.span)
        .collect();
    blocked.sort_by_key(|s| s.start);
    let blocked = merge_overlapping(&blocked);

    let mut slots = Vec::new();
    let mut booked = 0usize;
    for day in range.days() {
        for span in day_slots(facility, day) {
            let status = if overlaps_any(&blocked, &span) {
                booked += 1;
                SlotAvailability::Booked
            } else {
                SlotAvailability::Available
            };
            slots.push(PricedTimeSlot {
                span,
                price: slot_price(&span, &facility.pricing),
                currency: facility.pricing.currency.clone(),
                status,
            });
        }
    }

    Ok(AvailabilityMap {
        facility_id: facility.id,
        date_range: *range,
        total_slots: slots.len(),
        occupancy_rate: occupancy_rate(booked, slots.len()),
        available_slots: slots,
        occupied_slots: occupied.to_vec(),
    })
}

/// Contiguous slots from open to close; a trailing partial slot is dropped.
pub fn day_slots(facility: &FacilityConfig, day: chrono::NaiveDate) -> Vec<Span> {
    let step = facility.slot_duration();
    let Some(window) = facility.operating_window(day) else {
        return Vec::new();
    };
    if step <= chrono::TimeDelta::zero() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut start = window.start;
    while start + step <= window.end {
        out.push(Span::new(start, start + step));
        start += step;
    }
    out
}

/// Percentage of booked slots, 0 when nothing was generated.
pub fn occupancy_rate(booked: usize, total: usize) -> Decimal {
    if total == 0 {
        return money(Decimal::ZERO);
    }
    money(Decimal::from(booked as u64 * 100) / Decimal::from(total as u64))
}

/// `disjoint` must be sorted and non-overlapping.
fn overlaps_any(disjoint: &[Span], span: &Span) -> bool {
    let idx = disjoint.partition_point(|s| s.end <= span.start);
    disjoint.get(idx).is_some_and(|s| s.start < span.end)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}
