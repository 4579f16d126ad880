use chrono::TimeDelta;

use crate::limits::MAX_SUGGESTED_ALTERNATIVES;
use crate::model::*;

use super::pricing::slot_price;

/// Tunables for the alternative-slot search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_alternatives: usize,
    /// Search increment; `None` uses the facility's slot duration.
    pub step: Option<TimeDelta>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_alternatives: MAX_SUGGESTED_ALTERNATIVES,
            step: None,
        }
    }
}

impl SearchOptions {
    fn step_for(&self, facility: &FacilityConfig) -> TimeDelta {
        self.step
            .filter(|s| *s > TimeDelta::zero())
            .unwrap_or_else(|| facility.slot_duration())
    }
}

/// Occupied slots of `facility_id` overlapping `requested`, ordered by start then id.
pub fn conflicting_slots(
    facility_id: ulid::Ulid,
    requested: &Span,
    occupied: &[OccupiedSlot],
) -> Vec<OccupiedSlot> {
    let mut hits: Vec<OccupiedSlot> = occupied
        .iter()
        .filter(|slot| slot.facility_id == facility_id && slot.span.overlaps(requested))
        .cloned()
        .collect();
    hits.sort_by(|a, b| a.span.start.cmp(&b.span.start).then(a.id.cmp(&b.id)));
    hits
}

/// How `requested` collides with an overlapping `existing` span.
pub fn classify(requested: &Span, existing: &Span) -> ConflictType {
    if requested == existing {
        ConflictType::ExactDuplicate
    } else if requested.contains_span(existing) {
        ConflictType::Contains
    } else if existing.contains_span(requested) {
        ConflictType::Contained
    } else {
        ConflictType::PartialOverlap
    }
}

fn conflict_message(conflict_type: ConflictType, count: usize) -> String {
    let what = match conflict_type {
        ConflictType::ExactDuplicate => "exactly matches an existing booking",
        ConflictType::PartialOverlap => "partially overlaps an existing booking",
        ConflictType::Contained => "falls inside an existing booking",
        ConflictType::Contains => "encloses an existing booking",
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("Requested slot {what} ({count} conflicting slot{plural})")
}

pub fn detect_conflicts(
    facility: &FacilityConfig,
    requested: &Span,
    occupied: &[OccupiedSlot],
) -> ConflictResult {
    detect_conflicts_with(facility, requested, occupied, &SearchOptions::default())
}

/// Classify the request against the occupied set and, when it collides,
/// propose free slots of the same length.
pub fn detect_conflicts_with(
    facility: &FacilityConfig,
    requested: &Span,
    occupied: &[OccupiedSlot],
    options: &SearchOptions,
) -> ConflictResult {
    let conflicting = conflicting_slots(facility.id, requested, occupied);
    let Some(first) = conflicting.first() else {
        return ConflictResult {
            has_conflict: false,
            conflict_type: None,
            conflicting_slots: Vec::new(),
            message: "Requested slot is available".into(),
            suggested_alternatives: Vec::new(),
        };
    };

    let conflict_type = classify(requested, &first.span);
    ConflictResult {
        has_conflict: true,
        conflict_type: Some(conflict_type),
        message: conflict_message(conflict_type, conflicting.len()),
        conflicting_slots: conflicting,
        suggested_alternatives: suggest_alternatives(facility, requested, occupied, options),
    }
}

/// Walk outward from the requested start in fixed steps, nearest first and
/// later-before-earlier on ties, keeping conflict-free candidates inside the
/// operating hours of the requested date.
pub fn suggest_alternatives(
    facility: &FacilityConfig,
    requested: &Span,
    occupied: &[OccupiedSlot],
    options: &SearchOptions,
) -> Vec<PricedTimeSlot> {
    let mut found = Vec::new();
    if options.max_alternatives == 0 || requested.validate().is_err() {
        return found;
    }
    let step = options.step_for(facility);
    if step <= TimeDelta::zero() {
        return found;
    }
    let Some(window) = facility.operating_window(requested.start.date_naive()) else {
        return found;
    };

    let blocking: Vec<Span> = occupied
        .iter()
        .filter(|slot| slot.facility_id == facility.id)
        .map(|slot| slot.span)
        .collect();
    let is_free = |candidate: &Span| !blocking.iter().any(|s| s.overlaps(candidate));

    let mut later_done = false;
    let mut earlier_done = false;
    let mut k: i32 = 1;
    while !(later_done && earlier_done) {
        let offset = step * k;
        for (candidate, forward) in [
            (requested.shifted(offset), true),
            (requested.shifted(-offset), false),
        ] {
            let done = if forward {
                &mut later_done
            } else {
                &mut earlier_done
            };
            if *done || found.len() >= options.max_alternatives {
                continue;
            }
            // Past the window edge in this direction: every further step is too.
            let past_edge = if forward {
                candidate.end > window.end
            } else {
                candidate.start < window.start
            };
            if past_edge {
                *done = true;
                continue;
            }
            if window.contains_span(&candidate) && is_free(&candidate) {
                found.push(PricedTimeSlot {
                    span: candidate,
                    price: slot_price(&candidate, &facility.pricing),
                    currency: facility.pricing.currency.clone(),
                    status: SlotAvailability::Available,
                });
            }
        }
        if found.len() >= options.max_alternatives {
            break;
        }
        k += 1;
    }
    found
}
