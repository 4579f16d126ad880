use chrono::TimeDelta;
use ulid::Ulid;

use crate::limits::{EXPIRED_HOLD_REASON, HOLD_DURATION_MINUTES, MIN_CANCELLATION_REASON_LEN};
use crate::model::*;

use super::EngineError;

/// Legal targets for each status. Terminal states have none.
pub fn allowed_targets(from: BookingStatus) -> &'static [BookingStatus] {
    use BookingStatus::*;
    match from {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[Cancelled, Completed, NoShow],
        Cancelled | Completed | NoShow => &[],
    }
}

/// Same-status requests are a no-op and always succeed.
pub fn validate_transition(current: BookingStatus, next: BookingStatus) -> Result<(), EngineError> {
    if current == next || allowed_targets(current).contains(&next) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition {
            from: current,
            to: next,
        })
    }
}

pub fn default_hold() -> TimeDelta {
    TimeDelta::minutes(HOLD_DURATION_MINUTES)
}

/// Status a new booking may start in.
pub fn initial_status(requested: Option<BookingStatus>) -> Result<BookingStatus, EngineError> {
    match requested.unwrap_or(BookingStatus::Confirmed) {
        s @ (BookingStatus::Pending | BookingStatus::Confirmed) => Ok(s),
        other => Err(EngineError::InvalidInput(format!(
            "a booking cannot be created as {other}"
        ))),
    }
}

/// `hold_until` for a booking entering `status`.
pub fn hold_for(status: BookingStatus, now: Ts, hold: TimeDelta) -> Option<Ts> {
    (status == BookingStatus::Pending).then(|| now + hold)
}

/// A pending hold past its deadline no longer occupies its slot.
pub fn is_hold_expired(booking: &Booking, now: Ts) -> bool {
    booking.status == BookingStatus::Pending && booking.hold_until.is_some_and(|h| h <= now)
}

pub fn apply_status_change(
    booking: &Booking,
    change: &StatusChange,
    now: Ts,
) -> Result<Booking, EngineError> {
    apply_status_change_with(booking, change, now, default_hold())
}

/// Propose the booking that results from `change`. The input is left
/// untouched; persisting the result is the caller's job.
pub fn apply_status_change_with(
    booking: &Booking,
    change: &StatusChange,
    now: Ts,
    hold: TimeDelta,
) -> Result<Booking, EngineError> {
    let reason = change
        .cancellation_reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    if reason.is_some() && change.status != BookingStatus::Cancelled {
        return Err(EngineError::InvalidInput(
            "a cancellation reason is only accepted when cancelling".into(),
        ));
    }
    if booking.status == change.status {
        return Ok(booking.clone());
    }
    validate_transition(booking.status, change.status)?;
    if change.status == BookingStatus::Confirmed
        && is_hold_expired(booking, now)
        && let Some(deadline) = booking.hold_until
    {
        return Err(EngineError::InvalidInput(format!(
            "hold expired at {deadline}; the slot must be booked again"
        )));
    }

    let mut next = booking.clone();
    if change.status == BookingStatus::Cancelled {
        let reason = match reason {
            Some(r) if r.chars().count() >= MIN_CANCELLATION_REASON_LEN => r,
            _ => {
                return Err(EngineError::InvalidInput(format!(
                    "cancellation reason must be at least {MIN_CANCELLATION_REASON_LEN} characters"
                )));
            }
        };
        if booking.payment_status.blocks_cancellation() {
            return Err(EngineError::PaymentBlocksCancellation(booking.payment_status));
        }
        next.cancellation_reason = Some(reason.to_string());
    }
    next.status = change.status;
    next.hold_until = hold_for(change.status, now, hold);
    next.updated_at = now;
    Ok(next)
}

/// Result of one pass over a tenant's pending bookings.
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Proposed cancelled versions of the expired holds.
    pub cancelled: Vec<Booking>,
    /// Expired holds that could not be cancelled, e.g. already paid.
    pub skipped: Vec<(Ulid, EngineError)>,
}

/// Cancel every expired hold with the fixed system reason. Running it again
/// over the updated bookings at the same `now` finds nothing.
pub fn sweep_expired_holds(bookings: &[Booking], now: Ts) -> SweepOutcome {
    let change = StatusChange {
        status: BookingStatus::Cancelled,
        cancellation_reason: Some(EXPIRED_HOLD_REASON.to_string()),
    };
    let mut outcome = SweepOutcome::default();
    for booking in bookings.iter().filter(|b| is_hold_expired(b, now)) {
        match apply_status_change(booking, &change, now) {
            Ok(cancelled) => outcome.cancelled.push(cancelled),
            Err(e) => outcome.skipped.push((booking.id, e)),
        }
    }
    outcome
}
