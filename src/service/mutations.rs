use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::engine::{
    self, apply_status_change_with, calculate_price, detect_conflicts_with, hold_for,
    initial_status, is_hold_expired, validate_request, EngineError, SweepOutcome,
};
use crate::model::*;
use crate::notify::BookingEvent;

use super::{BookingOutcome, BookingService};

/// `BK-YYYYMMDD-NNNN`, dated by the booked slot.
fn booking_reference(span: &Span, sequence: u64) -> String {
    format!("BK-{}-{sequence:04}", span.start.format("%Y%m%d"))
}

impl BookingService {
    pub async fn create_booking(
        &self,
        request: &BookingRequest,
        now: Ts,
    ) -> Result<BookingOutcome, EngineError> {
        let facility = self.load_facility(request.facility_id).await?;
        let errors = validate_request(request, &facility);
        if !errors.is_empty() {
            return Err(EngineError::InvalidInput(errors.join("; ")));
        }
        let status = initial_status(request.initial_status)?;

        let lock = self.facility_lock(facility.id);
        let guard = lock.lock().await;

        let occupied = self.occupancy_around(&facility, &request.span, now).await?;
        let conflict = detect_conflicts_with(&facility, &request.span, &occupied, &self.options);
        if conflict.has_conflict {
            debug!("booking on {} rejected: {}", facility.id, conflict.message);
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Ok(BookingOutcome::Conflicted(conflict));
        }

        let price = calculate_price(
            &request.span,
            &facility.pricing,
            request.promo_code.as_deref(),
            self.promos.as_ref(),
        )?;
        let sequence = self.store.next_sequence().await?;
        let booking = Booking {
            id: Ulid::new(),
            facility_id: facility.id,
            reference: booking_reference(&request.span, sequence),
            span: request.span,
            status,
            payment_status: PaymentStatus::Pending,
            hold_until: hold_for(status, now, self.hold),
            cancellation_reason: None,
            promo_code: request
                .promo_code
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            total_amount: price.total,
            currency: price.currency.clone(),
            price_breakdown: price,
            created_at: now,
            updated_at: now,
        };
        self.store.save_booking(&booking).await?;
        drop(guard);

        info!(
            "booked {} on {} ({}, {} {})",
            booking.reference, facility.id, booking.status, booking.total_amount, booking.currency
        );
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);

        self.announce(&[
            BookingEvent::Created {
                booking_id: booking.id,
                facility_id: booking.facility_id,
                reference: booking.reference.clone(),
                span: booking.span,
                total: booking.total_amount,
                currency: booking.currency.clone(),
            },
            BookingEvent::NewBookingAlert {
                booking_id: booking.id,
                facility_id: booking.facility_id,
                reference: booking.reference.clone(),
                span: booking.span,
            },
        ]);
        Ok(BookingOutcome::Booked(booking))
    }

    pub async fn change_status(
        &self,
        booking_id: Ulid,
        change: &StatusChange,
        now: Ts,
    ) -> Result<Booking, EngineError> {
        let facility_id = self.load_booking(booking_id).await?.facility_id;
        let lock = self.facility_lock(facility_id);
        let guard = lock.lock().await;

        // Re-read under the lock; the sweep may have moved it.
        let current = self.load_booking(booking_id).await?;
        let next = apply_status_change_with(&current, change, now, self.hold)?;
        if next == current {
            return Ok(next);
        }
        self.store.save_booking(&next).await?;
        drop(guard);

        info!(
            "booking {} {} -> {}",
            next.reference, current.status, next.status
        );
        if next.status == BookingStatus::Cancelled {
            self.announce(&[cancelled_event(&next)]);
        }
        Ok(next)
    }

    /// Cancel every expired hold. Holds that cannot be cancelled, e.g.
    /// because they were paid in the meantime, are reported as skipped.
    pub async fn sweep_expired_holds(&self, now: Ts) -> Result<SweepOutcome, EngineError> {
        let candidates: Vec<Booking> = self
            .store
            .pending_bookings()
            .await?
            .into_iter()
            .filter(|b| is_hold_expired(b, now))
            .collect();

        let mut outcome = SweepOutcome::default();
        for candidate in candidates {
            let lock = self.facility_lock(candidate.facility_id);
            let _guard = lock.lock().await;
            // Re-read under the lock; it may have been confirmed or paid since.
            let Some(current) = self.store.booking(candidate.id).await? else {
                continue;
            };
            let pass = engine::sweep_expired_holds(std::slice::from_ref(&current), now);
            for cancelled in pass.cancelled {
                self.store.save_booking(&cancelled).await?;
                info!("hold {} expired, cancelled", cancelled.reference);
                metrics::counter!(crate::observability::HOLDS_EXPIRED_TOTAL).increment(1);
                self.announce(&[cancelled_event(&cancelled)]);
                outcome.cancelled.push(cancelled);
            }
            for (id, e) in pass.skipped {
                warn!("expired hold {} left in place: {e}", current.reference);
                outcome.skipped.push((id, e));
            }
        }
        Ok(outcome)
    }
}

fn cancelled_event(booking: &Booking) -> BookingEvent {
    BookingEvent::Cancelled {
        booking_id: booking.id,
        facility_id: booking.facility_id,
        reference: booking.reference.clone(),
        reason: booking.cancellation_reason.clone().unwrap_or_default(),
    }
}
