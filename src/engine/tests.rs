use chrono::{NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ulid::Ulid;

use super::*;
use crate::limits::EXPIRED_HOLD_REASON;
use crate::model::*;

const DAY: u32 = 10;

fn at(h: u32, m: u32) -> Ts {
    Utc.with_ymd_and_hms(2025, 3, DAY, h, m, 0).unwrap()
}

fn span(h1: u32, m1: u32, h2: u32, m2: u32) -> Span {
    Span::new(at(h1, m1), at(h2, m2))
}

/// Open 08:00–22:00, hourly slots, 150 SAR/hr.
fn court() -> FacilityConfig {
    FacilityConfig {
        id: Ulid::new(),
        name: "Court 1".into(),
        open_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        close_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
        slot_duration_minutes: 60,
        pricing: PricingConfig {
            base_price_per_hour: dec!(150),
            currency: "SAR".into(),
        },
    }
}

fn confirmed(f: &FacilityConfig, s: Span) -> OccupiedSlot {
    OccupiedSlot {
        id: Ulid::new(),
        facility_id: f.id,
        span: s,
        status: SlotStatus::Booked,
        booking_reference: Some("BK-20250310-0001".into()),
    }
}

fn request(f: &FacilityConfig, s: Span) -> BookingRequest {
    BookingRequest {
        facility_id: f.id,
        span: s,
        promo_code: None,
        initial_status: None,
    }
}

fn booking(f: &FacilityConfig, status: BookingStatus, payment: PaymentStatus, now: Ts) -> Booking {
    let s = span(10, 0, 11, 0);
    let breakdown = calculate_price(&s, &f.pricing, None, &NoPromos).unwrap();
    Booking {
        id: Ulid::new(),
        facility_id: f.id,
        reference: "BK-20250310-0001".into(),
        span: s,
        status,
        payment_status: payment,
        hold_until: hold_for(status, now, default_hold()),
        cancellation_reason: None,
        promo_code: None,
        total_amount: breakdown.total,
        currency: breakdown.currency.clone(),
        price_breakdown: breakdown,
        created_at: now,
        updated_at: now,
    }
}

// ── Scenarios ────────────────────────────────────────────────────

#[test]
fn free_court_can_be_booked_for_150_sar() {
    let f = court();
    let result = preview_booking(&request(&f, span(10, 0, 11, 0)), &f, &[], &NoPromos);
    assert!(result.can_book);
    assert!(result.conflict.is_none());
    let price = result.price_breakdown.unwrap();
    assert_eq!(price.total, dec!(150.00));
    assert_eq!(price.total.to_string(), "150.00");
    assert_eq!(price.currency, "SAR");
}

#[test]
fn duplicate_request_is_conflicted_with_alternatives() {
    let f = court();
    let occupied = vec![confirmed(&f, span(10, 0, 11, 0))];
    let result = preview_booking(&request(&f, span(10, 0, 11, 0)), &f, &occupied, &NoPromos);
    assert!(!result.can_book);
    assert!(result.price_breakdown.is_none());
    let conflict = result.conflict.unwrap();
    assert!(conflict.has_conflict);
    assert_eq!(conflict.conflict_type, Some(ConflictType::ExactDuplicate));
    assert!(!result.suggested_alternatives.is_empty());
    for alt in &result.suggested_alternatives {
        assert!(!alt.span.overlaps(&span(10, 0, 11, 0)));
        assert_eq!(alt.price, dec!(150.00));
    }
}

#[test]
fn quarter_hour_inside_booking_is_contained() {
    let f = court();
    let occupied = vec![confirmed(&f, span(10, 0, 11, 0))];
    let result = detect_conflicts(&f, &span(10, 30, 10, 45), &occupied);
    assert_eq!(result.conflict_type, Some(ConflictType::Contained));
}

#[test]
fn expired_hold_is_swept_to_cancelled() {
    let f = court();
    let now = at(9, 0);
    let mut hold = booking(&f, BookingStatus::Pending, PaymentStatus::Pending, now);
    hold.hold_until = Some(now - TimeDelta::minutes(1));
    assert!(is_hold_expired(&hold, now));

    let outcome = sweep_expired_holds(&[hold.clone()], now);
    assert_eq!(outcome.cancelled.len(), 1);
    let swept = &outcome.cancelled[0];
    assert_eq!(swept.status, BookingStatus::Cancelled);
    assert_eq!(swept.cancellation_reason.as_deref(), Some(EXPIRED_HOLD_REASON));
    assert_eq!(swept.hold_until, None);
}

#[test]
fn paid_cancellation_blocked_until_payment_pending() {
    let f = court();
    let now = at(9, 0);
    let change = StatusChange {
        status: BookingStatus::Cancelled,
        cancellation_reason: Some("Team could not make it".into()),
    };

    let paid = booking(&f, BookingStatus::Confirmed, PaymentStatus::Paid, now);
    assert_eq!(
        apply_status_change(&paid, &change, now),
        Err(EngineError::PaymentBlocksCancellation(PaymentStatus::Paid))
    );

    let unpaid = booking(&f, BookingStatus::Confirmed, PaymentStatus::Pending, now);
    let cancelled = apply_status_change(&unpaid, &change, now).unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
}

// ── Properties ───────────────────────────────────────────────────

#[test]
fn disjoint_occupancy_is_always_priceable() {
    let f = court();
    let occupied: Vec<_> = [(8, 9), (9, 10), (12, 13), (15, 17), (21, 22)]
        .iter()
        .map(|&(a, b)| confirmed(&f, span(a, 0, b, 0)))
        .collect();
    for (a, b) in [(10, 11), (10, 12), (13, 15), (17, 21)] {
        let requested = span(a, 0, b, 0);
        let conflict = detect_conflicts(&f, &requested, &occupied);
        assert!(!conflict.has_conflict, "{requested:?}");
        let preview = preview_booking(&request(&f, requested), &f, &occupied, &NoPromos);
        assert!(preview.can_book);
        assert_eq!(
            preview.price_breakdown.unwrap().total,
            dec!(150) * Decimal::from(b - a)
        );
    }
}

#[test]
fn preview_is_byte_identical_across_calls() {
    let f = court();
    let promos = PromoTable::new().with("WELCOME", Discount::Percent(dec!(12.5)));
    let occupied = vec![
        confirmed(&f, span(10, 0, 11, 0)),
        confirmed(&f, span(13, 0, 14, 0)),
    ];
    for requested in [span(10, 30, 11, 30), span(15, 0, 16, 30)] {
        let mut req = request(&f, requested);
        req.promo_code = Some("welcome".into());
        let a = preview_booking(&req, &f, &occupied, &promos);
        let b = preview_booking(&req, &f, &occupied, &promos);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}

#[test]
fn preview_applies_promo() {
    let f = court();
    let promos = PromoTable::new().with("WELCOME", Discount::Percent(dec!(12.5)));
    let mut req = request(&f, span(15, 0, 16, 30));
    req.promo_code = Some("welcome".into());
    let price = preview_booking(&req, &f, &[], &promos).price_breakdown.unwrap();
    assert_eq!(price.base_price, dec!(225.00));
    // 28.125 rounds half-up
    assert_eq!(price.discount, dec!(28.13));
    assert_eq!(price.total, dec!(196.87));
}

#[test]
fn preview_reports_validation_errors() {
    let f = court();
    let inverted = Span {
        start: at(11, 0),
        end: at(10, 0),
    };
    let result = preview_booking(&request(&f, inverted), &f, &[], &NoPromos);
    assert!(!result.can_book);
    assert_eq!(result.validation_errors.len(), 1);

    let result = preview_booking(&request(&f, span(21, 30, 22, 30)), &f, &[], &NoPromos);
    assert!(!result.can_book);
    assert!(result.validation_errors[0].contains("operating hours"));

    let other = court();
    let result = preview_booking(&request(&other, span(10, 0, 11, 0)), &f, &[], &NoPromos);
    assert!(!result.can_book);
    assert!(result.validation_errors[0].contains("targets facility"));
}

#[test]
fn preview_moves_alternatives_to_top_level() {
    let f = court();
    let occupied = vec![confirmed(&f, span(10, 0, 11, 0))];
    let result = preview_booking(&request(&f, span(10, 0, 11, 0)), &f, &occupied, &NoPromos);
    assert_eq!(result.suggested_alternatives.len(), 3);
    assert!(result.conflict.unwrap().suggested_alternatives.is_empty());
}

#[test]
fn preview_does_not_touch_inputs() {
    let f = court();
    let occupied = vec![confirmed(&f, span(10, 0, 11, 0))];
    let before = occupied.clone();
    let f_before = f.clone();
    let _ = preview_booking(&request(&f, span(10, 0, 11, 0)), &f, &occupied, &NoPromos);
    assert_eq!(occupied, before);
    assert_eq!(f, f_before);
}

#[test]
fn only_occupying_bookings_block() {
    let f = court();
    let now = at(9, 0);
    let mut bookings = vec![
        booking(&f, BookingStatus::Confirmed, PaymentStatus::Paid, now),
        booking(&f, BookingStatus::Pending, PaymentStatus::Pending, now),
        booking(&f, BookingStatus::Cancelled, PaymentStatus::Refunded, now),
    ];
    bookings[1].span = span(12, 0, 13, 0);
    bookings[2].span = span(14, 0, 15, 0);

    let later = now + TimeDelta::minutes(20);
    let occupied: Vec<_> = bookings
        .iter()
        .filter(|b| b.is_occupying(later))
        .map(Booking::to_occupied_slot)
        .collect();
    assert_eq!(occupied.len(), 1);

    assert!(detect_conflicts(&f, &span(10, 0, 11, 0), &occupied).has_conflict);
    // hold expired at 09:15
    assert!(!detect_conflicts(&f, &span(12, 0, 13, 0), &occupied).has_conflict);
    assert!(!detect_conflicts(&f, &span(14, 0, 15, 0), &occupied).has_conflict);
}

#[test]
fn availability_matches_conflict_detection() {
    let f = court();
    let occupied = vec![
        confirmed(&f, span(10, 0, 11, 0)),
        confirmed(&f, span(13, 30, 14, 30)),
    ];
    let d = NaiveDate::from_ymd_opt(2025, 3, DAY).unwrap();
    let map = calculate_availability(&f, &DateRange::new(d, d), &occupied).unwrap();
    for slot in &map.available_slots {
        let conflicted = detect_conflicts(&f, &slot.span, &occupied).has_conflict;
        assert_eq!(conflicted, slot.status == SlotAvailability::Booked, "{:?}", slot.span);
    }
    assert_eq!(map.occupancy_rate, dec!(21.43));
}
