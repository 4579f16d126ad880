use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;

/// UTC instant, the only time type that enters the engine.
pub type Ts = DateTime<Utc>;

const MS_PER_HOUR: i64 = 3_600_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ts,
    pub end: Ts,
}

impl Span {
    pub fn new(start: Ts, end: Ts) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Checked constructor for caller-supplied bounds.
    pub fn try_new(start: Ts, end: Ts) -> Result<Self, EngineError> {
        let span = Self { start, end };
        span.validate()?;
        Ok(span)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.end <= self.start {
            return Err(EngineError::InvalidInput(format!(
                "interval end {} must be after start {}",
                self.end, self.start
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Exact length in hours, unrounded.
    pub fn duration_hours(&self) -> Decimal {
        Decimal::from(self.duration().num_milliseconds()) / Decimal::from(MS_PER_HOUR)
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ts) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn shifted(&self, by: TimeDelta) -> Span {
        Span {
            start: self.start + by,
            end: self.end + by,
        }
    }
}

// ── Facility configuration ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub base_price_per_hour: Decimal,
    /// ISO-4217 code, passed through untouched.
    pub currency: String,
}

/// Read-only per request. Opening hours are UTC times of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub id: Ulid,
    pub name: String,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub slot_duration_minutes: u32,
    pub pricing: PricingConfig,
}

impl FacilityConfig {
    pub fn slot_duration(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.slot_duration_minutes))
    }

    /// Operating hours on `date`, or `None` when the facility never opens.
    pub fn operating_window(&self, date: NaiveDate) -> Option<Span> {
        if self.open_time >= self.close_time {
            return None;
        }
        Some(Span::new(
            date.and_time(self.open_time).and_utc(),
            date.and_time(self.close_time).and_utc(),
        ))
    }

    /// True if `span` lies inside the operating hours of its start date.
    pub fn is_within_operating_hours(&self, span: &Span) -> bool {
        self.operating_window(span.start.date_naive())
            .is_some_and(|window| window.contains_span(span))
    }

    /// Invariants the engine depends on.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.slot_duration_minutes == 0 {
            return Err(EngineError::InvalidInput(
                "slot duration must be positive".into(),
            ));
        }
        if self.pricing.base_price_per_hour.is_sign_negative() {
            return Err(EngineError::InvalidInput(
                "base price per hour must not be negative".into(),
            ));
        }
        Ok(())
    }
}

// ── Occupancy ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Booked,
    Blocked,
    Maintenance,
}

/// An existing booking or administrative block that stops new bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupiedSlot {
    pub id: Ulid,
    pub facility_id: Ulid,
    pub span: Span,
    pub status: SlotStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    ExactDuplicate,
    PartialOverlap,
    /// The request sits entirely inside an existing slot.
    Contained,
    /// The request swallows an existing slot.
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResult {
    pub has_conflict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_type: Option<ConflictType>,
    /// Ordered by start, then id.
    pub conflicting_slots: Vec<OccupiedSlot>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_alternatives: Vec<PricedTimeSlot>,
}

// ── Pricing ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub duration_hours: Decimal,
    pub base_price: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotAvailability {
    Available,
    Booked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedTimeSlot {
    pub span: Span,
    pub price: Decimal,
    pub currency: String,
    pub status: SlotAvailability,
}

// ── Availability ─────────────────────────────────────────────────

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of dates covered; zero when `end < start`.
    pub fn len_days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(0)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take_while({
            let end = self.end;
            move |d| *d <= end
        })
    }

    /// `[start 00:00, end+1 00:00)` in UTC. Fails on an inverted range or
    /// when the midnight after `end` is not representable.
    pub fn to_span(&self) -> Result<Span, EngineError> {
        let end = self
            .end
            .and_time(NaiveTime::MIN)
            .and_utc()
            .checked_add_signed(TimeDelta::days(1))
            .ok_or_else(|| {
                EngineError::InvalidInput(format!("date {} is out of range", self.end))
            })?;
        Span::try_new(self.start.and_time(NaiveTime::MIN).and_utc(), end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityMap {
    pub facility_id: Ulid,
    pub date_range: DateRange,
    pub total_slots: usize,
    /// Every generated slot, each marked available or booked.
    pub available_slots: Vec<PricedTimeSlot>,
    /// Caller input, echoed for display.
    pub occupied_slots: Vec<OccupiedSlot>,
    pub occupancy_rate: Decimal,
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
        BookingStatus::NoShow,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::NoShow
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::NoShow => "NO_SHOW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    PartiallyPaid,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    /// Money has been taken; a refund must happen before cancelling.
    pub fn blocks_cancellation(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::PartiallyPaid)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::PartiallyPaid => "PARTIALLY_PAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// A booking as the caller's store holds it. The engine only reads it or
/// returns a proposed next value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub facility_id: Ulid,
    pub reference: String,
    pub span: Span,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Set iff `status == Pending`.
    pub hold_until: Option<Ts>,
    pub cancellation_reason: Option<String>,
    pub promo_code: Option<String>,
    pub price_breakdown: PriceBreakdown,
    pub total_amount: Decimal,
    pub currency: String,
    pub created_at: Ts,
    pub updated_at: Ts,
}

impl Booking {
    /// Confirmed bookings and live holds block the slot.
    pub fn is_occupying(&self, now: Ts) -> bool {
        match self.status {
            BookingStatus::Confirmed => true,
            BookingStatus::Pending => self.hold_until.is_some_and(|h| now < h),
            _ => false,
        }
    }

    pub fn to_occupied_slot(&self) -> OccupiedSlot {
        OccupiedSlot {
            id: self.id,
            facility_id: self.facility_id,
            span: self.span,
            status: SlotStatus::Booked,
            booking_reference: Some(self.reference.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub facility_id: Ulid,
    pub span: Span,
    #[serde(default)]
    pub promo_code: Option<String>,
    /// Defaults to `Confirmed`; `Pending` places a hold.
    #[serde(default)]
    pub initial_status: Option<BookingStatus>,
}

/// Requested status change for an existing booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: BookingStatus,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub can_book: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_breakdown: Option<PriceBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_alternatives: Vec<PricedTimeSlot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}
