//! Pure booking domain logic. Every function here takes its inputs as plain
//! values and returns a result; nothing reads a clock, a store, or shared state.

mod availability;
mod conflict;
mod error;
mod lifecycle;
mod preview;
mod pricing;
#[cfg(test)]
mod tests;

pub use availability::{calculate_availability, day_slots, merge_overlapping, occupancy_rate};
pub use conflict::{
    classify, conflicting_slots, detect_conflicts, detect_conflicts_with, suggest_alternatives,
    SearchOptions,
};
pub use error::EngineError;
pub use lifecycle::{
    allowed_targets, apply_status_change, apply_status_change_with, default_hold, hold_for,
    initial_status, is_hold_expired, sweep_expired_holds, validate_transition, SweepOutcome,
};
pub use preview::{preview_booking, preview_booking_with, validate_request};
pub use pricing::{calculate_price, money, Discount, NoPromos, PromoLookup, PromoTable};
