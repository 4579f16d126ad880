/// How long a `PENDING` booking holds its slot.
pub const HOLD_DURATION_MINUTES: i64 = 15;

/// Alternatives proposed for a conflicted request.
pub const MAX_SUGGESTED_ALTERNATIVES: usize = 3;

/// Minimum cancellation reason length, after trimming.
pub const MIN_CANCELLATION_REASON_LEN: usize = 5;

/// Reason recorded when the sweep cancels a stale hold.
pub const EXPIRED_HOLD_REASON: &str = "Hold expired before confirmation";

/// Widest date range accepted by availability queries.
pub const MAX_AVAILABILITY_DAYS: i64 = 62;

pub const MAX_TENANT_NAME_LEN: usize = 128;
pub const MAX_TENANTS: usize = 1024;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_PROMO_CODE_LEN: usize = 64;
