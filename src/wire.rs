//! JSON-lines protocol: one request envelope per line in, one response per
//! line out.
//!
//! ```text
//! {"tenant":"club_a","now":"2025-03-10T07:00:00Z","command":{"op":"book","request":{...}}}
//! {"ok":true,"result":{"outcome":"BOOKED",...}}
//! ```

use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use ulid::Ulid;

use crate::engine::{allowed_targets, calculate_price, validate_transition, EngineError};
use crate::model::*;
use crate::observability::{command_label, COMMANDS_TOTAL, COMMAND_DURATION_SECONDS};
use crate::tenant::TenantManager;

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub tenant: String,
    /// Clock override; the wall clock when absent.
    #[serde(default)]
    pub now: Option<Ts>,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    PutFacility {
        facility: FacilityConfig,
    },
    AddBlock {
        facility_id: Ulid,
        span: Span,
        #[serde(default = "default_block_status")]
        status: SlotStatus,
    },
    Preview {
        request: BookingRequest,
    },
    Book {
        request: BookingRequest,
    },
    ChangeStatus {
        booking_id: Ulid,
        status: BookingStatus,
        #[serde(default)]
        cancellation_reason: Option<String>,
    },
    Availability {
        facility_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    },
    Sweep,
    Price {
        span: Span,
        pricing: PricingConfig,
        #[serde(default)]
        promo_code: Option<String>,
    },
    ValidateTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
}

fn default_block_status() -> SlotStatus {
    SlotStatus::Blocked
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }
}

impl From<EngineError> for Response {
    fn from(e: EngineError) -> Self {
        Response::failure(e.code(), e.to_string())
    }
}

/// Handle one protocol line and render the response line.
pub async fn process_line(tm: &TenantManager, line: &str) -> String {
    let response = match serde_json::from_str::<Envelope>(line) {
        Ok(envelope) => handle(tm, envelope).await,
        Err(e) => Response::failure("bad_request", e.to_string()),
    };
    serde_json::to_string(&response).unwrap_or_else(|e| {
        format!(r#"{{"ok":false,"error":{{"code":"internal","message":"{e}"}}}}"#)
    })
}

pub async fn handle(tm: &TenantManager, envelope: Envelope) -> Response {
    let label = command_label(&envelope.command);
    let started = Instant::now();
    let response = match execute(tm, envelope).await {
        Ok(result) => Response::success(result),
        Err(e) => {
            tracing::debug!("{label} failed: {e}");
            Response::from(e)
        }
    };
    let status = if response.ok { "ok" } else { "error" };
    metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => status).increment(1);
    metrics::histogram!(COMMAND_DURATION_SECONDS, "command" => label)
        .record(started.elapsed().as_secs_f64());
    response
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, EngineError> {
    serde_json::to_value(value).map_err(|e| EngineError::Store(format!("encode: {e}")))
}

async fn execute(tm: &TenantManager, envelope: Envelope) -> Result<Value, EngineError> {
    let tenant = tm.get_or_create(&envelope.tenant)?;
    let now = envelope.now.unwrap_or_else(Utc::now);
    let service = &tenant.service;

    match envelope.command {
        Command::PutFacility { facility } => {
            facility.validate()?;
            if facility.name.len() > crate::limits::MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("facility name too long"));
            }
            let id = facility.id;
            tenant.store.put_facility(facility);
            Ok(json!({ "facility_id": id }))
        }
        Command::AddBlock {
            facility_id,
            span,
            status,
        } => {
            span.validate()?;
            let slot = OccupiedSlot {
                id: Ulid::new(),
                facility_id,
                span,
                status,
                booking_reference: None,
            };
            tenant.store.add_block(slot.clone());
            to_value(&slot)
        }
        Command::Preview { request } => to_value(&service.preview(&request, now).await?),
        Command::Book { request } => to_value(&service.create_booking(&request, now).await?),
        Command::ChangeStatus {
            booking_id,
            status,
            cancellation_reason,
        } => {
            let change = StatusChange {
                status,
                cancellation_reason,
            };
            to_value(&service.change_status(booking_id, &change, now).await?)
        }
        Command::Availability {
            facility_id,
            start,
            end,
        } => {
            let range = DateRange::new(start, end);
            to_value(&service.availability(facility_id, &range, now).await?)
        }
        Command::Sweep => {
            let outcome = service.sweep_expired_holds(now).await?;
            let skipped: Vec<Value> = outcome
                .skipped
                .iter()
                .map(|(id, e)| {
                    json!({
                        "booking_id": id,
                        "error": e.code(),
                        "message": e.to_string(),
                    })
                })
                .collect();
            Ok(json!({ "cancelled": to_value(&outcome.cancelled)?, "skipped": skipped }))
        }
        Command::Price {
            span,
            pricing,
            promo_code,
        } => to_value(&calculate_price(
            &span,
            &pricing,
            promo_code.as_deref(),
            tm.promos(),
        )?),
        Command::ValidateTransition { from, to } => Ok(json!({
            "from": from,
            "to": to,
            "allowed": validate_transition(from, to).is_ok(),
            "targets": allowed_targets(from),
        })),
    }
}
