mod mutations;
mod queries;
mod store;

pub use store::{BookingStore, InMemoryStore};

use std::sync::Arc;

use chrono::TimeDelta;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::engine::{default_hold, EngineError, NoPromos, PromoLookup, SearchOptions};
use crate::model::*;
use crate::notify::{BookingEvent, NotifyHub};

pub type FacilityLock = Arc<Mutex<()>>;

/// What a booking attempt produced. A conflict is an expected answer,
/// not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingOutcome {
    Booked(Booking),
    Conflicted(ConflictResult),
}

/// Stateful orchestration around the pure engine: loads inputs from the store,
/// serializes writes per facility, persists, and fans out notifications.
pub struct BookingService {
    pub(super) store: Arc<dyn BookingStore>,
    pub notify: Arc<NotifyHub>,
    pub(super) promos: Arc<dyn PromoLookup>,
    pub(super) options: SearchOptions,
    pub(super) hold: TimeDelta,
    /// Check-then-write for one facility happens under its lock.
    pub(super) facility_locks: DashMap<Ulid, FacilityLock>,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, notify: Arc<NotifyHub>) -> Self {
        Self {
            store,
            notify,
            promos: Arc::new(NoPromos),
            options: SearchOptions::default(),
            hold: default_hold(),
            facility_locks: DashMap::new(),
        }
    }

    pub fn with_promos(mut self, promos: Arc<dyn PromoLookup>) -> Self {
        self.promos = promos;
        self
    }

    pub fn with_search_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_hold(mut self, hold: TimeDelta) -> Self {
        self.hold = hold;
        self
    }

    pub(super) fn facility_lock(&self, facility_id: Ulid) -> FacilityLock {
        self.facility_locks
            .entry(facility_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(super) async fn load_facility(&self, id: Ulid) -> Result<FacilityConfig, EngineError> {
        self.store.facility(id).await?.ok_or(EngineError::NotFound(id))
    }

    pub(super) async fn load_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.store.booking(id).await?.ok_or(EngineError::NotFound(id))
    }

    /// Occupancy relevant to `span`: the whole operating day it starts on,
    /// so alternatives see the same slots the conflict check does.
    pub(super) async fn occupancy_around(
        &self,
        facility: &FacilityConfig,
        span: &Span,
        now: Ts,
    ) -> Result<Vec<OccupiedSlot>, EngineError> {
        let window = match facility.operating_window(span.start.date_naive()) {
            Some(w) => Span::new(w.start.min(span.start), w.end.max(span.end)),
            None => *span,
        };
        self.store.occupied_slots(facility.id, &window, now).await
    }

    pub(super) fn announce(&self, events: &[BookingEvent]) {
        for event in events {
            self.notify.send(event);
        }
    }
}
