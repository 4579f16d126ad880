use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;

/// Persistence collaborator. Implementations own durability and any
/// cross-process consistency; the service only serializes writes per facility
/// within one process.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn facility(&self, id: Ulid) -> Result<Option<FacilityConfig>, EngineError>;

    /// Confirmed bookings, unexpired holds, and administrative blocks of
    /// `facility_id` overlapping `window`.
    async fn occupied_slots(
        &self,
        facility_id: Ulid,
        window: &Span,
        now: Ts,
    ) -> Result<Vec<OccupiedSlot>, EngineError>;

    async fn booking(&self, id: Ulid) -> Result<Option<Booking>, EngineError>;

    async fn save_booking(&self, booking: &Booking) -> Result<(), EngineError>;

    /// Reserve the next booking reference number. Numbers are unique across
    /// every facility of the store and start at 1.
    async fn next_sequence(&self) -> Result<u64, EngineError>;

    async fn pending_bookings(&self) -> Result<Vec<Booking>, EngineError>;
}

pub struct InMemoryStore {
    facilities: DashMap<Ulid, FacilityConfig>,
    bookings: DashMap<Ulid, Booking>,
    /// Administrative blocks (maintenance, closures), keyed by facility.
    blocks: DashMap<Ulid, Vec<OccupiedSlot>>,
    sequence: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            facilities: DashMap::new(),
            bookings: DashMap::new(),
            blocks: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    // ── Facilities ───────────────────────────────────────────

    pub fn put_facility(&self, facility: FacilityConfig) {
        self.facilities.insert(facility.id, facility);
    }

    // ── Blocks ───────────────────────────────────────────────

    pub fn add_block(&self, slot: OccupiedSlot) {
        let mut blocks = self.blocks.entry(slot.facility_id).or_default();
        let pos = blocks.partition_point(|b| b.span.start <= slot.span.start);
        blocks.insert(pos, slot);
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn facility(&self, id: Ulid) -> Result<Option<FacilityConfig>, EngineError> {
        Ok(self.facilities.get(&id).map(|e| e.value().clone()))
    }

    async fn occupied_slots(
        &self,
        facility_id: Ulid,
        window: &Span,
        now: Ts,
    ) -> Result<Vec<OccupiedSlot>, EngineError> {
        let mut out: Vec<OccupiedSlot> = self
            .bookings
            .iter()
            .filter(|e| {
                let b = e.value();
                b.facility_id == facility_id && b.is_occupying(now) && b.span.overlaps(window)
            })
            .map(|e| e.value().to_occupied_slot())
            .collect();
        if let Some(blocks) = self.blocks.get(&facility_id) {
            out.extend(blocks.iter().filter(|b| b.span.overlaps(window)).cloned());
        }
        out.sort_by(|a, b| a.span.start.cmp(&b.span.start).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn booking(&self, id: Ulid) -> Result<Option<Booking>, EngineError> {
        Ok(self.bookings.get(&id).map(|e| e.value().clone()))
    }

    async fn save_booking(&self, booking: &Booking) -> Result<(), EngineError> {
        self.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn next_sequence(&self) -> Result<u64, EngineError> {
        Ok(self.sequence.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn pending_bookings(&self) -> Result<Vec<Booking>, EngineError> {
        Ok(self
            .bookings
            .iter()
            .filter(|e| e.value().status == BookingStatus::Pending)
            .map(|e| e.value().clone())
            .collect())
    }
}
