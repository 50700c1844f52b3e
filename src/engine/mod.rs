mod allocator;
mod availability;
mod billing;
mod catalog;
mod error;
mod facility;
mod index;
mod lifecycle;
mod provision;
mod queries;

pub use availability::subtract_intervals;
pub use billing::charge;
pub use catalog::{Catalog, Slot};
pub use error::EngineError;
pub use facility::FacilityState;
pub use index::{IntervalIndex, IntervalRecord};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::config::EngineConfig;
use crate::limits::*;
use crate::model::*;

pub type SharedFacilityState = Arc<RwLock<FacilityState>>;

/// The reservation store. Each facility (catalog + interval index) sits behind
/// its own lock; reservations live in a sharded map keyed by id.
///
/// Lock order is always facility first, then the reservation entry. A
/// reservation entry guard is never held across an `.await`.
pub struct Engine {
    config: EngineConfig,
    facilities: DashMap<FacilityId, SharedFacilityState>,
    reservations: DashMap<ReservationId, Reservation>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            facilities: DashMap::new(),
            reservations: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get_facility(&self, id: &FacilityId) -> Option<SharedFacilityState> {
        self.facilities.get(id).map(|e| e.value().clone())
    }

    /// Lookup reservation → facility, acquire the facility write lock.
    async fn resolve_reservation_write(
        &self,
        reservation_id: &ReservationId,
    ) -> Result<(FacilityId, OwnedRwLockWriteGuard<FacilityState>), EngineError> {
        let facility_id = self
            .reservations
            .get(reservation_id)
            .map(|r| r.facility_id)
            .ok_or(EngineError::UnknownReservation(*reservation_id))?;
        let facility = self
            .get_facility(&facility_id)
            .ok_or(EngineError::UnknownFacility(facility_id))?;
        let guard = facility.write_owned().await;
        Ok((facility_id, guard))
    }

    /// Recompute a slot's status hint from whatever committed interval covers `now`.
    /// Caller holds the facility write lock and no reservation entry guard.
    fn refresh_slot_status(&self, facility: &mut FacilityState, slot_id: SlotId, now: Ms) {
        let status = match facility.index.covering(slot_id, now) {
            None => SlotStatus::Free,
            Some(record) => match self.reservations.get(&record.reservation_id).map(|r| r.state) {
                Some(ReservationState::Active) => SlotStatus::Occupied,
                _ => SlotStatus::Reserved,
            },
        };
        if let Some(slot) = facility.catalog.get_mut(&slot_id) {
            slot.status = status;
        }
    }
}

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// Reject empty or inverted windows first, then out-of-range ones.
pub(crate) fn validate_window(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if start >= end {
        return Err(EngineError::InvalidWindow { start, end });
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(Span::new(start, end))
}
