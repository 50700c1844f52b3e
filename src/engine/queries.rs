use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub fn get_reservation(&self, id: &ReservationId) -> Option<Reservation> {
        self.reservations.get(id).map(|r| r.value().clone())
    }

    /// Every reservation ever made on a slot, cancelled ones included, ordered by start.
    pub fn reservations_for_slot(&self, slot_id: SlotId) -> Vec<Reservation> {
        let mut result: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.slot_id == slot_id)
            .map(|r| r.value().clone())
            .collect();
        result.sort_by_key(|r| (r.span.start, r.created_at));
        result
    }

    pub async fn slots_of(&self, facility_id: FacilityId) -> Result<Vec<SlotInfo>, EngineError> {
        let facility = self
            .get_facility(&facility_id)
            .ok_or(EngineError::UnknownFacility(facility_id))?;
        let guard = facility.read().await;
        Ok(guard.catalog.iter().map(|s| s.info()).collect())
    }

    pub async fn facility(&self, facility_id: FacilityId) -> Option<FacilityInfo> {
        let facility = self.get_facility(&facility_id)?;
        let guard = facility.read().await;
        Some(guard.info())
    }

    /// All facilities, ordered by id.
    pub async fn list_facilities(&self) -> Vec<FacilityInfo> {
        let mut handles: Vec<_> = self
            .facilities
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        handles.sort_by_key(|(id, _)| *id);

        let mut result = Vec::with_capacity(handles.len());
        for (_, facility) in handles {
            result.push(facility.read().await.info());
        }
        result
    }
}
