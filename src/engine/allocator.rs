use tracing::debug;

use crate::limits::*;
use crate::model::*;
use crate::observability::{COMMIT_CONFLICTS_TOTAL, RESERVATIONS_TOTAL};

use super::{now_ms, validate_window, Engine, EngineError, FacilityState};

impl Engine {
    /// Reserve the first compatible slot (catalog order) that is free over `[start, end)`.
    ///
    /// Returns `Ok(None)` when no slot fits. The scan runs under the facility's
    /// read lock; the commit re-checks under the write lock. A lost race moves
    /// the scan past the contested slot, at most `max_commit_attempts` times.
    pub async fn reserve(
        &self,
        facility_id: FacilityId,
        class: SlotClass,
        requester_id: impl Into<String>,
        start: Ms,
        end: Ms,
    ) -> Result<Option<ReservationId>, EngineError> {
        self.reserve_with(facility_id, class, requester_id, start, end, |_, _| {})
            .await
    }

    /// `reserve`, calling `before_commit` under the write lock right before the
    /// chosen slot is committed.
    pub(crate) async fn reserve_with(
        &self,
        facility_id: FacilityId,
        class: SlotClass,
        requester_id: impl Into<String>,
        start: Ms,
        end: Ms,
        mut before_commit: impl FnMut(&mut FacilityState, SlotId),
    ) -> Result<Option<ReservationId>, EngineError> {
        let span = validate_window(start, end)?;
        if span.duration_ms() > MAX_WINDOW_DURATION_MS {
            return Err(EngineError::LimitExceeded("reservation window too wide"));
        }
        let requester_id = requester_id.into();
        if requester_id.len() > MAX_REQUESTER_LEN {
            return Err(EngineError::LimitExceeded("requester id too long"));
        }
        let facility = self
            .get_facility(&facility_id)
            .ok_or(EngineError::UnknownFacility(facility_id))?;

        let attempts = self.config().max_commit_attempts.max(1);
        let mut scan_from = 0usize;

        for attempt in 1..=attempts {
            let candidate = {
                let guard = facility.read().await;
                guard.require_rate(class)?;
                guard.first_fit(class, &span, scan_from)
            };
            let Some((position, slot_id)) = candidate else {
                metrics::counter!(RESERVATIONS_TOTAL, "outcome" => "no_availability").increment(1);
                debug!(facility = %facility_id, %class, %span, "no availability");
                return Ok(None);
            };

            let mut guard = facility.write().await;
            before_commit(&mut *guard, slot_id);
            let id = ReservationId::generate();
            match guard.index.commit(slot_id, id, span) {
                Ok(()) => {}
                Err(EngineError::Conflict(winner)) => {
                    metrics::counter!(COMMIT_CONFLICTS_TOTAL).increment(1);
                    debug!(slot = %slot_id, %winner, attempt, "lost commit race, rescanning");
                    scan_from = position + 1;
                    continue;
                }
                Err(e) => return Err(e),
            }

            let now = now_ms();
            let reservation = Reservation {
                id,
                facility_id,
                slot_id,
                requester_id,
                span,
                paid: false,
                state: ReservationState::Held,
                created_at: now,
                held_until: self.config().hold_ttl_ms.map(|ttl| now.saturating_add(ttl)),
            };
            self.reservations.insert(id, reservation);
            if let Some(slot) = guard.catalog.get_mut(&slot_id) {
                slot.status = SlotStatus::Reserved;
            }

            metrics::counter!(RESERVATIONS_TOTAL, "outcome" => "reserved").increment(1);
            debug!(reservation = %id, slot = %slot_id, %span, "reservation held");
            return Ok(Some(id));
        }

        metrics::counter!(RESERVATIONS_TOTAL, "outcome" => "contention").increment(1);
        Err(EngineError::Contention { attempts })
    }

    /// Slots serving `class` with no committed interval covering the instant `at`.
    pub async fn free_slots(
        &self,
        facility_id: FacilityId,
        class: SlotClass,
        at: Ms,
    ) -> Result<Vec<SlotId>, EngineError> {
        let facility = self
            .get_facility(&facility_id)
            .ok_or(EngineError::UnknownFacility(facility_id))?;
        let guard = facility.read().await;
        guard.require_rate(class)?;
        Ok(guard
            .catalog
            .compatible(class)
            .filter(|slot| guard.index.covering(slot.id, at).is_none())
            .map(|slot| slot.id)
            .collect())
    }
}
