use tracing::debug;

use crate::model::*;
use crate::observability::CANCELLATIONS_TOTAL;

use super::{now_ms, Engine, EngineError};

impl Engine {
    /// `Held → Paid`. Touches only the reservation's own entry.
    pub fn mark_paid(&self, id: ReservationId) -> Result<(), EngineError> {
        let mut entry = self
            .reservations
            .get_mut(&id)
            .ok_or(EngineError::UnknownReservation(id))?;
        let reservation = entry.value_mut();
        transition(reservation, ReservationState::Paid)?;
        reservation.paid = true;
        reservation.held_until = None;
        debug!(reservation = %id, "reservation paid");
        Ok(())
    }

    /// `Held | Paid → Cancelled`, releasing the interval.
    ///
    /// Cancelling an unknown or already-cancelled reservation reports
    /// `UnknownReservation` and leaves everything untouched.
    pub async fn cancel(&self, id: ReservationId) -> Result<(), EngineError> {
        self.cancel_if(id, now_ms(), |_| true).await
    }

    /// Cancel only if the reservation is still `Held` past its payment deadline.
    /// Returns whether it was cancelled.
    pub async fn cancel_expired_hold(&self, id: ReservationId, now: Ms) -> Result<bool, EngineError> {
        let mut expired = false;
        self.cancel_if(id, now, |r| {
            expired = r.state == ReservationState::Held && r.held_until.is_some_and(|t| t <= now);
            expired
        })
        .await?;
        Ok(expired)
    }

    async fn cancel_if(
        &self,
        id: ReservationId,
        now: Ms,
        mut should_cancel: impl FnMut(&Reservation) -> bool,
    ) -> Result<(), EngineError> {
        let (_, mut facility) = self.resolve_reservation_write(&id).await?;
        let slot_id = {
            let mut entry = self
                .reservations
                .get_mut(&id)
                .ok_or(EngineError::UnknownReservation(id))?;
            let reservation = entry.value_mut();
            if reservation.state == ReservationState::Cancelled {
                return Err(EngineError::UnknownReservation(id));
            }
            if !should_cancel(reservation) {
                return Ok(());
            }
            transition(reservation, ReservationState::Cancelled)?;
            reservation.paid = false;
            reservation.held_until = None;
            reservation.slot_id
        };

        facility.index.release(id);
        self.refresh_slot_status(&mut facility, slot_id, now);
        metrics::counter!(CANCELLATIONS_TOTAL).increment(1);
        debug!(reservation = %id, slot = %slot_id, "reservation cancelled");
        Ok(())
    }

    /// `Paid → Active`: the requester has arrived.
    pub async fn check_in(&self, id: ReservationId) -> Result<(), EngineError> {
        let (_, mut facility) = self.resolve_reservation_write(&id).await?;
        let slot_id = {
            let mut entry = self
                .reservations
                .get_mut(&id)
                .ok_or(EngineError::UnknownReservation(id))?;
            let reservation = entry.value_mut();
            transition(reservation, ReservationState::Active)?;
            reservation.slot_id
        };
        if let Some(slot) = facility.catalog.get_mut(&slot_id) {
            slot.status = SlotStatus::Occupied;
        }
        debug!(reservation = %id, slot = %slot_id, "checked in");
        Ok(())
    }

    /// `Active → Released`. The rest of the window goes back to the pool.
    pub async fn check_out(&self, id: ReservationId) -> Result<(), EngineError> {
        let (_, mut facility) = self.resolve_reservation_write(&id).await?;
        let slot_id = {
            let mut entry = self
                .reservations
                .get_mut(&id)
                .ok_or(EngineError::UnknownReservation(id))?;
            let reservation = entry.value_mut();
            transition(reservation, ReservationState::Released)?;
            reservation.slot_id
        };
        facility.index.release(id);
        self.refresh_slot_status(&mut facility, slot_id, now_ms());
        debug!(reservation = %id, slot = %slot_id, "checked out");
        Ok(())
    }

    /// `Held` reservations whose payment deadline is at or before `now`.
    pub fn collect_expired_holds(&self, now: Ms) -> Vec<ReservationId> {
        self.reservations
            .iter()
            .filter(|e| {
                e.state == ReservationState::Held && e.held_until.is_some_and(|t| t <= now)
            })
            .map(|e| *e.key())
            .collect()
    }
}

fn transition(reservation: &mut Reservation, to: ReservationState) -> Result<(), EngineError> {
    if !reservation.state.can_become(to) {
        return Err(EngineError::InvalidTransition {
            from: reservation.state,
            to,
        });
    }
    reservation.state = to;
    Ok(())
}
