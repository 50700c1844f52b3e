use std::collections::HashMap;

use crate::limits::MAX_INTERVALS_PER_SLOT;
use crate::model::*;

use super::availability::subtract_intervals;
use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalRecord {
    pub slot_id: SlotId,
    pub reservation_id: ReservationId,
    pub span: Span,
}

/// Committed intervals of one facility, per slot.
///
/// Records on a slot never overlap, so a vector sorted by `span.start` is also
/// sorted by `span.end`. Overlap and coverage checks only need the last record
/// starting before the probe, found by binary search.
#[derive(Debug, Default)]
pub struct IntervalIndex {
    by_slot: HashMap<SlotId, Vec<IntervalRecord>>,
    by_reservation: HashMap<ReservationId, SlotId>,
}

impl IntervalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_reservation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_reservation.is_empty()
    }

    /// Committed records of a slot, ordered by start.
    pub fn records(&self, slot_id: SlotId) -> &[IntervalRecord] {
        self.by_slot.get(&slot_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_overlap(&self, slot_id: SlotId, window: &Span) -> bool {
        self.first_overlap(slot_id, window).is_some()
    }

    /// The committed record on `slot_id` that overlaps `window`, if any.
    pub fn first_overlap(&self, slot_id: SlotId, window: &Span) -> Option<&IntervalRecord> {
        let records = self.records(slot_id);
        // Everything at index >= right_bound starts at or after window.end.
        let right_bound = records.partition_point(|r| r.span.start < window.end);
        let candidate = records[..right_bound].last()?;
        (candidate.span.end > window.start).then_some(candidate)
    }

    /// The committed record on `slot_id` covering the instant `t`, if any.
    pub fn covering(&self, slot_id: SlotId, t: Ms) -> Option<&IntervalRecord> {
        let records = self.records(slot_id);
        let right_bound = records.partition_point(|r| r.span.start <= t);
        let candidate = records[..right_bound].last()?;
        candidate.span.contains_instant(t).then_some(candidate)
    }

    /// Insert a record after re-checking for overlap under the caller's write lock.
    pub fn commit(
        &mut self,
        slot_id: SlotId,
        reservation_id: ReservationId,
        window: Span,
    ) -> Result<(), EngineError> {
        if let Some(existing) = self.first_overlap(slot_id, &window) {
            return Err(EngineError::Conflict(existing.reservation_id));
        }
        if self.by_reservation.contains_key(&reservation_id) {
            return Err(EngineError::Conflict(reservation_id));
        }
        let records = self.by_slot.entry(slot_id).or_default();
        if records.len() >= MAX_INTERVALS_PER_SLOT {
            return Err(EngineError::LimitExceeded("too many intervals on slot"));
        }
        let pos = records.partition_point(|r| r.span.start < window.start);
        records.insert(
            pos,
            IntervalRecord {
                slot_id,
                reservation_id,
                span: window,
            },
        );
        self.by_reservation.insert(reservation_id, slot_id);
        Ok(())
    }

    /// Remove the record of a reservation. Unknown ids are a no-op.
    pub fn release(&mut self, reservation_id: ReservationId) -> Option<IntervalRecord> {
        let slot_id = self.by_reservation.remove(&reservation_id)?;
        let records = self.by_slot.get_mut(&slot_id)?;
        let pos = records
            .iter()
            .position(|r| r.reservation_id == reservation_id)?;
        Some(records.remove(pos))
    }

    /// Gaps inside `query` on `slot_id` not covered by any committed record.
    pub fn gaps(&self, slot_id: SlotId, query: &Span) -> Vec<Span> {
        let records = self.records(slot_id);
        let right_bound = records.partition_point(|r| r.span.start < query.end);
        let taken: Vec<Span> = records[..right_bound]
            .iter()
            .filter(|r| r.span.end > query.start)
            .map(|r| r.span)
            .collect();
        subtract_intervals(&[*query], &taken)
    }
}
