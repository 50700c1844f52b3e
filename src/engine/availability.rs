use crate::limits::MAX_QUERY_WINDOW_MS;
use crate::model::*;

use super::{validate_window, Engine, EngineError};

impl Engine {
    /// Free gaps inside `[start, end)` for every slot that can serve `class`,
    /// in catalog order. Slots with no gap of at least `min_duration_ms` are omitted.
    pub async fn free_windows(
        &self,
        facility_id: FacilityId,
        class: SlotClass,
        start: Ms,
        end: Ms,
        min_duration_ms: Option<Ms>,
    ) -> Result<Vec<SlotWindows>, EngineError> {
        let query = validate_window(start, end)?;
        if query.duration_ms() > MAX_QUERY_WINDOW_MS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }
        let facility = self
            .get_facility(&facility_id)
            .ok_or(EngineError::UnknownFacility(facility_id))?;
        let guard = facility.read().await;
        guard.require_rate(class)?;

        let result = guard
            .catalog
            .compatible(class)
            .filter_map(|slot| {
                let mut free = guard.index.gaps(slot.id, &query);
                if let Some(min_dur) = min_duration_ms {
                    free.retain(|span| span.duration_ms() >= min_dur);
                }
                (!free.is_empty()).then(|| SlotWindows {
                    slot_id: slot.id,
                    class: slot.class,
                    free,
                })
            })
            .collect();
        Ok(result)
    }
}

/// Remove `to_remove` from `base`. Both inputs sorted by start; `base` disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
