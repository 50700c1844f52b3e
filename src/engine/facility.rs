use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::model::*;

use super::catalog::Catalog;
use super::index::IntervalIndex;
use super::EngineError;

/// Everything guarded by one facility lock: the slot catalog and its interval index.
#[derive(Debug)]
pub struct FacilityState {
    pub id: FacilityId,
    pub name: Option<String>,
    /// Hourly rate per class. Fixed at creation.
    rates: BTreeMap<SlotClass, Decimal>,
    pub catalog: Catalog,
    pub index: IntervalIndex,
}

impl FacilityState {
    pub fn new(id: FacilityId, name: Option<String>, rates: BTreeMap<SlotClass, Decimal>) -> Self {
        Self {
            id,
            name,
            rates,
            catalog: Catalog::new(id),
            index: IntervalIndex::new(),
        }
    }

    pub fn rate_for(&self, class: SlotClass) -> Option<Decimal> {
        self.rates.get(&class).copied()
    }

    /// A facility only serves the classes it has a rate for.
    pub fn require_rate(&self, class: SlotClass) -> Result<Decimal, EngineError> {
        self.rate_for(class)
            .ok_or_else(|| EngineError::UnknownClass(class.to_string()))
    }

    pub fn info(&self) -> FacilityInfo {
        FacilityInfo {
            id: self.id,
            name: self.name.clone(),
            rates: self.rates.iter().map(|(c, r)| (*c, *r)).collect(),
            slot_count: self.catalog.len(),
        }
    }

    /// First slot in catalog order, at or after position `from`, that serves
    /// `class` and has nothing committed over `window`.
    pub fn first_fit(&self, class: SlotClass, window: &Span, from: usize) -> Option<(usize, SlotId)> {
        self.catalog
            .compatible_from(class, from)
            .find(|(_, slot)| !self.index.has_overlap(slot.id, window))
            .map(|(pos, slot)| (pos, slot.id))
    }
}
