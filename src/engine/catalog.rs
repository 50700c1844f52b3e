use std::collections::HashMap;

use crate::limits::MAX_SLOTS_PER_FACILITY;
use crate::model::*;

use super::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: SlotId,
    pub facility_id: FacilityId,
    pub class: SlotClass,
    pub status: SlotStatus,
}

impl Slot {
    pub fn info(&self) -> SlotInfo {
        SlotInfo {
            id: self.id,
            facility_id: self.facility_id,
            class: self.class,
            status: self.status,
        }
    }
}

/// Append-only slot list of one facility. Insertion order is the first-fit scan order.
#[derive(Debug)]
pub struct Catalog {
    facility_id: FacilityId,
    slots: Vec<Slot>,
    positions: HashMap<SlotId, usize>,
}

impl Catalog {
    pub fn new(facility_id: FacilityId) -> Self {
        Self {
            facility_id,
            slots: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn provision(&mut self, class: SlotClass) -> Result<SlotId, EngineError> {
        if self.slots.len() >= MAX_SLOTS_PER_FACILITY {
            return Err(EngineError::LimitExceeded("too many slots in facility"));
        }
        let id = SlotId::generate();
        self.positions.insert(id, self.slots.len());
        self.slots.push(Slot {
            id,
            facility_id: self.facility_id,
            class,
            status: SlotStatus::Free,
        });
        Ok(id)
    }

    pub fn get(&self, id: &SlotId) -> Option<&Slot> {
        self.positions.get(id).map(|&pos| &self.slots[pos])
    }

    pub fn get_mut(&mut self, id: &SlotId) -> Option<&mut Slot> {
        self.positions.get(id).map(|&pos| &mut self.slots[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    /// Slots that can serve `requested`, in catalog order.
    pub fn compatible(&self, requested: SlotClass) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(move |s| s.class.satisfies(requested))
    }

    /// Like [`Catalog::compatible`], paired with catalog positions and starting at `from`.
    pub fn compatible_from(
        &self,
        requested: SlotClass,
        from: usize,
    ) -> impl Iterator<Item = (usize, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .skip(from)
            .filter(move |(_, s)| s.class.satisfies(requested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_of(classes: &[SlotClass]) -> (Catalog, Vec<SlotId>) {
        let mut catalog = Catalog::new(FacilityId::generate());
        let ids = classes
            .iter()
            .map(|&c| catalog.provision(c).unwrap())
            .collect();
        (catalog, ids)
    }

    #[test]
    fn provision_preserves_insertion_order() {
        let (catalog, ids) = catalog_of(&[SlotClass::Large, SlotClass::Compact, SlotClass::Regular]);
        let listed: Vec<SlotId> = catalog.iter().map(|s| s.id).collect();
        assert_eq!(listed, ids);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn new_slots_start_free() {
        let (catalog, ids) = catalog_of(&[SlotClass::Compact]);
        let slot = catalog.get(&ids[0]).unwrap();
        assert_eq!(slot.status, SlotStatus::Free);
        assert_eq!(slot.class, SlotClass::Compact);
    }

    #[test]
    fn compatible_includes_universal_slots() {
        let (catalog, ids) =
            catalog_of(&[SlotClass::Regular, SlotClass::Compact, SlotClass::Large]);
        let compact: Vec<SlotId> = catalog.compatible(SlotClass::Compact).map(|s| s.id).collect();
        assert_eq!(compact, vec![ids[1], ids[2]]);
        let regular: Vec<SlotId> = catalog.compatible(SlotClass::Regular).map(|s| s.id).collect();
        assert_eq!(regular, vec![ids[0], ids[2]]);
        let large: Vec<SlotId> = catalog.compatible(SlotClass::Large).map(|s| s.id).collect();
        assert_eq!(large, vec![ids[2]]);
    }

    #[test]
    fn compatible_from_skips_earlier_positions() {
        let (catalog, ids) = catalog_of(&[SlotClass::Compact, SlotClass::Compact, SlotClass::Compact]);
        let rest: Vec<(usize, SlotId)> = catalog
            .compatible_from(SlotClass::Compact, 1)
            .map(|(pos, s)| (pos, s.id))
            .collect();
        assert_eq!(rest, vec![(1, ids[1]), (2, ids[2])]);
    }

    #[test]
    fn unknown_slot_lookup() {
        let (mut catalog, _) = catalog_of(&[SlotClass::Compact]);
        assert!(catalog.get(&SlotId::generate()).is_none());
        assert!(catalog.get_mut(&SlotId::generate()).is_none());
    }
}
