use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError, FacilityState};

impl Engine {
    pub fn provision_facility(
        &self,
        name: Option<String>,
        rates: BTreeMap<SlotClass, Decimal>,
    ) -> Result<FacilityId, EngineError> {
        if self.facilities.len() >= MAX_FACILITIES {
            return Err(EngineError::LimitExceeded("too many facilities"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("facility name too long"));
        }
        let max_rate = Decimal::from(MAX_HOURLY_RATE);
        if let Some((class, _)) = rates
            .iter()
            .find(|(_, rate)| **rate < Decimal::ZERO || **rate > max_rate)
        {
            return Err(EngineError::InvalidRate(*class));
        }

        let id = FacilityId::generate();
        let state = FacilityState::new(id, name, rates);
        self.facilities.insert(id, Arc::new(RwLock::new(state)));
        info!(facility = %id, "facility provisioned");
        Ok(id)
    }

    pub async fn provision_slot(
        &self,
        facility_id: FacilityId,
        class: SlotClass,
    ) -> Result<SlotId, EngineError> {
        let facility = self
            .get_facility(&facility_id)
            .ok_or(EngineError::UnknownFacility(facility_id))?;
        let mut guard = facility.write().await;
        guard.require_rate(class)?;
        let slot_id = guard.catalog.provision(class)?;
        info!(facility = %facility_id, slot = %slot_id, %class, "slot provisioned");
        Ok(slot_id)
    }
}
