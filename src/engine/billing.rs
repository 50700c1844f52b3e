use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::BillingMode;
use crate::model::*;

use super::{Engine, EngineError};

/// Price of holding a slot at `hourly_rate` for `span`.
///
/// Fails with `LimitExceeded` when the amount does not fit in a `Decimal`.
pub fn charge(hourly_rate: Decimal, span: &Span, mode: BillingMode) -> Result<Decimal, EngineError> {
    let duration = span.duration_ms();
    let amount = match mode {
        BillingMode::Fractional => Decimal::from(duration)
            .checked_div(Decimal::from(MS_PER_HOUR))
            .and_then(|hours| hourly_rate.checked_mul(hours))
            .map(|a| a.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)),
        BillingMode::WholeHours => hourly_rate.checked_mul(Decimal::from(duration / MS_PER_HOUR)),
    };
    amount.ok_or(EngineError::LimitExceeded("charge overflow"))
}

impl Engine {
    /// Cost of a reservation's full window at its facility's rate for the slot's class.
    pub async fn calculate(&self, id: ReservationId) -> Result<Decimal, EngineError> {
        let (facility_id, slot_id, span) = self
            .reservations
            .get(&id)
            .map(|r| (r.facility_id, r.slot_id, r.span))
            .ok_or(EngineError::UnknownReservation(id))?;
        let facility = self
            .get_facility(&facility_id)
            .ok_or(EngineError::UnknownFacility(facility_id))?;
        let guard = facility.read().await;
        let class = guard
            .catalog
            .get(&slot_id)
            .map(|s| s.class)
            .ok_or(EngineError::UnknownSlot(slot_id))?;
        let rate = guard.require_rate(class)?;
        charge(rate, &span, self.config().billing)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const H: Ms = 3_600_000;
    const M: Ms = 60_000;

    #[test]
    fn two_hours_at_three() {
        let span = Span::new(10 * H, 12 * H);
        assert_eq!(charge(dec!(3.0), &span, BillingMode::Fractional).unwrap(), dec!(6.0));
        assert_eq!(charge(dec!(3.0), &span, BillingMode::WholeHours).unwrap(), dec!(6.0));
    }

    #[test]
    fn fractional_counts_partial_hours() {
        let span = Span::new(0, 90 * M);
        assert_eq!(charge(dec!(3.0), &span, BillingMode::Fractional).unwrap(), dec!(4.50));
    }

    #[test]
    fn whole_hours_truncates() {
        let span = Span::new(0, 90 * M);
        assert_eq!(charge(dec!(3.0), &span, BillingMode::WholeHours).unwrap(), dec!(3.0));
        let short = Span::new(0, 59 * M);
        assert_eq!(charge(dec!(3.0), &short, BillingMode::WholeHours).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn fractional_rounds_to_cents() {
        // 20 minutes at 1.00/h = 0.3333...
        let span = Span::new(0, 20 * M);
        assert_eq!(charge(dec!(1.00), &span, BillingMode::Fractional).unwrap(), dec!(0.33));
        // 10 minutes at 0.27/h = 0.045 → 0.05
        let span = Span::new(0, 10 * M);
        assert_eq!(charge(dec!(0.27), &span, BillingMode::Fractional).unwrap(), dec!(0.05));
    }

    #[test]
    fn zero_rate_is_free() {
        let span = Span::new(0, 5 * H);
        assert_eq!(charge(Decimal::ZERO, &span, BillingMode::Fractional).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn overflowing_charge_is_an_error() {
        let span = Span::new(10 * H, 12 * H);
        for mode in [BillingMode::Fractional, BillingMode::WholeHours] {
            assert_eq!(
                charge(Decimal::MAX, &span, mode),
                Err(EngineError::LimitExceeded("charge overflow"))
            );
        }
    }
}
