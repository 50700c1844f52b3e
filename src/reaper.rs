use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;
use crate::model::Ms;
use crate::observability::HOLDS_REAPED_TOTAL;

/// Background task that periodically cancels unpaid holds past their deadline.
pub async fn run_reaper(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        reap_once(&engine, crate::engine::now_ms()).await;
    }
}

/// One reaper pass at `now`. Returns how many holds were cancelled.
pub async fn reap_once(engine: &Engine, now: Ms) -> usize {
    let mut reaped = 0;
    for id in engine.collect_expired_holds(now) {
        match engine.cancel_expired_hold(id, now).await {
            Ok(true) => {
                reaped += 1;
                metrics::counter!(HOLDS_REAPED_TOTAL).increment(1);
                info!("reaped expired hold {id}");
            }
            // Paid between collection and cancellation.
            Ok(false) => tracing::debug!("reaper skip {id}: no longer an expired hold"),
            Err(e) => tracing::debug!("reaper skip {id}: {e}"),
        }
    }
    reaped
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::config::EngineConfig;
    use crate::model::*;

    const H: Ms = 3_600_000;

    async fn engine_with_slot(hold_ttl_ms: Option<Ms>) -> (Engine, FacilityId) {
        let engine = Engine::new(EngineConfig {
            hold_ttl_ms,
            ..EngineConfig::default()
        });
        let fid = engine
            .provision_facility(None, BTreeMap::from([(SlotClass::Regular, dec!(3))]))
            .unwrap();
        engine.provision_slot(fid, SlotClass::Regular).await.unwrap();
        (engine, fid)
    }

    #[tokio::test]
    async fn reaper_cancels_expired_holds() {
        let (engine, fid) = engine_with_slot(Some(1_000)).await;
        let rid = engine
            .reserve(fid, SlotClass::Regular, "alice", 10 * H, 12 * H)
            .await
            .unwrap()
            .unwrap();
        let deadline = engine.get_reservation(&rid).unwrap().held_until.unwrap();

        assert!(engine.collect_expired_holds(deadline - 1).is_empty());
        assert_eq!(engine.collect_expired_holds(deadline), vec![rid]);

        assert_eq!(reap_once(&engine, deadline).await, 1);
        let r = engine.get_reservation(&rid).unwrap();
        assert_eq!(r.state, ReservationState::Cancelled);
        assert!(engine.collect_expired_holds(deadline).is_empty());

        // The window is free again.
        let again = engine
            .reserve(fid, SlotClass::Regular, "bob", 10 * H, 12 * H)
            .await
            .unwrap();
        assert!(again.is_some());
    }

    #[tokio::test]
    async fn reaper_leaves_paid_reservations_alone() {
        let (engine, fid) = engine_with_slot(Some(1_000)).await;
        let rid = engine
            .reserve(fid, SlotClass::Regular, "alice", 10 * H, 12 * H)
            .await
            .unwrap()
            .unwrap();
        engine.mark_paid(rid).unwrap();

        let far_future = crate::engine::now_ms() + 10 * H;
        assert!(engine.collect_expired_holds(far_future).is_empty());
        assert_eq!(reap_once(&engine, far_future).await, 0);
        assert_eq!(
            engine.get_reservation(&rid).unwrap().state,
            ReservationState::Paid
        );
    }

    #[tokio::test]
    async fn expired_check_rejects_paid_reservation() {
        let (engine, fid) = engine_with_slot(Some(1_000)).await;
        let rid = engine
            .reserve(fid, SlotClass::Regular, "alice", 10 * H, 12 * H)
            .await
            .unwrap()
            .unwrap();
        let deadline = engine.get_reservation(&rid).unwrap().held_until.unwrap();
        // Collected as expired, then paid before the reaper gets to it.
        let expired = engine.collect_expired_holds(deadline);
        engine.mark_paid(rid).unwrap();
        assert!(!engine.cancel_expired_hold(expired[0], deadline).await.unwrap());
        assert_eq!(
            engine.get_reservation(&rid).unwrap().state,
            ReservationState::Paid
        );
    }

    #[tokio::test]
    async fn holds_without_ttl_never_expire() {
        let (engine, fid) = engine_with_slot(None).await;
        let rid = engine
            .reserve(fid, SlotClass::Regular, "alice", 10 * H, 12 * H)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(engine.get_reservation(&rid).unwrap().held_until, None);
        assert!(engine.collect_expired_holds(Ms::MAX).is_empty());
    }
}
