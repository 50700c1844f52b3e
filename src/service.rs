//! Newline-delimited JSON front end over the engine.
//!
//! Each request line is an object tagged by `"op"`; each response line is either
//! `{"ok": <value>}` or `{"error": {"kind": "...", "message": "..."}}`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::engine::{Engine, EngineError};
use crate::limits::MAX_LINE_LEN;
use crate::model::*;
use crate::observability::{op_label, REQUESTS_TOTAL, REQUEST_DURATION_SECONDS};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ProvisionFacility {
        name: Option<String>,
        rates: BTreeMap<String, Decimal>,
    },
    ProvisionSlot {
        facility_id: FacilityId,
        class: String,
    },
    Reserve {
        facility_id: FacilityId,
        class: String,
        requester_id: String,
        start: Ms,
        end: Ms,
    },
    MarkPaid {
        reservation_id: ReservationId,
    },
    Cancel {
        reservation_id: ReservationId,
    },
    CheckIn {
        reservation_id: ReservationId,
    },
    CheckOut {
        reservation_id: ReservationId,
    },
    Calculate {
        reservation_id: ReservationId,
    },
    FreeSlots {
        facility_id: FacilityId,
        class: String,
        at: Ms,
    },
    FreeWindows {
        facility_id: FacilityId,
        class: String,
        start: Ms,
        end: Ms,
        min_duration_ms: Option<Ms>,
    },
    GetReservation {
        reservation_id: ReservationId,
    },
    SlotReservations {
        facility_id: FacilityId,
        slot_id: SlotId,
    },
    ListSlots {
        facility_id: FacilityId,
    },
    ListFacilities,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Ok(Value),
    Error { kind: String, message: String },
}

impl Reply {
    fn from_engine(err: &EngineError) -> Self {
        Reply::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Reply::Error {
            kind: "bad_request".into(),
            message: message.into(),
        }
    }
}

/// Execute one decoded request against the engine.
pub async fn execute(engine: &Engine, request: Request) -> Result<Value, EngineError> {
    let value = match request {
        Request::ProvisionFacility { name, rates } => {
            let rates = rates
                .into_iter()
                .map(|(class, rate)| Ok((class.parse::<SlotClass>()?, rate)))
                .collect::<Result<BTreeMap<_, _>, EngineError>>()?;
            json!(engine.provision_facility(name, rates)?)
        }
        Request::ProvisionSlot { facility_id, class } => {
            json!(engine.provision_slot(facility_id, class.parse()?).await?)
        }
        Request::Reserve {
            facility_id,
            class,
            requester_id,
            start,
            end,
        } => {
            let class: SlotClass = class.parse()?;
            // No availability is an empty result, not an error.
            json!(engine.reserve(facility_id, class, requester_id, start, end).await?)
        }
        Request::MarkPaid { reservation_id } => {
            engine.mark_paid(reservation_id)?;
            Value::Null
        }
        Request::Cancel { reservation_id } => {
            engine.cancel(reservation_id).await?;
            Value::Null
        }
        Request::CheckIn { reservation_id } => {
            engine.check_in(reservation_id).await?;
            Value::Null
        }
        Request::CheckOut { reservation_id } => {
            engine.check_out(reservation_id).await?;
            Value::Null
        }
        Request::Calculate { reservation_id } => json!(engine.calculate(reservation_id).await?),
        Request::FreeSlots {
            facility_id,
            class,
            at,
        } => json!(engine.free_slots(facility_id, class.parse()?, at).await?),
        Request::FreeWindows {
            facility_id,
            class,
            start,
            end,
            min_duration_ms,
        } => json!(
            engine
                .free_windows(facility_id, class.parse()?, start, end, min_duration_ms)
                .await?
        ),
        Request::GetReservation { reservation_id } => json!(
            engine
                .get_reservation(&reservation_id)
                .ok_or(EngineError::UnknownReservation(reservation_id))?
        ),
        Request::SlotReservations {
            facility_id,
            slot_id,
        } => {
            let slots = engine.slots_of(facility_id).await?;
            if !slots.iter().any(|s| s.id == slot_id) {
                return Err(EngineError::UnknownSlot(slot_id));
            }
            json!(engine.reservations_for_slot(slot_id))
        }
        Request::ListSlots { facility_id } => json!(engine.slots_of(facility_id).await?),
        Request::ListFacilities => json!(engine.list_facilities().await),
    };
    Ok(value)
}

/// Decode, execute and encode one request line. Never fails: problems become error replies.
pub async fn handle_line(engine: &Engine, line: &str) -> Reply {
    let request: Request = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            metrics::counter!(REQUESTS_TOTAL, "op" => "unknown", "status" => "error").increment(1);
            return Reply::bad_request(format!("malformed request: {e}"));
        }
    };

    let op = op_label(&request);
    let start = Instant::now();
    let result = execute(engine, request).await;
    metrics::histogram!(REQUEST_DURATION_SECONDS, "op" => op)
        .record(start.elapsed().as_secs_f64());

    match result {
        Ok(value) => {
            metrics::counter!(REQUESTS_TOTAL, "op" => op, "status" => "ok").increment(1);
            Reply::Ok(value)
        }
        Err(e) => {
            metrics::counter!(REQUESTS_TOTAL, "op" => op, "status" => "error").increment(1);
            tracing::debug!(op, error = %e, "request failed");
            Reply::from_engine(&e)
        }
    }
}

/// Serve one connection until the peer closes it or sends an over-long line.
pub async fn process_connection<S>(stream: S, engine: Arc<Engine>) -> Result<(), LinesCodecError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    while let Some(line) = framed.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(&engine, &line).await;
        let encoded = serde_json::to_string(&reply).unwrap_or_else(|e| {
            tracing::error!("failed to encode reply: {e}");
            r#"{"error":{"kind":"internal","message":"failed to encode reply"}}"#.to_string()
        });
        framed.send(encoded).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    fn line(value: Value) -> String {
        value.to_string()
    }

    async fn ok(engine: &Engine, request: Value) -> Value {
        match handle_line(engine, &line(request)).await {
            Reply::Ok(v) => v,
            other => panic!("expected ok, got {other:?}"),
        }
    }

    async fn err_kind(engine: &Engine, request: Value) -> String {
        match handle_line(engine, &line(request)).await {
            Reply::Error { kind, .. } => kind,
            other => panic!("expected error, got {other:?}"),
        }
    }

    async fn garage(engine: &Engine) -> Value {
        let fid = ok(
            engine,
            json!({"op": "provision_facility", "name": "Main St",
                   "rates": {"compact": "2.0", "regular": "3.0", "large": "5.0"}}),
        )
        .await;
        for class in ["compact", "regular", "large"] {
            ok(engine, json!({"op": "provision_slot", "facility_id": fid, "class": class})).await;
        }
        fid
    }

    #[test]
    fn request_decoding() {
        let req: Request = serde_json::from_str(r#"{"op":"list_facilities"}"#).unwrap();
        assert_eq!(req, Request::ListFacilities);

        let req: Request = serde_json::from_str(
            r#"{"op":"free_windows","facility_id":"01ARZ3NDEKTSV4RRFFQ69G5FAV","class":"large","start":0,"end":10}"#,
        )
        .unwrap();
        assert!(matches!(req, Request::FreeWindows { min_duration_ms: None, .. }));
    }

    #[test]
    fn reply_encoding() {
        let ok = serde_json::to_string(&Reply::Ok(Value::Null)).unwrap();
        assert_eq!(ok, r#"{"ok":null}"#);
        let err = serde_json::to_string(&Reply::bad_request("nope")).unwrap();
        assert_eq!(err, r#"{"error":{"kind":"bad_request","message":"nope"}}"#);
    }

    #[tokio::test]
    async fn reserve_pay_calculate_flow() {
        let engine = Engine::default();
        let fid = garage(&engine).await;

        let rid = ok(
            &engine,
            json!({"op": "reserve", "facility_id": fid, "class": "regular",
                   "requester_id": "alice", "start": 36_000_000, "end": 43_200_000}),
        )
        .await;
        assert!(rid.is_string());

        let cost = ok(&engine, json!({"op": "calculate", "reservation_id": rid})).await;
        let cost: Decimal = cost.as_str().unwrap().parse().unwrap();
        assert_eq!(cost, Decimal::from(6));

        ok(&engine, json!({"op": "mark_paid", "reservation_id": rid})).await;
        let r = ok(&engine, json!({"op": "get_reservation", "reservation_id": rid})).await;
        assert_eq!(r["state"], json!("paid"));
        assert_eq!(r["paid"], json!(true));
    }

    #[tokio::test]
    async fn no_availability_is_null_not_error() {
        let engine = Engine::default();
        let fid = ok(
            &engine,
            json!({"op": "provision_facility", "rates": {"compact": "1"}}),
        )
        .await;
        let reply = ok(
            &engine,
            json!({"op": "reserve", "facility_id": fid, "class": "compact",
                   "requester_id": "alice", "start": 0, "end": 1000}),
        )
        .await;
        assert_eq!(reply, Value::Null);
    }

    #[tokio::test]
    async fn error_kinds_on_the_wire() {
        let engine = Engine::default();
        let fid = garage(&engine).await;
        assert_eq!(
            err_kind(&engine, json!({"op": "provision_slot", "facility_id": fid, "class": "bus"})).await,
            "unknown_class"
        );
        assert_eq!(
            err_kind(
                &engine,
                json!({"op": "reserve", "facility_id": fid, "class": "compact",
                       "requester_id": "a", "start": 10, "end": 10})
            )
            .await,
            "invalid_window"
        );
        assert_eq!(
            err_kind(
                &engine,
                json!({"op": "list_slots", "facility_id": "01ARZ3NDEKTSV4RRFFQ69G5FAV"})
            )
            .await,
            "unknown_facility"
        );
        assert_eq!(
            err_kind(
                &engine,
                json!({"op": "provision_facility",
                       "rates": {"regular": "79228162514264337593543950335"}})
            )
            .await,
            "invalid_rate"
        );
        assert_eq!(err_kind(&engine, json!({"op": "teleport"})).await, "bad_request");
    }

    #[tokio::test]
    async fn slot_reservations_requires_slot_in_facility() {
        let engine = Engine::default();
        let fid = garage(&engine).await;
        assert_eq!(
            err_kind(
                &engine,
                json!({"op": "slot_reservations", "facility_id": fid,
                       "slot_id": "01ARZ3NDEKTSV4RRFFQ69G5FAV"})
            )
            .await,
            "unknown_slot"
        );
    }

    #[tokio::test]
    async fn connection_answers_each_line() {
        let engine = Arc::new(Engine::default());
        let stream = Builder::new()
            .read(b"{\"op\":\"list_facilities\"}\n")
            .write(b"{\"ok\":[]}\n")
            .read(b"\n")
            .read(b"{\"op\":\"calculate\",\"reservation_id\":\"01ARZ3NDEKTSV4RRFFQ69G5FAV\"}\n")
            .write(
                b"{\"error\":{\"kind\":\"unknown_reservation\",\
                  \"message\":\"unknown reservation: 01ARZ3NDEKTSV4RRFFQ69G5FAV\"}}\n",
            )
            .build();
        process_connection(stream, engine).await.unwrap();
    }

    #[tokio::test]
    async fn connection_rejects_overlong_line() {
        let engine = Arc::new(Engine::default());
        let long = vec![b'x'; MAX_LINE_LEN + 1];
        let stream = Builder::new().read(&long).build();
        let result = process_connection(stream, engine).await;
        assert!(matches!(result, Err(LinesCodecError::MaxLineLengthExceeded)));
    }
}
