use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    UnknownFacility(FacilityId),
    UnknownClass(String),
    UnknownSlot(SlotId),
    UnknownReservation(ReservationId),
    InvalidWindow { start: Ms, end: Ms },
    InvalidRate(SlotClass),
    /// Commit-time overlap with the given reservation. Retried inside `reserve`.
    Conflict(ReservationId),
    /// Every commit attempt of a `reserve` lost a race.
    Contention { attempts: u32 },
    InvalidTransition {
        from: ReservationState,
        to: ReservationState,
    },
    LimitExceeded(&'static str),
}

impl EngineError {
    /// Stable machine-readable name, used on the wire and as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::UnknownFacility(_) => "unknown_facility",
            EngineError::UnknownClass(_) => "unknown_class",
            EngineError::UnknownSlot(_) => "unknown_slot",
            EngineError::UnknownReservation(_) => "unknown_reservation",
            EngineError::InvalidWindow { .. } => "invalid_window",
            EngineError::InvalidRate(_) => "invalid_rate",
            EngineError::Conflict(_) => "conflict",
            EngineError::Contention { .. } => "contention",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::LimitExceeded(_) => "limit_exceeded",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownFacility(id) => write!(f, "unknown facility: {id}"),
            EngineError::UnknownClass(class) => write!(f, "unknown class: {class}"),
            EngineError::UnknownSlot(id) => write!(f, "unknown slot: {id}"),
            EngineError::UnknownReservation(id) => write!(f, "unknown reservation: {id}"),
            EngineError::InvalidWindow { start, end } => {
                write!(f, "invalid window [{start}, {end}): start must be before end")
            }
            EngineError::InvalidRate(class) => {
                write!(f, "invalid rate for class {class}: must not be negative")
            }
            EngineError::Conflict(id) => write!(f, "conflict with reservation: {id}"),
            EngineError::Contention { attempts } => {
                write!(f, "gave up after {attempts} contended commit attempts")
            }
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid transition: {from} -> {to}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
