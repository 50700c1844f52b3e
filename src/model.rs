use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

pub const MS_PER_HOUR: Ms = 3_600_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ── Identifiers ──────────────────────────────────────────────────

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            #[inline]
            pub const fn value(self) -> Ulid {
                self.0
            }
        }

        impl From<Ulid> for $name {
            fn from(value: Ulid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(
    /// A site owning slots and a rate table.
    FacilityId
);
ulid_id!(SlotId);
ulid_id!(ReservationId);

// ── Classes and states ───────────────────────────────────────────

/// Compatibility tag of a slot. `Large` is the universal class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotClass {
    Compact,
    Regular,
    Large,
}

impl SlotClass {
    pub const ALL: [SlotClass; 3] = [SlotClass::Compact, SlotClass::Regular, SlotClass::Large];

    pub fn is_universal(self) -> bool {
        self == SlotClass::Large
    }

    /// Whether a slot of this class can serve a request for `requested`.
    pub fn satisfies(self, requested: SlotClass) -> bool {
        self == requested || self.is_universal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SlotClass::Compact => "compact",
            SlotClass::Regular => "regular",
            SlotClass::Large => "large",
        }
    }
}

impl fmt::Display for SlotClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotClass {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotClass::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::UnknownClass(s.to_string()))
    }
}

/// Fast-path hint only. The interval index decides availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Free,
    Reserved,
    Occupied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Held,
    Paid,
    Active,
    Released,
    Cancelled,
}

impl ReservationState {
    /// Held → Paid → Active → Released, and Held | Paid → Cancelled.
    pub fn can_become(self, next: ReservationState) -> bool {
        use ReservationState::*;
        matches!(
            (self, next),
            (Held, Paid) | (Paid, Active) | (Active, Released) | (Held | Paid, Cancelled)
        )
    }

    /// Still holds its interval in the index.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            ReservationState::Held | ReservationState::Paid | ReservationState::Active
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationState::Held => "held",
            ReservationState::Paid => "paid",
            ReservationState::Active => "active",
            ReservationState::Released => "released",
            ReservationState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub facility_id: FacilityId,
    pub slot_id: SlotId,
    pub requester_id: String,
    pub span: Span,
    pub paid: bool,
    pub state: ReservationState,
    pub created_at: Ms,
    /// Deadline for payment while `Held`; the reaper cancels the reservation after it.
    pub held_until: Option<Ms>,
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub id: SlotId,
    pub facility_id: FacilityId,
    pub class: SlotClass,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacilityInfo {
    pub id: FacilityId,
    pub name: Option<String>,
    pub rates: Vec<(SlotClass, Decimal)>,
    pub slot_count: usize,
}

/// Free gaps of one slot inside a query window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotWindows {
    pub slot_id: SlotId,
    pub class: SlotClass,
    pub free: Vec<Span>,
}
