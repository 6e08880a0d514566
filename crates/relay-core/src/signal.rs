//! Replication domain model: accounts, signals, positions.

use crate::decimal::{Lots, Px};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading account identifier (master or receiver).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Broker-side position ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a master trade event.
///
/// Generated at the source; duplicate deliveries of the same event carry
/// the same id, which is what the idempotency layer keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random event id.
    ///
    /// Used when reconstructing a signal from a master position snapshot,
    /// where no original event id is available.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Kind of master trade event carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalEvent {
    Open,
    Close,
    ModifySlTp,
    ModifyVolume,
}

impl SignalEvent {
    /// Stable label for metrics and idempotency hashing.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::ModifySlTp => "modify_sltp",
            Self::ModifyVolume => "modify_volume",
        }
    }
}

/// A trade event observed on the master account.
///
/// Transient: consumed once per receiver and not persisted beyond the
/// idempotency dedup window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub event_id: EventId,
    pub master_account: AccountId,
    /// Master position this event refers to. Open events establish the
    /// master→receiver linkage under this id.
    pub master_position: PositionId,
    pub symbol: String,
    pub direction: Direction,
    pub volume: Lots,
    pub price: Px,
    pub sl: Option<Px>,
    pub tp: Option<Px>,
    pub event: SignalEvent,
    pub timestamp: DateTime<Utc>,
}

/// Open position on the master account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterPosition {
    pub id: PositionId,
    pub symbol: String,
    pub direction: Direction,
    pub volume: Lots,
    pub open_price: Px,
    pub sl: Option<Px>,
    pub tp: Option<Px>,
}

/// Open position on a receiver account.
///
/// `master_position` is the linkage invariant: a position created by a copy
/// carries exactly one master position id; a manually opened position carries
/// none and is never touched by reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverPosition {
    pub id: PositionId,
    pub symbol: String,
    pub direction: Direction,
    pub volume: Lots,
    pub open_price: Px,
    pub sl: Option<Px>,
    pub tp: Option<Px>,
    pub master_position: Option<PositionId>,
}

impl MasterPosition {
    /// Reconstruct the open signal this position originated from.
    ///
    /// Used by reconciliation to route a missed open back through the normal
    /// sizing and safety path. The event id is freshly generated, so the
    /// idempotency layer treats the corrective open as a new event.
    #[must_use]
    pub fn to_open_signal(&self, master_account: AccountId) -> TradeSignal {
        TradeSignal {
            event_id: EventId::generate(),
            master_account,
            master_position: self.id,
            symbol: self.symbol.clone(),
            direction: self.direction,
            volume: self.volume,
            price: self.open_price,
            sl: self.sl,
            tp: self.tp,
            event: SignalEvent::Open,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::Buy.opposite(), Direction::Sell);
        assert_eq!(Direction::Sell.opposite(), Direction::Buy);
    }

    #[test]
    fn test_signal_event_labels() {
        assert_eq!(SignalEvent::Open.as_str(), "open");
        assert_eq!(SignalEvent::ModifySlTp.as_str(), "modify_sltp");
    }

    #[test]
    fn test_master_position_to_open_signal() {
        let pos = MasterPosition {
            id: PositionId(42),
            symbol: "EURUSD".to_string(),
            direction: Direction::Sell,
            volume: Lots::new(dec!(0.30)),
            open_price: Px::new(dec!(1.0850)),
            sl: Some(Px::new(dec!(1.0900))),
            tp: None,
        };
        let sig = pos.to_open_signal(AccountId::from("master-1"));
        assert_eq!(sig.master_position, PositionId(42));
        assert_eq!(sig.event, SignalEvent::Open);
        assert_eq!(sig.direction, Direction::Sell);
        assert_eq!(sig.volume, Lots::new(dec!(0.30)));
        assert_eq!(sig.sl, Some(Px::new(dec!(1.0900))));
    }

    #[test]
    fn test_generated_event_ids_unique() {
        assert_ne!(EventId::generate(), EventId::generate());
    }
}
