//! Outbound command model for the execution boundary.

use crate::decimal::{Lots, Px};
use crate::signal::{AccountId, Direction, PositionId};
use serde::{Deserialize, Serialize};

/// Command payload, tagged by operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    Open {
        symbol: String,
        direction: Direction,
        volume: Lots,
        price: Px,
        sl: Option<Px>,
        tp: Option<Px>,
        /// Master position the opened copy links back to.
        master_position: PositionId,
    },
    Close {
        position: PositionId,
        symbol: String,
    },
    ModifyVolume {
        position: PositionId,
        symbol: String,
        target_volume: Lots,
    },
    ModifySlTp {
        position: PositionId,
        symbol: String,
        sl: Option<Px>,
        tp: Option<Px>,
    },
}

impl CommandKind {
    /// Stable label for logging and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::ModifyVolume { .. } => "modify_volume",
            Self::ModifySlTp { .. } => "modify_sltp",
        }
    }

    /// Whether this command opens new exposure.
    ///
    /// Halted receivers reject these; close/modify still pass.
    #[must_use]
    pub fn opens_exposure(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Symbol the command acts on.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Open { symbol, .. }
            | Self::Close { symbol, .. }
            | Self::ModifyVolume { symbol, .. }
            | Self::ModifySlTp { symbol, .. } => symbol,
        }
    }
}

/// An instruction ready for dispatch to one receiver's execution agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCommand {
    pub receiver: AccountId,
    pub kind: CommandKind,
}

impl ExecutionCommand {
    #[must_use]
    pub fn new(receiver: AccountId, kind: CommandKind) -> Self {
        Self { receiver, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_opens_exposure() {
        let open = CommandKind::Open {
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            volume: Lots::new(dec!(0.10)),
            price: Px::new(dec!(1.1000)),
            sl: None,
            tp: None,
            master_position: PositionId(1),
        };
        let close = CommandKind::Close {
            position: PositionId(7),
            symbol: "EURUSD".to_string(),
        };
        assert!(open.opens_exposure());
        assert!(!close.opens_exposure());
    }

    #[test]
    fn test_kind_labels() {
        let modify = CommandKind::ModifySlTp {
            position: PositionId(7),
            symbol: "XAUUSD".to_string(),
            sl: Some(Px::new(dec!(1900))),
            tp: None,
        };
        assert_eq!(modify.as_str(), "modify_sltp");
        assert_eq!(modify.symbol(), "XAUUSD");
    }
}
