//! Drift classification.
//!
//! Pure comparison of a master snapshot against one receiver snapshot,
//! using the master-position linkage. Receiver positions with no master
//! link are manual trades and are never classified.

use relay_core::{Lots, MasterPosition, Px, ReceiverPosition};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// What the receiver side of a linked pair should look like.
///
/// `expected_volume` is the sizer's output for the master position against
/// the receiver's current balance; SL/TP are the master's levels. Tolerances
/// are one `lot_step` for volume and one tick for prices, so ordinary
/// rounding never reads as drift.
#[derive(Debug, Clone)]
pub struct LinkedExpectation {
    pub expected_volume: Lots,
    pub expected_sl: Option<Px>,
    pub expected_tp: Option<Px>,
    pub lot_step: Lots,
    pub tick_size: Decimal,
}

/// One detected inconsistency between master and receiver state.
#[derive(Debug, Clone)]
pub enum Discrepancy {
    /// Master position with no linked receiver position.
    MissingOnReceiver { master: MasterPosition },
    /// Receiver position whose master link points at a closed position.
    OrphanedOnReceiver { position: ReceiverPosition },
    /// Linked pair whose receiver volume is off by more than one lot step.
    VolumeMismatch {
        master: MasterPosition,
        position: ReceiverPosition,
        expected_volume: Lots,
    },
    /// Linked pair whose SL differs from the master beyond one tick.
    SlMismatch {
        master: MasterPosition,
        position: ReceiverPosition,
    },
    /// Linked pair whose TP differs from the master beyond one tick.
    TpMismatch {
        master: MasterPosition,
        position: ReceiverPosition,
    },
    /// Linked pair trading opposite directions. Never auto-corrected.
    DirectionMismatch {
        master: MasterPosition,
        position: ReceiverPosition,
    },
}

impl Discrepancy {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingOnReceiver { .. } => "missing_on_receiver",
            Self::OrphanedOnReceiver { .. } => "orphan_on_receiver",
            Self::VolumeMismatch { .. } => "volume_mismatch",
            Self::SlMismatch { .. } => "sl_mismatch",
            Self::TpMismatch { .. } => "tp_mismatch",
            Self::DirectionMismatch { .. } => "direction_mismatch",
        }
    }
}

fn px_differs(a: Option<Px>, b: Option<Px>, tick_size: Decimal) -> bool {
    match (a, b) {
        (None, None) => false,
        (Some(a), Some(b)) => a.distance(b) > tick_size,
        _ => true,
    }
}

/// Classify one receiver's snapshot against the master's.
///
/// `expectation` computes the expected receiver state for a master
/// position; `None` (mapping or sizing unavailable) limits the linked-pair
/// checks to direction, which needs no expectation.
pub fn classify_receiver(
    masters: &[MasterPosition],
    receivers: &[ReceiverPosition],
    mut expectation: impl FnMut(&MasterPosition) -> Option<LinkedExpectation>,
) -> Vec<Discrepancy> {
    let mut out = Vec::new();

    let linked: HashMap<_, _> = receivers
        .iter()
        .filter_map(|r| r.master_position.map(|mp| (mp, r)))
        .collect();

    for master in masters {
        let Some(&position) = linked.get(&master.id) else {
            out.push(Discrepancy::MissingOnReceiver {
                master: master.clone(),
            });
            continue;
        };

        if position.direction != master.direction {
            // Deeper inconsistency; volume and stop checks would be noise.
            out.push(Discrepancy::DirectionMismatch {
                master: master.clone(),
                position: position.clone(),
            });
            continue;
        }

        let Some(exp) = expectation(master) else {
            continue;
        };
        if position.volume.diff(exp.expected_volume).inner() > exp.lot_step.inner() {
            out.push(Discrepancy::VolumeMismatch {
                master: master.clone(),
                position: position.clone(),
                expected_volume: exp.expected_volume,
            });
        }
        if px_differs(position.sl, exp.expected_sl, exp.tick_size) {
            out.push(Discrepancy::SlMismatch {
                master: master.clone(),
                position: position.clone(),
            });
        }
        if px_differs(position.tp, exp.expected_tp, exp.tick_size) {
            out.push(Discrepancy::TpMismatch {
                master: master.clone(),
                position: position.clone(),
            });
        }
    }

    for receiver in receivers {
        let Some(mp) = receiver.master_position else {
            continue;
        };
        if !masters.iter().any(|m| m.id == mp) {
            out.push(Discrepancy::OrphanedOnReceiver {
                position: receiver.clone(),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{Direction, PositionId};
    use rust_decimal_macros::dec;

    fn master(id: u64, volume: Lots) -> MasterPosition {
        MasterPosition {
            id: PositionId(id),
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            volume,
            open_price: Px::new(dec!(1.1000)),
            sl: Some(Px::new(dec!(1.0950))),
            tp: None,
        }
    }

    fn linked_receiver(id: u64, master_id: u64, volume: Lots) -> ReceiverPosition {
        ReceiverPosition {
            id: PositionId(id),
            symbol: "EURUSD".to_string(),
            direction: Direction::Buy,
            volume,
            open_price: Px::new(dec!(1.1000)),
            sl: Some(Px::new(dec!(1.0950))),
            tp: None,
            master_position: Some(PositionId(master_id)),
        }
    }

    fn expectation(volume: Lots) -> LinkedExpectation {
        LinkedExpectation {
            expected_volume: volume,
            expected_sl: Some(Px::new(dec!(1.0950))),
            expected_tp: None,
            lot_step: Lots::new(dec!(0.01)),
            tick_size: dec!(0.00001),
        }
    }

    #[test]
    fn test_unlinked_master_is_missing() {
        let masters = vec![master(42, Lots::new(dec!(0.20)))];
        let found = classify_receiver(&masters, &[], |_| Some(expectation(Lots::new(dec!(0.20)))));
        assert_eq!(found.len(), 1);
        assert!(matches!(&found[0], Discrepancy::MissingOnReceiver { master } if master.id == PositionId(42)));
    }

    #[test]
    fn test_dead_master_link_is_orphan() {
        let receivers = vec![linked_receiver(700, 42, Lots::new(dec!(0.20)))];
        let found = classify_receiver(&[], &receivers, |_| None);
        assert_eq!(found.len(), 1);
        assert!(matches!(&found[0], Discrepancy::OrphanedOnReceiver { position } if position.id == PositionId(700)));
    }

    #[test]
    fn test_manual_position_never_classified() {
        let mut manual = linked_receiver(700, 42, Lots::new(dec!(0.20)));
        manual.master_position = None;
        let found = classify_receiver(&[], &[manual], |_| None);
        assert!(found.is_empty());
    }

    #[test]
    fn test_matching_pair_is_clean() {
        let masters = vec![master(42, Lots::new(dec!(0.20)))];
        let receivers = vec![linked_receiver(700, 42, Lots::new(dec!(0.20)))];
        let found = classify_receiver(&masters, &receivers, |_| {
            Some(expectation(Lots::new(dec!(0.20))))
        });
        assert!(found.is_empty());
    }

    #[test]
    fn test_volume_off_within_one_step_tolerated() {
        let masters = vec![master(42, Lots::new(dec!(0.20)))];
        let receivers = vec![linked_receiver(700, 42, Lots::new(dec!(0.20)))];
        // Expected 0.21, actual 0.20: exactly one lot step, tolerated.
        let found = classify_receiver(&masters, &receivers, |_| {
            Some(expectation(Lots::new(dec!(0.21))))
        });
        assert!(found.is_empty());
    }

    #[test]
    fn test_volume_off_beyond_tolerance_flagged() {
        let masters = vec![master(42, Lots::new(dec!(0.20)))];
        let receivers = vec![linked_receiver(700, 42, Lots::new(dec!(0.20)))];
        let found = classify_receiver(&masters, &receivers, |_| {
            Some(expectation(Lots::new(dec!(0.40))))
        });
        assert_eq!(found.len(), 1);
        assert!(matches!(
            &found[0],
            Discrepancy::VolumeMismatch { expected_volume, .. }
                if *expected_volume == Lots::new(dec!(0.40))
        ));
    }

    #[test]
    fn test_sl_drift_flagged() {
        let masters = vec![master(42, Lots::new(dec!(0.20)))];
        let mut receiver = linked_receiver(700, 42, Lots::new(dec!(0.20)));
        receiver.sl = Some(Px::new(dec!(1.0900)));
        let found = classify_receiver(&masters, &[receiver], |_| {
            Some(expectation(Lots::new(dec!(0.20))))
        });
        assert_eq!(found.len(), 1);
        assert!(matches!(&found[0], Discrepancy::SlMismatch { .. }));
    }

    #[test]
    fn test_missing_tp_on_receiver_flagged() {
        let masters = vec![master(42, Lots::new(dec!(0.20)))];
        let receivers = vec![linked_receiver(700, 42, Lots::new(dec!(0.20)))];
        let mut exp = expectation(Lots::new(dec!(0.20)));
        exp.expected_tp = Some(Px::new(dec!(1.1100)));
        let found = classify_receiver(&masters, &receivers, |_| Some(exp.clone()));
        assert_eq!(found.len(), 1);
        assert!(matches!(&found[0], Discrepancy::TpMismatch { .. }));
    }

    #[test]
    fn test_opposite_direction_masks_other_checks() {
        let masters = vec![master(42, Lots::new(dec!(0.20)))];
        let mut receiver = linked_receiver(700, 42, Lots::new(dec!(0.99)));
        receiver.direction = Direction::Sell;
        receiver.sl = None;
        let found = classify_receiver(&masters, &[receiver], |_| {
            Some(expectation(Lots::new(dec!(0.20))))
        });
        assert_eq!(found.len(), 1);
        assert!(matches!(&found[0], Discrepancy::DirectionMismatch { .. }));
    }
}
