//! Expected vs. actual signal comparison.
//!
//! A signal passes only when the actual min and max equal the expected min
//! and max exactly. There is no tolerance.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::parsers::Frame;
use crate::signals::{Signal, SignalStats};

#[derive(AsRefStr, Display, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// One line of the comparison table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub signal: Signal,
    pub expected: SignalStats,
    /// `None` when no frame carried the signal
    pub actual: Option<SignalStats>,
    pub verdict: Verdict,
}

impl ComparisonRow {
    pub fn new(signal: Signal, expected: SignalStats, actual: Option<SignalStats>) -> Self {
        let verdict = match actual {
            Some(actual) if actual.min == expected.min && actual.max == expected.max => {
                Verdict::Pass
            }
            _ => Verdict::Fail,
        };
        Self {
            signal,
            expected,
            actual,
            verdict,
        }
    }
}

/// Compare every expected signal against the frames, optionally only frames with `id`
pub fn compare(
    expected: &BTreeMap<Signal, SignalStats>,
    frames: &[Frame],
    id: Option<u32>,
) -> Vec<ComparisonRow> {
    expected
        .iter()
        .map(|(signal, stats)| {
            let actual = SignalStats::from_frames(*signal, frames, id);
            let row = ComparisonRow::new(*signal, *stats, actual);
            tracing::info!(
                "{}: expected {}..{}, actual {}, {}",
                signal,
                stats.min,
                stats.max,
                actual.map_or("missing".to_string(), |a| format!("{}..{}", a.min, a.max)),
                row.verdict
            );
            row
        })
        .collect()
}

/// True when any row failed; an empty table has no failures
pub fn any_failed(rows: &[ComparisonRow]) -> bool {
    rows.iter().any(|r| !r.verdict.is_pass())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::Direction;

    fn frame(id: u32, speed: u16, torque: u16, temp: u8) -> Frame {
        let mut data = Vec::new();
        data.extend_from_slice(&speed.to_be_bytes());
        data.extend_from_slice(&torque.to_be_bytes());
        data.push(temp);
        Frame {
            timestamp: 0.0,
            id,
            is_extended: false,
            is_remote: false,
            is_fd: false,
            channel: 0,
            direction: Direction::Rx,
            dlc: data.len() as u8,
            data,
        }
    }

    fn expected(signal: Signal, min: i64, max: i64) -> BTreeMap<Signal, SignalStats> {
        BTreeMap::from([(signal, SignalStats::new(min, max))])
    }

    #[test]
    fn test_exact_match_passes() {
        let frames = vec![frame(0x100, 800, 10, 20), frame(0x100, 6500, 420, 115)];
        let mut exp = expected(Signal::EngineSpeed, 800, 6500);
        exp.insert(Signal::Torque, SignalStats::new(10, 420));
        exp.insert(Signal::CoolantTemp, SignalStats::new(20, 115));

        let rows = compare(&exp, &frames, None);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.verdict == Verdict::Pass));
        assert!(!any_failed(&rows));
    }

    #[test]
    fn test_off_by_one_fails() {
        let frames = vec![frame(0x100, 800, 10, 20), frame(0x100, 6500, 420, 115)];

        let rows = compare(&expected(Signal::EngineSpeed, 801, 6500), &frames, None);
        assert_eq!(rows[0].verdict, Verdict::Fail);

        let rows = compare(&expected(Signal::EngineSpeed, 800, 6499), &frames, None);
        assert_eq!(rows[0].verdict, Verdict::Fail);
        assert!(any_failed(&rows));
    }

    #[test]
    fn test_mid_is_not_compared() {
        let row = ComparisonRow::new(
            Signal::Torque,
            SignalStats::new(0, 10),
            Some(SignalStats {
                min: 0,
                max: 10,
                mid: 99.0,
            }),
        );
        assert_eq!(row.verdict, Verdict::Pass);
    }

    #[test]
    fn test_id_filter() {
        let frames = vec![frame(0x100, 1000, 0, 0), frame(0x200, 9000, 0, 0)];
        let exp = expected(Signal::EngineSpeed, 1000, 1000);

        assert_eq!(compare(&exp, &frames, Some(0x100))[0].verdict, Verdict::Pass);
        assert_eq!(compare(&exp, &frames, None)[0].verdict, Verdict::Fail);
    }

    #[test]
    fn test_missing_actual_fails() {
        let rows = compare(&expected(Signal::CoolantTemp, 20, 30), &[], None);
        assert_eq!(rows[0].actual, None);
        assert_eq!(rows[0].verdict, Verdict::Fail);
    }

    #[test]
    fn test_empty_expectations() {
        let rows = compare(&BTreeMap::new(), &[frame(1, 1, 1, 1)], None);
        assert!(rows.is_empty());
        assert!(!any_failed(&rows));
    }
}
