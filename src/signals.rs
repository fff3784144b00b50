//! Bench signals and their byte layout in the frame payload.
//!
//! - `EngineSpeed`: bytes 0..2, big-endian
//! - `Torque`: bytes 2..4, big-endian
//! - `CoolantTemp`: byte 4
//!
//! A payload too short for a signal yields no value for it.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::parsers::Frame;

/// Signals checked on the bench
#[derive(
    AsRefStr,
    Display,
    EnumString,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum Signal {
    EngineSpeed,
    Torque,
    CoolantTemp,
}

impl Signal {
    /// Payload order, also the order of assignments in test definitions
    pub const ORDER: [Signal; 3] = [Signal::EngineSpeed, Signal::Torque, Signal::CoolantTemp];

    /// Raw value from a payload, `None` if the payload is too short
    pub fn extract(&self, payload: &[u8]) -> Option<i64> {
        match self {
            Signal::EngineSpeed => payload
                .get(0..2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]) as i64),
            Signal::Torque => payload
                .get(2..4)
                .map(|b| u16::from_be_bytes([b[0], b[1]]) as i64),
            Signal::CoolantTemp => payload.get(4).map(|&b| b as i64),
        }
    }

    /// Display unit of the raw value
    pub fn unit(&self) -> &'static str {
        match self {
            Signal::EngineSpeed => "rpm",
            Signal::Torque => "Nm",
            Signal::CoolantTemp => "°C",
        }
    }
}

/// Values of all signals in one frame, in `Signal::ORDER`
pub fn decode_frame(frame: &Frame) -> [Option<i64>; 3] {
    Signal::ORDER.map(|signal| signal.extract(&frame.data))
}

/// Min/Max/Mid reduction of a set of values
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SignalStats {
    pub min: i64,
    pub max: i64,
    /// Always `(min + max) / 2`
    pub mid: f64,
}

impl SignalStats {
    pub fn new(min: i64, max: i64) -> Self {
        Self {
            min,
            max,
            mid: (min as f64 + max as f64) / 2.0,
        }
    }

    /// `None` for an empty set
    pub fn from_values(values: impl IntoIterator<Item = i64>) -> Option<Self> {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Self::new(min, max))
    }

    /// Actual statistics of a signal over frames, optionally only those with `id`
    pub fn from_frames<'a>(
        signal: Signal,
        frames: impl IntoIterator<Item = &'a Frame>,
        id: Option<u32>,
    ) -> Option<Self> {
        Self::from_values(
            frames
                .into_iter()
                .filter(|f| id.map_or(true, |id| f.id == id))
                .filter_map(|f| signal.extract(&f.data)),
        )
    }
}
