use chrono::NaiveDateTime;
use serde::Serialize;
use strum::{AsRefStr, Display};

use super::asc::AscMeta;
use super::blf::BlfMeta;
use crate::error::ParseError;

/// Metadata enum supporting different log formats
#[derive(Clone, Debug, Serialize, Default)]
pub enum Meta {
    Blf(BlfMeta),
    Asc(AscMeta),
    #[default]
    Empty,
}

impl Meta {
    /// Absolute start of the measurement, when the format records one
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        match self {
            Meta::Blf(b) => b.start_time,
            Meta::Asc(a) => a.start_time,
            Meta::Empty => None,
        }
    }
}

/// Direction of a frame relative to the logging node
#[derive(AsRefStr, Display, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Direction {
    Rx,
    Tx,
}

/// One decoded bus frame
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Frame {
    /// Seconds since measurement start
    pub timestamp: f64,
    /// Arbitration id with the extended-id marker bit removed
    pub id: u32,
    pub is_extended: bool,
    pub is_remote: bool,
    pub is_fd: bool,
    /// Zero-based channel index
    pub channel: u16,
    pub direction: Direction,
    /// Payload length in bytes
    pub dlc: u8,
    pub data: Vec<u8>,
}

impl Frame {
    /// Identifier as lowercase `0x` hex
    pub fn id_hex(&self) -> String {
        format!("{:#x}", self.id)
    }

    /// Payload as space separated hex bytes
    pub fn data_hex(&self) -> String {
        self.data
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parsed log file structure
#[derive(Clone, Debug, Default)]
pub struct Log {
    pub meta: Meta,
    pub frames: Vec<Frame>,
}

impl Log {
    /// Time span covered by the frames, in seconds
    pub fn time_range(&self) -> Option<(f64, f64)> {
        let first = self.frames.first()?.timestamp;
        let (min, max) = self
            .frames
            .iter()
            .fold((first, first), |(lo, hi), f| (lo.min(f.timestamp), hi.max(f.timestamp)));
        Some((min, max))
    }
}

/// Options shared by all readers
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadOptions {
    /// Stop after this many frames
    pub max_frames: Option<usize>,
}

impl ReadOptions {
    pub(crate) fn is_full(&self, frames: &[Frame]) -> bool {
        self.max_frames.is_some_and(|max| frames.len() >= max)
    }
}

/// Trait for log file readers
pub trait Parseable {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// Cheap check whether the data looks like this format
    fn detect(&self, data: &[u8]) -> bool;

    fn parse(&self, data: &[u8], options: &ReadOptions) -> Result<Log, ParseError>;
}
