//! Vector ASCII log (.asc) reader.
//!
//! Handles the header lines (`date`, `base`, `timestamps`), classic CAN
//! frame lines and `CANFD` lines. Events, statistics and error frames are
//! skipped.

use chrono::NaiveDateTime;
use regex::{Captures, Regex};
use serde::Serialize;

use super::types::{Direction, Frame, Log, Meta, Parseable, ReadOptions};
use crate::error::ParseError;

const DATE_FORMATS: &[&str] = &[
    "%a %b %d %I:%M:%S%.f %p %Y",
    "%a %b %d %H:%M:%S%.f %Y",
    "%a %b %d %I:%M:%S %p %Y",
];

/// ASC header information
#[derive(Clone, Debug, Serialize)]
pub struct AscMeta {
    /// Number base for ids and data bytes, 16 or 10
    pub base: u32,
    pub timestamps_absolute: bool,
    pub start_time: Option<NaiveDateTime>,
    /// Lines that were neither header nor frame
    pub skipped_lines: usize,
}

impl Default for AscMeta {
    fn default() -> Self {
        Self {
            base: 16,
            timestamps_absolute: false,
            start_time: None,
            skipped_lines: 0,
        }
    }
}

/// ASC log reader
pub struct Asc;

impl Asc {
    fn parse_date(value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    }

    fn parse_bytes(tokens: &str, base: u32, count: usize, line: usize) -> Result<Vec<u8>, ParseError> {
        tokens
            .split_whitespace()
            .take(count)
            .map(|t| {
                u8::from_str_radix(t, base).map_err(|e| ParseError::Line {
                    line,
                    message: format!("invalid data byte {:?}: {}", t, e),
                })
            })
            .collect()
    }

    fn parse_number(caps: &Captures, name: &str, base: u32, line: usize) -> Result<u32, ParseError> {
        let text = &caps[name];
        u32::from_str_radix(text, base).map_err(|e| ParseError::Line {
            line,
            message: format!("invalid {} {:?}: {}", name, text, e),
        })
    }

    fn direction(caps: &Captures) -> Direction {
        if &caps["dir"] == "Tx" {
            Direction::Tx
        } else {
            Direction::Rx
        }
    }
}

impl Parseable for Asc {
    fn name(&self) -> &'static str {
        "ASC"
    }

    fn detect(&self, data: &[u8]) -> bool {
        let start = data.trim_ascii_start();
        start.starts_with(b"date") || start.starts_with(b"base")
    }

    fn parse(&self, data: &[u8], options: &ReadOptions) -> Result<Log, ParseError> {
        let text = std::str::from_utf8(data).map_err(|_| ParseError::BadSignature {
            expected: "ASCII log text",
        })?;

        let header_regex = Regex::new(r"^(?<key>date|base|timestamps)\s+(?<value>.+)$")
            .expect("Failed to compile regex");
        let classic_regex = Regex::new(
            r"^(?<time>\d+\.\d+)\s+(?<ch>\d+)\s+(?<id>[0-9A-Fa-f]+)(?<ext>x)?\s+(?<dir>Rx|Tx)\s+(?<kind>[dr])(?:\s+(?<dlc>[0-9A-Fa-f]+)(?<data>(?:\s+[0-9A-Fa-f]{1,3}\b)*))?",
        )
        .expect("Failed to compile regex");
        let fd_regex = Regex::new(
            r"^(?<time>\d+\.\d+)\s+CANFD\s+(?<ch>\d+)\s+(?<dir>Rx|Tx)\s+(?<id>[0-9A-Fa-f]+)(?<ext>x)?\s+(?:[A-Za-z_]\w*\s+)?(?<brs>[01])\s+(?<esi>[01])\s+(?<dlc>[0-9A-Fa-f]+)\s+(?<len>\d+)(?<data>(?:\s+[0-9A-Fa-f]{1,3}\b)*)",
        )
        .expect("Failed to compile regex");

        let mut meta = AscMeta::default();
        let mut frames = Vec::new();

        for (index, line) in text.lines().enumerate() {
            if options.is_full(&frames) {
                break;
            }
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if let Some(caps) = header_regex.captures(line) {
                let value = caps["value"].trim();
                match &caps["key"] {
                    "date" => meta.start_time = Self::parse_date(value),
                    "base" => {
                        meta.base = if value.starts_with("dec") { 10 } else { 16 };
                        meta.timestamps_absolute = value.contains("absolute");
                    }
                    _ => meta.timestamps_absolute = value.contains("absolute"),
                }
                continue;
            }

            if let Some(caps) = fd_regex.captures(line) {
                let len: usize = caps["len"].parse().map_err(|_| ParseError::Line {
                    line: line_no,
                    message: "invalid data length".to_string(),
                })?;
                let data = Self::parse_bytes(&caps["data"], meta.base, len, line_no)?;
                let channel = Self::parse_number(&caps, "ch", 10, line_no)?;
                frames.push(Frame {
                    timestamp: caps["time"].parse().unwrap_or_default(),
                    id: Self::parse_number(&caps, "id", meta.base, line_no)?,
                    is_extended: caps.name("ext").is_some(),
                    is_remote: false,
                    is_fd: true,
                    channel: (channel as u16).saturating_sub(1),
                    direction: Self::direction(&caps),
                    dlc: data.len() as u8,
                    data,
                });
                continue;
            }

            if let Some(caps) = classic_regex.captures(line) {
                let is_remote = &caps["kind"] == "r";
                let dlc = match caps.name("dlc") {
                    Some(m) => u8::from_str_radix(m.as_str(), 16).map_err(|e| ParseError::Line {
                        line: line_no,
                        message: format!("invalid dlc: {}", e),
                    })?,
                    None => 0,
                };
                let data = match caps.name("data") {
                    Some(m) if !is_remote => {
                        Self::parse_bytes(m.as_str(), meta.base, dlc.min(8) as usize, line_no)?
                    }
                    _ => Vec::new(),
                };
                let channel = Self::parse_number(&caps, "ch", 10, line_no)?;
                frames.push(Frame {
                    timestamp: caps["time"].parse().unwrap_or_default(),
                    id: Self::parse_number(&caps, "id", meta.base, line_no)?,
                    is_extended: caps.name("ext").is_some(),
                    is_remote,
                    is_fd: false,
                    channel: (channel as u16).saturating_sub(1),
                    direction: Self::direction(&caps),
                    dlc: data.len() as u8,
                    data,
                });
                continue;
            }

            meta.skipped_lines += 1;
        }

        if frames.is_empty() {
            return Err(ParseError::NoFrames);
        }

        tracing::info!(
            "Parsed ASC log: {} frames, {} other lines",
            frames.len(),
            meta.skipped_lines
        );

        Ok(Log {
            meta: Meta::Asc(meta),
            frames,
        })
    }
}
