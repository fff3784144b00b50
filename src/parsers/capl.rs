//! Expected values from CAPL test definitions.
//!
//! Test cases set the stimulus for the three bench signals as three
//! consecutive assignments, e.g.
//!
//! ```text
//! engineSpeed = 3000;
//! torque = 300;
//! coolantTemp = 90;
//! ```
//!
//! The scripts are only scanned as text. Every matching triple contributes
//! one literal per signal.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::config::SignalVariables;
use crate::error::BenchError;
use crate::signals::{Signal, SignalStats};

/// Optional CAPL scalar type in front of an assignment
const TYPE_PREFIX: &str = r"(?:(?:int|long|word|dword|byte|qword)\s+)?";
/// Optional `$` sysvar sigil or `object.` qualifier
const QUALIFIER: &str = r"(?:[A-Za-z_]\w*\.)*\$?";
const LITERAL: &str = r"([-+]?(?:0[xX][0-9A-Fa-f]+|\d+))";

/// Compiled three-assignment pattern
#[derive(Clone, Debug)]
pub struct AssignmentPattern {
    regex: Regex,
}

impl AssignmentPattern {
    pub fn new(variables: &SignalVariables) -> Result<Self, regex::Error> {
        let assignment = |name: &str| {
            format!(
                r"{}{}\b{}\s*=\s*{}\s*;",
                TYPE_PREFIX,
                QUALIFIER,
                regex::escape(name),
                LITERAL
            )
        };
        let pattern = [
            &variables.engine_speed,
            &variables.torque,
            &variables.coolant_temp,
        ]
        .iter()
        .map(|name| assignment(name.as_str()))
        .collect::<Vec<_>>()
        .join(r"\s*");
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    /// All literal triples in `text`, in signal order
    pub fn scan(&self, text: &str) -> Vec<[i64; 3]> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| {
                let mut values = [0i64; 3];
                for (slot, value) in values.iter_mut().enumerate() {
                    let literal = caps.get(slot + 1)?.as_str();
                    match parse_literal(literal) {
                        Some(v) => *value = v,
                        None => {
                            tracing::warn!(
                                "Ignoring assignment block: literal {} does not fit in 64 bits",
                                literal
                            );
                            return None;
                        }
                    }
                }
                Some(values)
            })
            .collect()
    }
}

fn parse_literal(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// A literal found in a test definition
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpectedSample {
    pub value: i64,
    pub source: PathBuf,
}

/// Every literal collected per signal
#[derive(Clone, Debug, Default, Serialize)]
pub struct ExpectedValues {
    pub samples: BTreeMap<Signal, Vec<ExpectedSample>>,
}

impl ExpectedValues {
    pub fn is_empty(&self) -> bool {
        self.samples.values().all(Vec::is_empty)
    }

    /// Add the matches of one test definition
    pub fn extend_from_text(&mut self, pattern: &AssignmentPattern, text: &str, source: &Path) -> usize {
        let triples = pattern.scan(text);
        for triple in &triples {
            for (signal, value) in Signal::ORDER.iter().zip(triple) {
                self.samples.entry(*signal).or_default().push(ExpectedSample {
                    value: *value,
                    source: source.to_path_buf(),
                });
            }
        }
        triples.len()
    }

    /// Number of literals collected for a signal
    pub fn count(&self, signal: Signal) -> usize {
        self.samples.get(&signal).map_or(0, Vec::len)
    }

    /// Min/Max/Mid per signal over the full collected set
    pub fn stats(&self) -> BTreeMap<Signal, SignalStats> {
        self.samples
            .iter()
            .filter_map(|(signal, samples)| {
                SignalStats::from_values(samples.iter().map(|s| s.value)).map(|stats| (*signal, stats))
            })
            .collect()
    }
}

/// Scan test definition files for expected values.
///
/// No matches at all is not an error, the result is simply empty.
pub fn extract_expected(
    files: &[PathBuf],
    variables: &SignalVariables,
) -> Result<ExpectedValues, BenchError> {
    let pattern = AssignmentPattern::new(variables)?;
    let mut expected = ExpectedValues::default();

    for path in files {
        let text = fs::read_to_string(path).map_err(|source| BenchError::Capl {
            path: path.clone(),
            source,
        })?;
        let matches = expected.extend_from_text(&pattern, &text, path);
        tracing::info!("{}: {} assignment blocks", path.display(), matches);
    }

    if expected.is_empty() {
        tracing::warn!(
            "No expected values found in {} test definition file(s)",
            files.len()
        );
    }
    Ok(expected)
}
