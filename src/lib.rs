//! canbench - CAN bench test automation
//!
//! Starts a simulation on a remote bench host, copies the binary log it
//! writes, decodes the CAN frames and checks three signals against the
//! expected values found in CAPL test definitions.
//!
//! ## Module Structure
//!
//! - [`app`] - Pipeline orchestration (trigger, wait, fetch, analyze)
//! - [`parsers`] - Log readers (BLF, ASC) and the CAPL value extractor
//! - [`signals`] - Signal byte layout and Min/Max/Mid statistics
//! - [`compare`] - Exact expected vs. actual comparison
//! - [`remote`] - PsExec/ssh launch and scp retrieval
//! - [`report`] - HTML report
//! - [`export`] - CSV and JSON outputs
//! - [`config`] - JSON run configuration
//! - [`state`] - Core run types and constants
//! - [`error`] - Error types

pub mod app;
pub mod compare;
pub mod config;
pub mod error;
pub mod export;
pub mod parsers;
pub mod remote;
pub mod report;
pub mod signals;
pub mod state;
