pub mod asc;
pub mod blf;
pub mod capl;
pub mod types;

use std::fs;
use std::path::Path;

use crate::error::{DecodeError, ParseError};

pub use asc::Asc;
pub use blf::Blf;
pub use types::{Direction, Frame, Log, Meta, Parseable, ReadOptions};

/// Reader variants in the order they are tried
pub fn readers() -> Vec<Box<dyn Parseable>> {
    vec![
        Box::new(Blf::strict()),
        Box::new(Blf::recovering()),
        Box::new(Asc),
    ]
}

/// Decode bytes with the first reader variant that yields frames.
///
/// Variants that do not recognise the data are skipped. The error kept is
/// the last one from a variant that recognised it, unless that variant only
/// came up empty after an earlier one hit a real error.
pub fn decode_bytes(data: &[u8], options: &ReadOptions) -> Result<Log, ParseError> {
    let mut last_error = None;
    for reader in readers() {
        if !reader.detect(data) {
            tracing::debug!("{} does not recognise the data", reader.name());
            continue;
        }
        tracing::info!("Trying reader: {}", reader.name());
        match reader.parse(data, options) {
            Ok(log) => return Ok(log),
            Err(e) => {
                tracing::warn!("{} failed: {}", reader.name(), e);
                if !(matches!(e, ParseError::NoFrames) && last_error.is_some()) {
                    last_error = Some(e);
                }
            }
        }
    }
    Err(last_error.unwrap_or(ParseError::BadSignature {
        expected: "BLF or ASC log",
    }))
}

/// Read a log file and decode it
pub fn decode_file(path: &Path, options: &ReadOptions) -> Result<Log, DecodeError> {
    if !path.exists() {
        return Err(DecodeError::NotFound(path.to_path_buf()));
    }
    let data = fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let log = decode_bytes(&data, options).map_err(|last| DecodeError::Unrecognized {
        path: path.to_path_buf(),
        last,
    })?;

    tracing::info!(
        "Loaded {} frames from {}",
        log.frames.len(),
        path.display()
    );
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::blf::testing;
    use super::*;

    #[test]
    fn test_decode_falls_back_to_recovering_reader() {
        let mut data = testing::file(&[
            testing::container(&testing::can_message(0, 1, 0, 0x10, &[1]), false),
            testing::container(&testing::can_message(0, 1, 0, 0x11, &[2]), false),
        ]);
        data.truncate(data.len() - 4);

        let log = decode_bytes(&data, &ReadOptions::default()).unwrap();
        assert_eq!(log.frames.len(), 1);
        assert!(matches!(log.meta, Meta::Blf(_)));
    }

    #[test]
    fn test_decode_falls_back_to_asc() {
        let text = "base hex  timestamps absolute\n   0.100000 1  321  Rx   d 1 AA\n";
        let log = decode_bytes(text.as_bytes(), &ReadOptions::default()).unwrap();
        assert!(matches!(log.meta, Meta::Asc(_)));
        assert_eq!(log.frames[0].id, 0x321);
    }

    #[test]
    fn test_decode_unrecognised_data() {
        let err = decode_bytes(&[0xFF, 0x00, 0xFE], &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::BadSignature { expected: "BLF or ASC log" }));
    }

    #[test]
    fn test_corrupt_blf_keeps_blf_error() {
        let mut bad = testing::container(&testing::can_message(0, 1, 0, 0x10, &[1]), true);
        // garble the zlib stream after the 32 byte container header
        for b in &mut bad[32..36] {
            *b = 0xFF;
        }
        let data = testing::file(&[bad]);

        let err = decode_bytes(&data, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::Decompress(_)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.blf");
        std::fs::write(&path, &data).unwrap();
        let err = decode_file(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unrecognized {
                last: ParseError::Decompress(_),
                ..
            }
        ));
    }

    #[test]
    fn test_decode_file_errors() {
        let err = decode_file(Path::new("/nonexistent/log.blf"), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));

        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.blf");
        std::fs::write(&empty, b"").unwrap();
        let err = decode_file(&empty, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Unrecognized { .. }));
    }

    #[test]
    fn test_decode_file_blf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SignalReport.blf");
        std::fs::write(&path, testing::simple_file(&[(0, 0x123, &[0, 1, 0, 2, 3])])).unwrap();

        let log = decode_file(&path, &ReadOptions::default()).unwrap();
        assert_eq!(log.frames.len(), 1);
        assert_eq!(log.frames[0].data, vec![0, 1, 0, 2, 3]);
    }
}
