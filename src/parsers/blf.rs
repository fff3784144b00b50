//! Vector Binary Logging Format (.blf) reader
//!
//! Layout:
//! - File header: "LOGG" signature, header size, application and binlog
//!   versions, object counts and measurement start/stop as SYSTEMTIME
//! - Objects: "LOBJ" base header (16 bytes) followed by a v1 (16 bytes) or
//!   v2 (24 bytes) header and the object body
//! - Frames live inside log containers (type 10), optionally zlib compressed.
//!   Inner objects are not aligned to container boundaries, so container
//!   payloads are concatenated before objects are cut out of them.

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime};
use miniz_oxide::inflate::decompress_to_vec_zlib;
use serde::Serialize;

use super::types::{Direction, Frame, Log, Meta, Parseable, ReadOptions};
use crate::error::ParseError;

const FILE_SIGNATURE: &[u8] = b"LOGG";
const OBJECT_SIGNATURE: &[u8] = b"LOBJ";

const FILE_HEADER_SIZE: usize = 72;
const OBJ_HEADER_BASE_SIZE: usize = 16;
const OBJ_HEADER_V1_SIZE: usize = 16;
const LOG_CONTAINER_SIZE: usize = 16;

/// Inner objects may be preceded by up to 3 padding bytes
const PADDING_WINDOW: usize = 8;
/// Upper bound for a single object, anything larger is treated as corruption
const MAX_OBJECT_SIZE: u32 = 16 * 1024 * 1024;

const CAN_MSG_EXT: u32 = 0x8000_0000;
const CAN_ID_MASK: u32 = 0x1FFF_FFFF;
const DIR_TX: u8 = 0x01;
const REMOTE_FLAG: u8 = 0x80;
const FD_EDL: u8 = 0x01;
const FD64_EDL: u32 = 0x1000;
const FD64_REMOTE: u32 = 0x0010;
const TIME_TEN_MICS: u32 = 0x1;

const DLC_TO_LEN: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// BLF object types this reader understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
enum ObjectType {
    CanMessage = 1,
    LogContainer = 10,
    CanMessage2 = 86,
    CanFdMessage = 100,
    CanFdMessage64 = 101,
}

impl ObjectType {
    fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::CanMessage),
            10 => Some(Self::LogContainer),
            86 => Some(Self::CanMessage2),
            100 => Some(Self::CanFdMessage),
            101 => Some(Self::CanFdMessage64),
            _ => None,
        }
    }
}

/// BLF file header information
#[derive(Clone, Debug, Default, Serialize)]
pub struct BlfMeta {
    pub application_id: u8,
    pub application_version: String,
    pub binlog_version: String,
    pub file_size: u64,
    pub uncompressed_size: u64,
    pub object_count: u32,
    pub start_time: Option<NaiveDateTime>,
    pub stop_time: Option<NaiveDateTime>,
    /// Log containers read
    pub containers: usize,
    /// Objects or containers dropped while recovering
    pub skipped: usize,
}

/// Little-endian reader over a byte slice with bounds checking
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(ParseError::Truncated {
                offset: self.pos,
                needed: n,
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, ParseError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

/// A log container as found at file level
struct Container<'a> {
    method: u16,
    uncompressed_size: u32,
    body: &'a [u8],
}

impl<'a> Container<'a> {
    fn inflate(&self) -> Result<Cow<'a, [u8]>, ParseError> {
        let bytes = match self.method {
            0 => Cow::Borrowed(self.body),
            2 => Cow::Owned(
                decompress_to_vec_zlib(self.body)
                    .map_err(|e| ParseError::Decompress(format!("{:?}", e.status)))?,
            ),
            other => return Err(ParseError::UnsupportedCompression(other)),
        };
        if bytes.len() != self.uncompressed_size as usize {
            tracing::debug!(
                "Container size mismatch: header says {}, got {}",
                self.uncompressed_size,
                bytes.len()
            );
        }
        Ok(bytes)
    }
}

/// File-level object: where the next one starts, and the container if it was one
struct TopObject<'a> {
    next: usize,
    container: Option<Container<'a>>,
}

/// Fields shared by every inner object header
struct ObjectHeader {
    header_size: usize,
    obj_size: usize,
    obj_type: u32,
}

fn find_signature(data: &[u8]) -> Option<usize> {
    data.windows(OBJECT_SIGNATURE.len())
        .position(|w| w == OBJECT_SIGNATURE)
}

fn read_systemtime(r: &mut ByteReader) -> Result<Option<NaiveDateTime>, ParseError> {
    let mut fields = [0u16; 8];
    for field in &mut fields {
        *field = r.u16()?;
    }
    let [year, month, _day_of_week, day, hour, minute, second, millis] = fields;
    Ok(
        NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).and_then(|date| {
            date.and_hms_milli_opt(hour as u32, minute as u32, second as u32, millis as u32)
        }),
    )
}

fn read_object_header(r: &mut ByteReader, offset: usize) -> Result<ObjectHeader, ParseError> {
    if r.take(OBJECT_SIGNATURE.len())? != OBJECT_SIGNATURE {
        return Err(ParseError::MissingObject(offset));
    }
    let header_size = r.u16()? as usize;
    let _header_version = r.u16()?;
    let obj_size = r.u32()?;
    let obj_type = r.u32()?;
    if (obj_size as usize) < OBJ_HEADER_BASE_SIZE || obj_size > MAX_OBJECT_SIZE {
        return Err(ParseError::BadObjectSize {
            offset,
            size: obj_size,
        });
    }
    Ok(ObjectHeader {
        header_size,
        obj_size: obj_size as usize,
        obj_type,
    })
}

/// BLF reader.
///
/// The strict variant rejects any malformed object. The recovering variant
/// drops what it cannot read and keeps the frames it could.
pub struct Blf {
    recover: bool,
}

impl Blf {
    pub fn strict() -> Self {
        Self { recover: false }
    }

    pub fn recovering() -> Self {
        Self { recover: true }
    }

    fn parse_header(data: &[u8]) -> Result<(BlfMeta, usize), ParseError> {
        if !data.starts_with(FILE_SIGNATURE) {
            return Err(ParseError::BadSignature { expected: "LOGG" });
        }
        let mut r = ByteReader::new(data, FILE_SIGNATURE.len());
        let header_size = r.u32()? as usize;
        let app = r.take(4)?;
        let bin = r.take(4)?;
        let file_size = r.u64()?;
        let uncompressed_size = r.u64()?;
        let object_count = r.u32()?;
        let _objects_read = r.u32()?;
        let start_time = read_systemtime(&mut r)?;
        let stop_time = read_systemtime(&mut r)?;

        if header_size < FILE_HEADER_SIZE || header_size > data.len() {
            return Err(ParseError::Truncated {
                offset: 0,
                needed: header_size.max(FILE_HEADER_SIZE),
            });
        }

        let meta = BlfMeta {
            application_id: app[0],
            application_version: format!("{}.{}.{}", app[1], app[2], app[3]),
            binlog_version: format!("{}.{}.{}.{}", bin[0], bin[1], bin[2], bin[3]),
            file_size,
            uncompressed_size,
            object_count,
            start_time,
            stop_time,
            ..Default::default()
        };
        Ok((meta, header_size))
    }

    /// Read one file-level object starting at `pos`
    fn read_top_object(data: &[u8], pos: usize) -> Result<TopObject<'_>, ParseError> {
        let mut r = ByteReader::new(data, pos);
        let header = read_object_header(&mut r, pos)?;
        let end = pos + header.obj_size;
        if end > data.len() {
            return Err(ParseError::Truncated {
                offset: pos,
                needed: header.obj_size,
            });
        }
        let next = (end + header.obj_size % 4).min(data.len());

        if ObjectType::from_u32(header.obj_type) != Some(ObjectType::LogContainer) {
            tracing::debug!(
                "Skipping top-level object type {} at offset {}",
                header.obj_type,
                pos
            );
            return Ok(TopObject {
                next,
                container: None,
            });
        }

        let method = r.u16()?;
        r.skip(6)?;
        let uncompressed_size = r.u32()?;
        r.skip(4)?;
        if r.pos > end {
            return Err(ParseError::BadObjectSize {
                offset: pos,
                size: header.obj_size as u32,
            });
        }

        Ok(TopObject {
            next,
            container: Some(Container {
                method,
                uncompressed_size,
                body: &data[r.pos..end],
            }),
        })
    }

    /// Cut complete objects out of concatenated container data.
    ///
    /// Returns how many bytes were consumed; the rest continues in the
    /// next container.
    fn parse_inner(
        &self,
        buf: &[u8],
        frames: &mut Vec<Frame>,
        meta: &mut BlfMeta,
        options: &ReadOptions,
    ) -> Result<usize, ParseError> {
        let mut pos = 0;
        loop {
            if options.is_full(frames) {
                return Ok(buf.len());
            }

            let window_end = (pos + PADDING_WINDOW).min(buf.len());
            match find_signature(&buf[pos..window_end]) {
                Some(skip) => pos += skip,
                None if pos + PADDING_WINDOW > buf.len() => return Ok(pos),
                None if self.recover => match find_signature(&buf[pos + 1..]) {
                    Some(skip) => {
                        tracing::warn!("Resynchronising after {} unreadable bytes", skip + 1);
                        meta.skipped += 1;
                        pos += skip + 1;
                    }
                    None => return Ok(pos),
                },
                None => return Err(ParseError::MissingObject(pos)),
            }

            if buf.len() - pos < OBJ_HEADER_BASE_SIZE {
                return Ok(pos);
            }

            let mut r = ByteReader::new(buf, pos);
            let header = match read_object_header(&mut r, pos) {
                Ok(header) => header,
                Err(e) if self.recover => {
                    tracing::warn!("Dropping object at offset {}: {}", pos, e);
                    meta.skipped += 1;
                    pos += OBJECT_SIGNATURE.len();
                    continue;
                }
                Err(e) => return Err(e),
            };

            let next = pos + header.obj_size;
            if next > buf.len() {
                return Ok(pos);
            }

            match Self::decode_object(&buf[pos..next], &header) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => {}
                Err(e) if self.recover => {
                    tracing::warn!("Dropping object at offset {}: {}", pos, e);
                    meta.skipped += 1;
                }
                Err(e) => return Err(e),
            }
            pos = next;
        }
    }

    /// Decode a single inner object, `obj` covering the whole object
    fn decode_object(obj: &[u8], header: &ObjectHeader) -> Result<Option<Frame>, ParseError> {
        let Some(obj_type) = ObjectType::from_u32(header.obj_type) else {
            return Ok(None);
        };
        if header.header_size < OBJ_HEADER_BASE_SIZE + OBJ_HEADER_V1_SIZE {
            return Err(ParseError::BadObjectSize {
                offset: 0,
                size: header.header_size as u32,
            });
        }

        // v1 and v2 headers share flags, two 16-bit fields and the timestamp
        let mut r = ByteReader::new(obj, OBJ_HEADER_BASE_SIZE);
        let time_flags = r.u32()?;
        r.skip(4)?;
        let raw_timestamp = r.u64()?;
        let timestamp = if time_flags == TIME_TEN_MICS {
            raw_timestamp as f64 / 100_000.0
        } else {
            raw_timestamp as f64 / 1_000_000_000.0
        };

        let mut r = ByteReader::new(obj, header.header_size);
        let frame = match obj_type {
            ObjectType::CanMessage | ObjectType::CanMessage2 => {
                let channel = r.u16()?;
                let flags = r.u8()?;
                let dlc = r.u8()?;
                let can_id = r.u32()?;
                let payload = r.take(8)?;
                let len = (dlc as usize).min(8);
                Frame {
                    timestamp,
                    id: can_id & CAN_ID_MASK,
                    is_extended: can_id & CAN_MSG_EXT != 0,
                    is_remote: flags & REMOTE_FLAG != 0,
                    is_fd: false,
                    channel: channel.saturating_sub(1),
                    direction: if flags & DIR_TX != 0 {
                        Direction::Tx
                    } else {
                        Direction::Rx
                    },
                    dlc: len as u8,
                    data: payload[..len].to_vec(),
                }
            }
            ObjectType::CanFdMessage => {
                let channel = r.u16()?;
                let flags = r.u8()?;
                let dlc = r.u8()?;
                let can_id = r.u32()?;
                let _frame_length = r.u32()?;
                let _bit_count = r.u8()?;
                let fd_flags = r.u8()?;
                let valid_bytes = r.u8()?;
                r.skip(5)?;
                let payload = r.take(64)?;
                let len = (valid_bytes as usize).min(64);
                Frame {
                    timestamp,
                    id: can_id & CAN_ID_MASK,
                    is_extended: can_id & CAN_MSG_EXT != 0,
                    is_remote: flags & REMOTE_FLAG != 0,
                    is_fd: fd_flags & FD_EDL != 0,
                    channel: channel.saturating_sub(1),
                    direction: if flags & DIR_TX != 0 {
                        Direction::Tx
                    } else {
                        Direction::Rx
                    },
                    dlc: DLC_TO_LEN[(dlc & 0x0F) as usize],
                    data: payload[..len].to_vec(),
                }
            }
            ObjectType::CanFdMessage64 => {
                let channel = r.u8()?;
                let dlc = r.u8()?;
                let valid_bytes = r.u8()?;
                let _tx_count = r.u8()?;
                let can_id = r.u32()?;
                let _frame_length = r.u32()?;
                let flags = r.u32()?;
                // bit timing configs, BRS and CRC delimiter offsets
                r.skip(16)?;
                let _bit_count = r.u16()?;
                let dir = r.u8()?;
                let _ext_data_offset = r.u8()?;
                let _crc = r.u32()?;
                let payload = r.take(valid_bytes as usize)?;
                Frame {
                    timestamp,
                    id: can_id & CAN_ID_MASK,
                    is_extended: can_id & CAN_MSG_EXT != 0,
                    is_remote: flags & FD64_REMOTE != 0,
                    is_fd: flags & FD64_EDL != 0,
                    channel: (channel as u16).saturating_sub(1),
                    direction: if dir != 0 {
                        Direction::Tx
                    } else {
                        Direction::Rx
                    },
                    dlc: DLC_TO_LEN[(dlc & 0x0F) as usize],
                    data: payload.to_vec(),
                }
            }
            ObjectType::LogContainer => {
                tracing::debug!("Nested log container ignored");
                return Ok(None);
            }
        };
        Ok(Some(frame))
    }
}

impl Parseable for Blf {
    fn name(&self) -> &'static str {
        if self.recover {
            "BLF (recovering)"
        } else {
            "BLF"
        }
    }

    fn detect(&self, data: &[u8]) -> bool {
        data.starts_with(FILE_SIGNATURE)
    }

    fn parse(&self, data: &[u8], options: &ReadOptions) -> Result<Log, ParseError> {
        let (mut meta, header_size) = Self::parse_header(data)?;

        let mut frames = Vec::new();
        let mut tail: Vec<u8> = Vec::new();
        let mut pos = header_size;

        while pos < data.len() && !options.is_full(&frames) {
            if data.len() - pos < OBJ_HEADER_BASE_SIZE {
                tracing::debug!("Ignoring {} trailing bytes", data.len() - pos);
                break;
            }

            let top = match Self::read_top_object(data, pos) {
                Ok(top) => top,
                Err(e) if self.recover => {
                    tracing::warn!("Unreadable object at offset {}: {}", pos, e);
                    meta.skipped += 1;
                    match find_signature(&data[pos + 1..]) {
                        Some(skip) => {
                            pos += skip + 1;
                            continue;
                        }
                        None => break,
                    }
                }
                Err(e) => return Err(e),
            };
            pos = top.next;

            let Some(container) = top.container else {
                continue;
            };
            meta.containers += 1;

            match container.inflate() {
                Ok(bytes) => {
                    tail.extend_from_slice(&bytes);
                    let consumed = self.parse_inner(&tail, &mut frames, &mut meta, options)?;
                    tail.drain(..consumed);
                }
                Err(e) if self.recover => {
                    tracing::warn!("Skipping container {}: {}", meta.containers, e);
                    meta.skipped += 1;
                    tail.clear();
                }
                Err(e) => return Err(e),
            }
        }

        if !tail.is_empty() {
            tracing::debug!("{} bytes left over after the last container", tail.len());
        }
        if frames.is_empty() {
            return Err(ParseError::NoFrames);
        }
        if let Some(max) = options.max_frames {
            frames.truncate(max);
        }

        tracing::info!(
            "Parsed BLF log: {} frames from {} containers ({} skipped)",
            frames.len(),
            meta.containers,
            meta.skipped
        );

        Ok(Log {
            meta: Meta::Blf(meta),
            frames,
        })
    }
}
