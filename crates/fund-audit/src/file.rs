use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{AuditError, Result};
use crate::event::AuditEvent;
use crate::traits::{AuditLog, AuditReceipt};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct Writer {
    writer: BufWriter<File>,
    /// Events appended so far, including those recovered on open.
    count: u64,
}

/// Append-only audit sink backed by a single file.
///
/// On-disk format, one frame per event:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized AuditEvent)]
/// ```
///
/// Every append is flushed and synced before it is acknowledged. When the
/// file is reopened, a torn trailing frame left by a crash is cut off so new
/// events follow the last complete one.
pub struct FileAuditLog {
    contract_id: String,
    path: PathBuf,
    writer: Mutex<Writer>,
}

impl FileAuditLog {
    /// Open (or create) an audit file at `path`.
    pub fn open(contract_id: impl Into<String>, path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (events, valid_len) = read_frames(path)?;
        if valid_len < file.metadata()?.len() {
            warn!(path = %path.display(), valid_len, "discarding torn audit frame");
            file.set_len(valid_len)?;
        }

        debug!(path = %path.display(), recovered = events.len(), "audit file opened");
        Ok(Self {
            contract_id: contract_id.into(),
            path: path.to_path_buf(),
            writer: Mutex::new(Writer {
                writer: BufWriter::new(file),
                count: events.len() as u64,
            }),
        })
    }

    /// Path to the audit file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn contract_id(&self) -> &str {
        &self.contract_id
    }

    fn log_event(&self, event: &AuditEvent) -> Result<AuditReceipt> {
        let payload =
            bincode::serialize(event).map_err(|e| AuditError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| AuditError::Serialization("event too large".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut w = self.writer.lock().map_err(|_| AuditError::LockPoisoned)?;
        w.writer.write_all(&length.to_le_bytes())?;
        w.writer.write_all(&crc.to_le_bytes())?;
        w.writer.write_all(&payload)?;
        w.writer.flush()?;
        w.writer.get_ref().sync_data()?;
        w.count += 1;

        debug!(seq = w.count, kind = %event.kind, "audit event appended");
        Ok(AuditReceipt {
            seq: w.count,
            event_id: event.id.clone(),
        })
    }

    fn events(&self) -> Result<Vec<AuditEvent>> {
        let _guard = self.writer.lock().map_err(|_| AuditError::LockPoisoned)?;
        let (events, _) = read_frames(&self.path)?;
        Ok(events)
    }
}

/// Read every complete, CRC-valid frame from the front of the file.
///
/// Returns the decoded events and the byte length they occupy. Reading stops
/// at the first short, corrupt, or undecodable frame.
fn read_frames(path: &Path) -> Result<(Vec<AuditEvent>, u64)> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;

    let mut events = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= bytes.len() {
        let header = &bytes[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let start = offset + HEADER_SIZE;
        let Some(end) = start.checked_add(length).filter(|end| *end <= bytes.len()) else {
            warn!(offset, length, "truncated audit frame; stopping read");
            break;
        };
        if length == 0 {
            warn!(offset, "empty audit frame; stopping read");
            break;
        }

        let payload = &bytes[start..end];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(offset, expected = expected_crc, actual = actual_crc, "audit frame CRC mismatch; stopping read");
            break;
        }

        match bincode::deserialize::<AuditEvent>(payload) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(offset, error = %e, "undecodable audit frame; stopping read");
                break;
            }
        }
        offset = end;
    }

    Ok((events, offset as u64))
}
