//! .actx snapshot file format reader/writer for the context store.

use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::context::ContextSnapshot;
use crate::types::{ContextError, ContextResult, Record, Slot};

/// Magic bytes: "ACTX"
const ACTX_MAGIC: u32 = 0x41435458;

/// Current format version.
const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
const HEADER_SIZE: usize = 64;

/// Writer for .actx files.
pub struct SnapshotWriter;

/// Reader for .actx files.
pub struct SnapshotReader;

impl SnapshotWriter {
    /// Write a snapshot to a file, replacing it atomically.
    pub fn write_to_file(snapshot: &ContextSnapshot, path: &Path) -> ContextResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = path.with_extension("actx.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            Self::write_to(snapshot, &mut file)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        tracing::debug!(
            "Wrote {} records and {} slots to {}",
            snapshot.records.len(),
            snapshot.slots.len(),
            path.display()
        );
        Ok(())
    }

    /// Write a snapshot to any writer.
    pub fn write_to<W: Write>(snapshot: &ContextSnapshot, writer: &mut W) -> ContextResult<()> {
        let payload = serde_json::to_vec(&SerializedPayload {
            records: &snapshot.records,
            slots: &snapshot.slots,
        })
        .map_err(|e| ContextError::Storage(format!("Serialization failed: {e}")))?;

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&ACTX_MAGIC.to_le_bytes());
        header[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        header[6..8].copy_from_slice(&0u16.to_le_bytes()); // flags
        header[8..16].copy_from_slice(&(snapshot.records.len() as u64).to_le_bytes());
        header[16..24].copy_from_slice(&(snapshot.slots.len() as u64).to_le_bytes());
        header[24..32].copy_from_slice(&snapshot.created_at.timestamp().to_le_bytes());
        header[32..40].copy_from_slice(&snapshot.updated_at.timestamp().to_le_bytes());
        header[40..48].copy_from_slice(&(payload.len() as u64).to_le_bytes());

        writer.write_all(&header)?;
        writer.write_all(&payload)?;
        Ok(())
    }
}

impl SnapshotReader {
    /// Read a snapshot from a file.
    pub fn read_from_file(path: &Path) -> ContextResult<ContextSnapshot> {
        let mut file = std::fs::File::open(path)?;
        let snapshot = Self::read_from(&mut file)?;
        tracing::debug!(
            "Read {} records and {} slots from {}",
            snapshot.records.len(),
            snapshot.slots.len(),
            path.display()
        );
        Ok(snapshot)
    }

    /// Read a snapshot from any reader.
    pub fn read_from<R: Read>(reader: &mut R) -> ContextResult<ContextSnapshot> {
        let mut header = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|e| ContextError::Storage(format!("Truncated header: {e}")))?;

        let magic = u32::from_le_bytes(le_array(&header[0..4]));
        if magic != ACTX_MAGIC {
            return Err(ContextError::Storage(format!(
                "Invalid magic: expected 0x{ACTX_MAGIC:08X}, got 0x{magic:08X}"
            )));
        }

        let version = u16::from_le_bytes(le_array(&header[4..6]));
        if version != FORMAT_VERSION {
            return Err(ContextError::Storage(format!(
                "Unsupported version: {version}"
            )));
        }

        let record_count = u64::from_le_bytes(le_array(&header[8..16])) as usize;
        let slot_count = u64::from_le_bytes(le_array(&header[16..24])) as usize;
        let created_at = timestamp(i64::from_le_bytes(le_array(&header[24..32])))?;
        let updated_at = timestamp(i64::from_le_bytes(le_array(&header[32..40])))?;
        let payload_len = u64::from_le_bytes(le_array(&header[40..48]));

        // The buffer grows with the bytes actually read, never with the header's claim.
        let mut payload = Vec::new();
        let read = reader
            .by_ref()
            .take(payload_len)
            .read_to_end(&mut payload)
            .map_err(|e| ContextError::Storage(format!("Truncated payload: {e}")))?;
        if read as u64 != payload_len {
            return Err(ContextError::Storage(format!(
                "Truncated payload: header says {payload_len} bytes, found {read}"
            )));
        }

        let decoded: DeserializedPayload = serde_json::from_slice(&payload)
            .map_err(|e| ContextError::Storage(format!("Deserialization failed: {e}")))?;

        if decoded.records.len() != record_count || decoded.slots.len() != slot_count {
            return Err(ContextError::Storage(format!(
                "Count mismatch: header says {record_count} records / {slot_count} slots, payload has {} / {}",
                decoded.records.len(),
                decoded.slots.len()
            )));
        }

        Ok(ContextSnapshot {
            records: decoded.records,
            slots: decoded.slots,
            created_at,
            updated_at,
        })
    }
}

#[derive(serde::Serialize)]
struct SerializedPayload<'a> {
    records: &'a [Record],
    slots: &'a [Slot],
}

#[derive(serde::Deserialize)]
struct DeserializedPayload {
    records: Vec<Record>,
    slots: Vec<Slot>,
}

fn le_array<const N: usize>(buf: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[..N]);
    out
}

fn timestamp(secs: i64) -> ContextResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ContextError::Storage(format!("Invalid timestamp: {secs}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use crate::types::SlotRole;

    fn populated() -> ContextStore {
        let store = ContextStore::new();
        let mut task = Record::new("task", "ORD-1", "RAW_MATERIAL");
        task.set_field("order_id", "ORD-1");
        task.log("raw_material_agent assigned");
        store.records.create(task.key(), task).unwrap();
        store
            .slots
            .put("system", Slot::new("system", SlotRole::System, "Be brief."));
        store
    }

    #[test]
    fn test_roundtrip_empty() {
        let snapshot = ContextStore::new().snapshot();
        let mut buf = Vec::new();
        SnapshotWriter::write_to(&snapshot, &mut buf).unwrap();

        let loaded = SnapshotReader::read_from(&mut &buf[..]).unwrap();
        assert!(loaded.records.is_empty());
        assert!(loaded.slots.is_empty());
        assert_eq!(loaded.created_at.timestamp(), snapshot.created_at.timestamp());
    }

    #[test]
    fn test_roundtrip_with_records() {
        let snapshot = populated().snapshot();
        let mut buf = Vec::new();
        SnapshotWriter::write_to(&snapshot, &mut buf).unwrap();

        let loaded = SnapshotReader::read_from(&mut &buf[..]).unwrap();
        assert_eq!(loaded.records, snapshot.records);
        assert_eq!(loaded.slots, snapshot.slots);
        assert_eq!(loaded.records[0].history.len(), 1);
    }

    #[test]
    fn test_invalid_magic() {
        let buf = [0u8; HEADER_SIZE + 10];
        let result = SnapshotReader::read_from(&mut &buf[..]);
        assert!(matches!(result, Err(ContextError::Storage(_))));
    }

    #[test]
    fn test_truncated_payload() {
        let mut buf = Vec::new();
        SnapshotWriter::write_to(&populated().snapshot(), &mut buf).unwrap();
        buf.truncate(buf.len() - 5);
        assert!(SnapshotReader::read_from(&mut &buf[..]).is_err());
    }

    #[test]
    fn test_oversized_payload_length() {
        let mut buf = Vec::new();
        SnapshotWriter::write_to(&ContextStore::new().snapshot(), &mut buf).unwrap();
        buf[40..48].copy_from_slice(&u64::MAX.to_le_bytes());

        match SnapshotReader::read_from(&mut &buf[..]) {
            Err(ContextError::Storage(msg)) => assert!(msg.contains("Truncated payload")),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.actx");

        SnapshotWriter::write_to_file(&populated().snapshot(), &path).unwrap();
        let loaded = SnapshotReader::read_from_file(&path).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert!(!path.with_extension("actx.tmp").exists());

        let restored = ContextStore::from_snapshot(loaded);
        assert_eq!(restored.records.get("task:ORD-1").unwrap().field_str("order_id"), Some("ORD-1"));
    }
}
