#![forbid(unsafe_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::xp3::error::{Xp3Error, Xp3Result};
use crate::xp3::format::{
    Entry, IndexEncoding, SEGMENT_FLAG_ZLIB, SEGMENT_LEN, TAG_ADLR, TAG_FILE, TAG_INFO, TAG_SEGM,
};

/// Accumulates file entries during packing and serializes them into the
/// trailing index block.
///
/// Index block layout:
/// - [u8 encoding] 0 = raw, 1 = zlib
/// - zlib: [u64 stored_len][u64 real_len][zlib stream]
/// - raw:  [u64 len][payload]
///
/// The payload is one `File` chunk per entry, in add order:
/// - "File" [u64 len]
///   - "info" [u64 len] [u32 flags][u64 original][u64 stored][u16 name_units][UTF-16LE name]
///   - "segm" [u64 len] [u32 flags][u64 offset][u64 original][u64 stored]
///   - "adlr" [u64 len] [u32 adler32 of original bytes]
#[derive(Debug)]
pub struct IndexBuilder {
    entries: Vec<Entry>,
    encoding: IndexEncoding,
    level: u32,
}

impl IndexBuilder {
    pub fn new(encoding: IndexEncoding, level: u32) -> Self {
        Self {
            entries: Vec::new(),
            encoding,
            level,
        }
    }

    pub fn add(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes every entry added so far. Consumes the builder.
    pub fn build(self) -> Xp3Result<Vec<u8>> {
        self.check_layout()?;

        let mut payload: Vec<u8> = Vec::new();
        for e in &self.entries {
            write_file_chunk(&mut payload, e)?;
        }

        let mut out: Vec<u8> = Vec::new();
        out.push(self.encoding as u8);
        match self.encoding {
            IndexEncoding::Raw => {
                out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
                out.extend_from_slice(&payload);
            }
            IndexEncoding::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
                encoder
                    .write_all(&payload)
                    .map_err(|e| Xp3Error::IndexSerializationFailed(e.to_string()))?;
                let packed = encoder
                    .finish()
                    .map_err(|e| Xp3Error::IndexSerializationFailed(e.to_string()))?;

                out.extend_from_slice(&(packed.len() as u64).to_le_bytes());
                out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
                out.extend_from_slice(&packed);
            }
        }

        log::debug!(
            "index: {} entries, payload {} bytes, block {} bytes ({:?})",
            self.entries.len(),
            payload.len(),
            out.len(),
            self.encoding
        );
        Ok(out)
    }

    // Segments must sit back to back in add order, never overlapping.
    fn check_layout(&self) -> Xp3Result<()> {
        for e in &self.entries {
            if !e.compressed && e.stored_size != e.original_size {
                return Err(Xp3Error::IndexSerializationFailed(format!(
                    "raw entry {} stores {} bytes but has {}",
                    e.path, e.stored_size, e.original_size
                )));
            }
            if e.offset.checked_add(e.stored_size).is_none() {
                return Err(Xp3Error::IndexSerializationFailed(format!(
                    "segment of {} overflows u64",
                    e.path
                )));
            }
        }

        for w in self.entries.windows(2) {
            let end = w[0].offset + w[0].stored_size;
            if w[1].offset < end {
                return Err(Xp3Error::IndexSerializationFailed(format!(
                    "{} at {} overlaps {} ending at {}",
                    w[1].path, w[1].offset, w[0].path, end
                )));
            }
        }
        Ok(())
    }
}

fn push_chunk(out: &mut Vec<u8>, tag: [u8; 4], body: &[u8]) {
    out.extend_from_slice(&tag);
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend_from_slice(body);
}

fn write_file_chunk(out: &mut Vec<u8>, e: &Entry) -> Xp3Result<()> {
    let name: Vec<u16> = e.path.encode_utf16().collect();
    let name_units = u16::try_from(name.len()).map_err(|_| {
        Xp3Error::IndexSerializationFailed(format!("path too long: {}", e.path))
    })?;

    let mut info = Vec::with_capacity(4 + 8 + 8 + 2 + name.len() * 2);
    info.extend_from_slice(&0u32.to_le_bytes());
    info.extend_from_slice(&e.original_size.to_le_bytes());
    info.extend_from_slice(&e.stored_size.to_le_bytes());
    info.extend_from_slice(&name_units.to_le_bytes());
    for unit in &name {
        info.extend_from_slice(&unit.to_le_bytes());
    }

    let mut segm = Vec::with_capacity(SEGMENT_LEN as usize);
    let flags = if e.compressed { SEGMENT_FLAG_ZLIB } else { 0 };
    segm.extend_from_slice(&flags.to_le_bytes());
    segm.extend_from_slice(&e.offset.to_le_bytes());
    segm.extend_from_slice(&e.original_size.to_le_bytes());
    segm.extend_from_slice(&e.stored_size.to_le_bytes());

    let mut body = Vec::new();
    push_chunk(&mut body, TAG_INFO, &info);
    push_chunk(&mut body, TAG_SEGM, &segm);
    push_chunk(&mut body, TAG_ADLR, &e.adler32.to_le_bytes());

    push_chunk(out, TAG_FILE, &body);
    Ok(())
}
