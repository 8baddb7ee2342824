#![forbid(unsafe_code)]

use flate2::read::ZlibDecoder;
use std::io::{Read, Seek, SeekFrom};

use crate::xp3::error::{Xp3Error, Xp3Result};
use crate::xp3::format::{
    Entry, IndexEncoding, DATA_START, MAGIC, SEGMENT_FLAG_ZLIB, SEGMENT_LEN, TAG_ADLR, TAG_FILE,
    TAG_INFO, TAG_SEGM,
};
use crate::xp3::io::{read_exact, read_u16, read_u32, read_u64, read_u8};

/// Checks the magic and returns the index offset from the header.
pub(crate) fn read_header<R: Read + Seek>(file: &mut R) -> Xp3Result<u64> {
    file.seek(SeekFrom::Start(0))?;
    let magic = read_exact::<11>(file)?;
    if magic != MAGIC {
        return Err(Xp3Error::Invalid("bad header magic".into()));
    }
    read_u64(file)
}

pub(crate) fn read_index<R: Read + Seek>(file: &mut R) -> Xp3Result<Vec<Entry>> {
    let index_offset = read_header(file)?;
    let file_len = file.seek(SeekFrom::End(0))?;

    if index_offset < DATA_START || index_offset >= file_len {
        return Err(Xp3Error::Invalid(format!(
            "index offset {index_offset} outside file of {file_len} bytes"
        )));
    }

    file.seek(SeekFrom::Start(index_offset))?;
    let flag = read_u8(file)?;
    let encoding = IndexEncoding::from_u8(flag)
        .ok_or_else(|| Xp3Error::Invalid(format!("unknown index encoding {flag:#x}")))?;

    let payload = match encoding {
        IndexEncoding::Raw => {
            let len = read_u64(file)?;
            read_block(file, len, file_len)?
        }
        IndexEncoding::Zlib => {
            let stored = read_u64(file)?;
            let real = read_u64(file)?;
            let packed = read_block(file, stored, file_len)?;

            let mut payload = Vec::new();
            ZlibDecoder::new(&packed[..])
                .read_to_end(&mut payload)
                .map_err(|e| Xp3Error::Invalid(format!("index does not inflate: {e}")))?;
            if payload.len() as u64 != real {
                return Err(Xp3Error::Invalid(format!(
                    "index inflates to {} bytes, header says {real}",
                    payload.len()
                )));
            }
            payload
        }
    };

    parse_entries(&payload)
}

fn read_block<R: Read + Seek>(file: &mut R, len: u64, file_len: u64) -> Xp3Result<Vec<u8>> {
    let pos = file.stream_position()?;
    if pos.checked_add(len).map_or(true, |end| end > file_len) {
        return Err(Xp3Error::Invalid("index outside file".into()));
    }
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Splits `buf[*pos..]` into the next tag and body, advancing `pos`.
fn next_chunk<'a>(buf: &'a [u8], pos: &mut usize) -> Xp3Result<([u8; 4], &'a [u8])> {
    if buf.len() - *pos < 12 {
        return Err(Xp3Error::Invalid("truncated chunk header".into()));
    }
    let mut head: &[u8] = &buf[*pos..*pos + 12];
    let tag = read_exact::<4>(&mut head)?;
    let size = read_u64(&mut head)?;

    let start = *pos + 12;
    let size = usize::try_from(size)
        .ok()
        .filter(|s| *s <= buf.len() - start)
        .ok_or_else(|| {
            Xp3Error::Invalid(format!(
                "chunk {} overruns its parent",
                String::from_utf8_lossy(&tag)
            ))
        })?;

    *pos = start + size;
    Ok((tag, &buf[start..start + size]))
}

fn parse_entries(payload: &[u8]) -> Xp3Result<Vec<Entry>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let (tag, body) = next_chunk(payload, &mut pos)?;
        if tag == TAG_FILE {
            out.push(parse_file(body)?);
        }
    }
    Ok(out)
}

fn parse_file(body: &[u8]) -> Xp3Result<Entry> {
    let mut info: Option<(String, u64, u64)> = None;
    let mut segment: Option<(bool, u64, u64, u64)> = None;
    let mut adler32: Option<u32> = None;

    let mut pos = 0;
    while pos < body.len() {
        let (tag, mut chunk) = next_chunk(body, &mut pos)?;
        match tag {
            TAG_INFO => info = Some(parse_info(&mut chunk).map_err(|_| truncated("info"))?),
            TAG_SEGM => {
                if chunk.len() as u64 != SEGMENT_LEN {
                    return Err(Xp3Error::Invalid(format!(
                        "expected one segment, got {} bytes of segm",
                        chunk.len()
                    )));
                }
                segment = Some(parse_segment(&mut chunk).map_err(|_| truncated("segm"))?);
            }
            TAG_ADLR => adler32 = Some(read_u32(&mut chunk).map_err(|_| truncated("adlr"))?),
            _ => {}
        }
    }

    let (path, original_size, stored_size) = info.ok_or_else(|| missing("info"))?;
    let (compressed, offset, seg_original, seg_stored) = segment.ok_or_else(|| missing("segm"))?;
    let adler32 = adler32.ok_or_else(|| missing("adlr"))?;

    if seg_original != original_size || seg_stored != stored_size {
        return Err(Xp3Error::Invalid(format!("info and segm sizes disagree for {path}")));
    }

    Ok(Entry {
        path,
        offset,
        original_size,
        stored_size,
        compressed,
        adler32,
    })
}

fn parse_info(r: &mut &[u8]) -> Xp3Result<(String, u64, u64)> {
    let _flags = read_u32(r)?;
    let original_size = read_u64(r)?;
    let stored_size = read_u64(r)?;
    let units = read_u16(r)? as usize;

    let mut name = Vec::with_capacity(units);
    for _ in 0..units {
        name.push(read_u16(r)?);
    }
    let path = String::from_utf16(&name)
        .map_err(|_| Xp3Error::Invalid("file name is not valid UTF-16".into()))?;
    Ok((path, original_size, stored_size))
}

fn parse_segment(r: &mut &[u8]) -> Xp3Result<(bool, u64, u64, u64)> {
    let flags = read_u32(r)?;
    let offset = read_u64(r)?;
    let original = read_u64(r)?;
    let stored = read_u64(r)?;
    Ok((flags & SEGMENT_FLAG_ZLIB != 0, offset, original, stored))
}

fn truncated(tag: &str) -> Xp3Error {
    Xp3Error::Invalid(format!("truncated {tag} chunk"))
}

fn missing(tag: &str) -> Xp3Error {
    Xp3Error::Invalid(format!("File chunk without {tag}"))
}
