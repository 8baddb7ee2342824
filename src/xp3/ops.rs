#![forbid(unsafe_code)]

use flate2::read::ZlibDecoder;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path};

use crate::xp3::build::{pack as pack_impl, pack_to, PackOptions, PackSummary};
use crate::xp3::error::{Xp3Error, Xp3Result};
use crate::xp3::format::{Entry, EntryInfo, DATA_START, DECOY, HEADER_LEN};
use crate::xp3::read::{read_header, read_index};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub entries: usize,
    pub original_bytes: u64,
}

pub fn pack(input: &Path, output: &Path, opts: &PackOptions) -> Xp3Result<PackSummary> {
    log::info!("packing {} -> {}", input.display(), output.display());
    pack_impl(input, output, opts)
}

/// Packs into memory and copies the finished archive to `out`.
///
/// The index offset is only known at the end, so sinks that cannot seek
/// (stdout, pipes) get the whole archive in one write.
pub fn pack_buffered(
    input: &Path,
    out: &mut dyn Write,
    opts: &PackOptions,
) -> Xp3Result<PackSummary> {
    let mut buf = Cursor::new(Vec::new());
    let summary = pack_to(input, &mut buf, opts)?;
    out.write_all(buf.get_ref())
        .and_then(|_| out.flush())
        .map_err(Xp3Error::SourceWriteFailed)?;
    Ok(summary)
}

/// Read archive index entries (without extracting payloads).
pub fn entries(archive: &Path) -> Xp3Result<Vec<EntryInfo>> {
    let mut f = BufReader::new(File::open(archive)?);
    let entries = read_index(&mut f)?;
    Ok(entries.into_iter().map(EntryInfo::from).collect())
}

pub fn list(archive: &Path, verbose: bool) -> Xp3Result<()> {
    for e in entries(archive)? {
        if verbose {
            println!(
                "{}  off={} stored={} raw={} kind={} adler32={}",
                e.path, e.offset, e.stored_size, e.original_size, e.encoding, e.adler32_hex
            );
        } else {
            println!("{}", e.path);
        }
    }
    Ok(())
}

pub fn extract(archive: &Path, output: &Path, filter: &[String]) -> Xp3Result<()> {
    let mut f = BufReader::new(File::open(archive)?);
    let index_offset = read_header(&mut f)?;
    let entries = read_index(&mut f)?;
    std::fs::create_dir_all(output)?;

    let mut written = 0usize;
    for e in entries {
        if !filter.is_empty() && !filter.iter().any(|s| e.path.contains(s)) {
            continue;
        }

        let rel = Path::new(&e.path);
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(Xp3Error::Invalid(format!("unsafe entry path: {}", e.path)));
        }

        check_segment(&e, index_offset)?;
        let raw = load_entry(&mut f, &e)?;
        let out_path = output.join(rel);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out_path, &raw)?;
        log::debug!("extracted {}", e.path);
        written += 1;
    }

    log::info!("extracted {written} files into {}", output.display());
    Ok(())
}

pub fn verify(archive: &Path) -> Xp3Result<VerifyReport> {
    let mut f = BufReader::new(File::open(archive)?);
    let index_offset = read_header(&mut f)?;

    let mut decoy = vec![0u8; DECOY.len()];
    f.seek(SeekFrom::Start(HEADER_LEN))?;
    f.read_exact(&mut decoy)?;
    if decoy != DECOY {
        return Err(Xp3Error::Invalid("decoy payload was modified".into()));
    }

    let entries = read_index(&mut f)?;
    let mut report = VerifyReport::default();
    let mut data_end = DATA_START;

    for e in &entries {
        if e.offset < data_end {
            return Err(Xp3Error::Invalid(format!("payload overlaps previous: {}", e.path)));
        }
        data_end = check_segment(e, index_offset)?;

        let raw = load_entry(&mut f, e)?;
        report.entries += 1;
        report.original_bytes += raw.len() as u64;
    }

    Ok(report)
}

/// Checks that the stored bytes sit between the decoy and the index and
/// returns their end offset.
fn check_segment(e: &Entry, index_offset: u64) -> Xp3Result<u64> {
    if e.offset < DATA_START {
        return Err(Xp3Error::Invalid(format!("payload under header: {}", e.path)));
    }
    match e.offset.checked_add(e.stored_size) {
        Some(end) if end <= index_offset => Ok(end),
        _ => Err(Xp3Error::Invalid(format!("payload runs into index: {}", e.path))),
    }
}

/// Reads an entry's stored bytes, decodes them and checks size and Adler-32.
///
/// Callers bound the segment with `check_segment` first; the decoded size
/// is only trusted up to what actually inflates.
fn load_entry<R: Read + Seek>(f: &mut R, e: &Entry) -> Xp3Result<Vec<u8>> {
    if !e.compressed && e.stored_size != e.original_size {
        return Err(Xp3Error::Invalid(format!("raw size mismatch: {}", e.path)));
    }

    f.seek(SeekFrom::Start(e.offset))?;
    let mut payload = Vec::new();
    f.by_ref().take(e.stored_size).read_to_end(&mut payload)?;
    if payload.len() as u64 != e.stored_size {
        return Err(Xp3Error::Invalid(format!("payload truncated: {}", e.path)));
    }

    let raw = if e.compressed {
        let mut raw = Vec::new();
        ZlibDecoder::new(&payload[..])
            .take(e.original_size.saturating_add(1))
            .read_to_end(&mut raw)
            .map_err(|err| Xp3Error::Invalid(format!("{} does not inflate: {err}", e.path)))?;
        raw
    } else {
        payload
    };

    if raw.len() as u64 != e.original_size {
        return Err(Xp3Error::Invalid(format!("raw size mismatch: {}", e.path)));
    }
    if adler2::adler32_slice(&raw) != e.adler32 {
        return Err(Xp3Error::Invalid(format!("adler32 mismatch: {}", e.path)));
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xp3::format::{IndexEncoding, MAGIC};
    use crate::xp3::index::IndexBuilder;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::fs;
    use std::path::PathBuf;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn entry(original_size: u64, stored_size: u64) -> Entry {
        Entry {
            path: "a".into(),
            offset: DATA_START,
            original_size,
            stored_size,
            compressed: true,
            adler32: 0,
        }
    }

    /// Writes header, decoy, `data` and a raw index holding one entry named
    /// "a". `patch` may rewrite the serialized index before it lands.
    fn crafted_archive(
        dir: &Path,
        data: &[u8],
        e: Entry,
        patch: impl FnOnce(&mut Vec<u8>),
    ) -> PathBuf {
        let mut b = IndexBuilder::new(IndexEncoding::Raw, 9);
        b.add(e);
        let mut index = b.build().unwrap();
        patch(&mut index);

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&(DATA_START + data.len() as u64).to_le_bytes());
        out.extend_from_slice(DECOY);
        out.extend_from_slice(data);
        out.extend_from_slice(&index);

        let path = dir.join("crafted.xp3");
        fs::write(&path, out).unwrap();
        path
    }

    fn sample_tree() -> tempfile::TempDir {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("bgimage")).unwrap();
        fs::create_dir_all(src.path().join("video")).unwrap();
        fs::write(src.path().join("bgimage/school.png"), vec![0x42u8; 2048]).unwrap();
        fs::write(src.path().join("video/op.mpg"), b"\x00\x00\x01\xba mpeg").unwrap();
        fs::write(
            src.path().join("startup.tjs"),
            "Scripts.execStorage(\"system/Initialize.tjs\");",
        )
        .unwrap();
        fs::write(src.path().join("empty.txt"), b"").unwrap();
        src
    }

    #[test]
    fn extract_restores_every_file() {
        let src = sample_tree();
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("data.xp3");
        pack(src.path(), &archive, &PackOptions::default()).unwrap();

        let out = work.path().join("out");
        extract(&archive, &out, &[]).unwrap();

        for rel in ["bgimage/school.png", "video/op.mpg", "startup.tjs", "empty.txt"] {
            assert_eq!(
                fs::read(out.join(rel)).unwrap(),
                fs::read(src.path().join(rel)).unwrap(),
                "{rel}"
            );
        }
    }

    #[test]
    fn buffered_pack_matches_file_pack() {
        let src = sample_tree();
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("data.xp3");
        pack(src.path(), &archive, &PackOptions::default()).unwrap();

        let mut piped: Vec<u8> = Vec::new();
        let summary = pack_buffered(src.path(), &mut piped, &PackOptions::default()).unwrap();
        assert_eq!(summary.archive_len, piped.len() as u64);
        assert_eq!(piped, fs::read(&archive).unwrap());
    }

    #[test]
    fn extract_filter_limits_output() {
        let src = sample_tree();
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("data.xp3");
        pack(src.path(), &archive, &PackOptions::default()).unwrap();

        let out = work.path().join("out");
        extract(&archive, &out, &["video/".to_string()]).unwrap();
        assert!(out.join("video/op.mpg").exists());
        assert!(!out.join("startup.tjs").exists());
    }

    #[test]
    fn entries_report_encoding_per_extension() {
        let src = sample_tree();
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("data.xp3");
        pack(src.path(), &archive, &PackOptions::default()).unwrap();

        let list = entries(&archive).unwrap();
        assert_eq!(list.len(), 4);
        for e in &list {
            let expected = if e.path.ends_with(".mpg") { "raw" } else { "zlib" };
            assert_eq!(e.encoding, expected, "{}", e.path);
        }
        let png = list.iter().find(|e| e.path == "bgimage/school.png").unwrap();
        assert_eq!(png.original_size, 2048);
        assert!(png.stored_size < 2048);
    }

    #[test]
    fn verify_accepts_fresh_archive_and_catches_corruption() {
        let src = sample_tree();
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("data.xp3");
        pack(src.path(), &archive, &PackOptions::default()).unwrap();

        let report = verify(&archive).unwrap();
        assert_eq!(report.entries, 4);
        assert_eq!(report.original_bytes, 2048 + 9 + 45);

        let mpg = entries(&archive)
            .unwrap()
            .into_iter()
            .find(|e| e.path == "video/op.mpg")
            .unwrap();
        let mut bytes = fs::read(&archive).unwrap();
        bytes[mpg.offset as usize] ^= 0xFF;
        fs::write(&archive, &bytes).unwrap();

        assert!(matches!(verify(&archive), Err(Xp3Error::Invalid(_))));
    }

    #[test]
    fn verify_rejects_tampered_decoy() {
        let src = sample_tree();
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("data.xp3");
        pack(src.path(), &archive, &PackOptions::default()).unwrap();

        let mut bytes = fs::read(&archive).unwrap();
        bytes[HEADER_LEN as usize + 1] = b'X';
        fs::write(&archive, &bytes).unwrap();

        assert!(matches!(verify(&archive), Err(Xp3Error::Invalid(_))));
    }

    #[test]
    fn huge_declared_original_size_is_an_error() {
        let work = tempfile::tempdir().unwrap();
        let data = zlib(b"abcd");
        let e = Entry {
            adler32: adler2::adler32_slice(b"abcd"),
            ..entry(u64::MAX, data.len() as u64)
        };
        let archive = crafted_archive(work.path(), &data, e, |_| {});

        assert!(matches!(verify(&archive), Err(Xp3Error::Invalid(_))));
        let out = work.path().join("out");
        assert!(matches!(extract(&archive, &out, &[]), Err(Xp3Error::Invalid(_))));
    }

    #[test]
    fn stored_size_past_index_is_an_error() {
        let work = tempfile::tempdir().unwrap();
        let data = zlib(b"abcd");
        let e = entry(4, u64::MAX - DATA_START);
        let archive = crafted_archive(work.path(), &data, e, |_| {});

        assert!(matches!(verify(&archive), Err(Xp3Error::Invalid(_))));
        let out = work.path().join("out");
        assert!(matches!(extract(&archive, &out, &[]), Err(Xp3Error::Invalid(_))));
        assert!(!out.join("a").exists());
    }

    #[test]
    fn segment_offset_overflow_is_an_error() {
        let work = tempfile::tempdir().unwrap();
        let data = zlib(b"abcd");
        let e = entry(4, data.len() as u64);
        // Raw index: 9-byte block header, then File(12) info(12 + 24) segm(12),
        // so the segment offset starts 9 + 64 bytes in.
        let archive = crafted_archive(work.path(), &data, e, |index| {
            index[73..81].copy_from_slice(&(u64::MAX - 1).to_le_bytes());
        });

        assert!(matches!(verify(&archive), Err(Xp3Error::Invalid(_))));
        let out = work.path().join("out");
        assert!(matches!(extract(&archive, &out, &[]), Err(Xp3Error::Invalid(_))));
    }

    #[test]
    fn payload_inflating_past_declared_size_is_an_error() {
        let work = tempfile::tempdir().unwrap();
        let data = zlib(&vec![0u8; 1 << 20]);
        let e = entry(4, data.len() as u64);
        let archive = crafted_archive(work.path(), &data, e, |_| {});

        assert!(matches!(verify(&archive), Err(Xp3Error::Invalid(_))));
    }
}
