#![forbid(unsafe_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::xp3::error::{Xp3Error, Xp3Result};
use crate::xp3::format::{Entry, IndexEncoding, DECOY, DEFAULT_LEVEL, INDEX_OFFSET_POS, MAGIC};
use crate::xp3::index::IndexBuilder;
use crate::xp3::io::{write_u64, Adler32Reader};
use crate::xp3::path::{is_stored_raw, normalize_rel_path};

const COPY_BUF_LEN: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct PackOptions {
    /// zlib level (0..=9) for file payloads and the index.
    pub level: u32,
    pub index_encoding: IndexEncoding,
    /// Write into a temp file next to the output and rename it on success.
    pub atomic: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            index_encoding: IndexEncoding::Zlib,
            atomic: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub entries: usize,
    /// Stored bytes of all file payloads.
    pub data_bytes: u64,
    pub index_offset: u64,
    pub archive_len: u64,
}

struct Appended {
    original_size: u64,
    stored_size: u64,
    adler32: u32,
}

/// XP3 layout:
/// - [MAGIC 11]
/// - [u64 index_offset] (zero until the index is written, then patched)
/// - [DECOY]
/// - payload blobs (zlib, or raw for `.mpg`)
/// - index block (see `IndexBuilder`)
///
/// Determinism rules:
/// - paths are normalized to forward slashes
/// - entries are sorted lexicographically by path bytes
pub fn pack(input: &Path, output: &Path, opts: &PackOptions) -> Xp3Result<PackSummary> {
    let files = collect_files(input)?;

    if opts.atomic {
        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = atomic_temp(dir, output).map_err(|source| Xp3Error::OutputCreateFailed {
            path: output.to_path_buf(),
            source,
        })?;

        let mut out = BufWriter::new(tmp);
        let summary = write_archive(files, &mut out, opts)?;
        let tmp = out
            .into_inner()
            .map_err(|e| Xp3Error::SourceWriteFailed(e.into_error()))?;
        tmp.persist(output)
            .map_err(|e| Xp3Error::OutputCreateFailed {
                path: output.to_path_buf(),
                source: e.error,
            })?;
        return Ok(summary);
    }

    let file = File::create(output).map_err(|source| Xp3Error::OutputCreateFailed {
        path: output.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    let summary = write_archive(files, &mut out, opts)?;
    out.flush().map_err(Xp3Error::SourceWriteFailed)?;
    Ok(summary)
}

/// Temp file for an atomic pack. It is opened with the mode `File::create`
/// would use, or takes over the mode of an archive it will replace.
fn atomic_temp(dir: &Path, output: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".xp3pack-").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let tmp = builder.tempfile_in(dir)?;

    if let Ok(meta) = std::fs::metadata(output) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    Ok(tmp)
}

/// Packs `input` into any seekable sink. The sink is left positioned at the
/// end of the archive.
pub fn pack_to<W: Write + Seek>(
    input: &Path,
    out: &mut W,
    opts: &PackOptions,
) -> Xp3Result<PackSummary> {
    let files = collect_files(input)?;
    write_archive(files, out, opts)
}

fn collect_files(input: &Path) -> Xp3Result<Vec<(String, PathBuf)>> {
    if !input.is_dir() {
        return Err(Xp3Error::SourceReadFailed {
            path: input.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for ent in WalkDir::new(input).follow_links(false).into_iter() {
        let ent = ent.map_err(|e| {
            let path = e.path().unwrap_or(input).to_path_buf();
            let msg = e.to_string();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg));
            Xp3Error::SourceReadFailed { path, source }
        })?;

        if !ent.file_type().is_file() {
            continue;
        }

        let rel = normalize_rel_path(input, ent.path())?;
        files.push((rel, ent.path().to_path_buf()));
    }

    files.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    Ok(files)
}

fn write_archive<W: Write + Seek>(
    files: Vec<(String, PathBuf)>,
    out: &mut W,
    opts: &PackOptions,
) -> Xp3Result<PackSummary> {
    out.write_all(&MAGIC).map_err(Xp3Error::SourceWriteFailed)?;
    write_u64(out, 0).map_err(Xp3Error::SourceWriteFailed)?;
    out.write_all(DECOY).map_err(Xp3Error::SourceWriteFailed)?;

    let mut index = IndexBuilder::new(opts.index_encoding, opts.level);
    let mut data_bytes = 0u64;

    for (logical, physical) in files {
        let offset = out.stream_position().map_err(Xp3Error::SourceWriteFailed)?;
        let compressed = !is_stored_raw(&physical);

        let appended = append_file(out, &physical, compressed, opts.level)?;
        log::debug!(
            "{logical}: off={offset} raw={} stored={} zlib={compressed}",
            appended.original_size,
            appended.stored_size
        );

        data_bytes += appended.stored_size;
        index.add(Entry {
            path: logical,
            offset,
            original_size: appended.original_size,
            stored_size: appended.stored_size,
            compressed,
            adler32: appended.adler32,
        });
    }

    let entries = index.len();
    if index.is_empty() {
        log::warn!("no files found, writing an archive with an empty index");
    }
    let index_offset = out.seek(SeekFrom::End(0)).map_err(Xp3Error::SourceWriteFailed)?;
    let block = index.build()?;
    out.write_all(&block).map_err(Xp3Error::SourceWriteFailed)?;
    let archive_len = out.stream_position().map_err(Xp3Error::SourceWriteFailed)?;

    out.seek(SeekFrom::Start(INDEX_OFFSET_POS))
        .map_err(Xp3Error::SourceWriteFailed)?;
    write_u64(out, index_offset).map_err(Xp3Error::SourceWriteFailed)?;
    out.seek(SeekFrom::Start(archive_len))
        .map_err(Xp3Error::SourceWriteFailed)?;
    out.flush().map_err(Xp3Error::SourceWriteFailed)?;

    log::info!(
        "packed {entries} files ({data_bytes} bytes stored), index at {index_offset}, archive {archive_len} bytes"
    );

    Ok(PackSummary {
        entries,
        data_bytes,
        index_offset,
        archive_len,
    })
}

fn append_file<W: Write + Seek>(
    out: &mut W,
    physical: &Path,
    compressed: bool,
    level: u32,
) -> Xp3Result<Appended> {
    let file = File::open(physical).map_err(|source| Xp3Error::SourceReadFailed {
        path: physical.to_path_buf(),
        source,
    })?;
    let mut src = Adler32Reader::new(file);

    let start = out.stream_position().map_err(Xp3Error::SourceWriteFailed)?;
    if compressed {
        let mut encoder = ZlibEncoder::new(&mut *out, Compression::new(level));
        copy_into(&mut src, &mut encoder, physical)?;
        encoder.finish().map_err(Xp3Error::SourceWriteFailed)?;
    } else {
        copy_into(&mut src, out, physical)?;
    }
    let end = out.stream_position().map_err(Xp3Error::SourceWriteFailed)?;

    Ok(Appended {
        original_size: src.bytes_read(),
        stored_size: end - start,
        adler32: src.checksum(),
    })
}

// Keeps read and write failures apart, which io::copy does not.
fn copy_into(src: &mut dyn Read, dst: &mut dyn Write, path: &Path) -> Xp3Result<()> {
    let mut buf = vec![0u8; COPY_BUF_LEN];
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(Xp3Error::SourceReadFailed {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        dst.write_all(&buf[..n]).map_err(Xp3Error::SourceWriteFailed)?;
    }
}
