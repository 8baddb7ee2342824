#![forbid(unsafe_code)]

use std::path::Path;

use crate::xp3::error::{Xp3Error, Xp3Result};

/// Extension of media files that are stored without compression.
const RAW_EXTENSION: &str = "mpg";

pub fn normalize_rel_path(input_root: &Path, file_path: &Path) -> Xp3Result<String> {
    let rel = file_path
        .strip_prefix(input_root)
        .map_err(|_| Xp3Error::Outside(file_path.to_string_lossy().into_owned()))?;

    let mut out = String::new();
    for (i, comp) in rel.components().enumerate() {
        if i != 0 {
            out.push('/');
        }
        out.push_str(&comp.as_os_str().to_string_lossy());
    }

    out = out.replace('\\', "/");
    while out.starts_with('/') {
        out.remove(0);
    }

    if out.is_empty() {
        return Err(Xp3Error::Invalid("empty relative path".into()));
    }

    Ok(out)
}

/// `.mpg` payloads go in as-is; everything else is zlib compressed.
///
/// The suffix after the last `.` of the file name decides, so a bare
/// `.mpg` name counts too (`Path::extension` treats it as a stem).
pub fn is_stored_raw(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.rsplit_once('.'))
        .is_some_and(|(_, ext)| ext == RAW_EXTENSION)
}
