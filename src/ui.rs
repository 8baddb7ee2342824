#![forbid(unsafe_code)]

use crate::xp3;
use inquire::validator::Validation;
use inquire::{Confirm, CustomUserError, InquireError, Text};
use std::path::{Path, PathBuf};

fn validate_dir(p: &str) -> Result<Validation, CustomUserError> {
    let pb = PathBuf::from(p.trim());
    if !pb.exists() {
        return Ok(Validation::Invalid("Path does not exist".into()));
    }
    if !pb.is_dir() {
        return Ok(Validation::Invalid("Path is not a directory".into()));
    }
    Ok(Validation::Valid)
}

fn validate_output(p: &str) -> Result<Validation, CustomUserError> {
    if p.trim().is_empty() {
        return Ok(Validation::Invalid("Output path is empty".into()));
    }
    Ok(Validation::Valid)
}

fn ensure_xp3_ext(p: &Path) -> PathBuf {
    if p.extension().and_then(|e| e.to_str()).unwrap_or("") == "xp3" {
        return p.to_path_buf();
    }
    let mut s = p.to_string_lossy().to_string();
    if !s.ends_with('.') {
        s.push('.');
    }
    s.push_str("xp3");
    PathBuf::from(s)
}

fn prompt_err(e: InquireError) -> xp3::Xp3Error {
    xp3::Xp3Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

pub fn run() -> xp3::Xp3Result<()> {
    println!("XP3 Pack Wizard\n");

    let input = Text::new("Input directory")
        .with_default("./data")
        .with_validator(validate_dir)
        .prompt()
        .map(|s| PathBuf::from(s.trim()))
        .map_err(prompt_err)?;

    let output_raw = Text::new("Output .xp3 file")
        .with_default("./data.xp3")
        .with_validator(validate_output)
        .prompt()
        .map_err(prompt_err)?;

    let output = ensure_xp3_ext(Path::new(output_raw.trim()));

    let level = Text::new("zlib level (0..=9)")
        .with_default("9")
        .prompt()
        .map_err(prompt_err)?;
    let level = level
        .trim()
        .parse::<u32>()
        .unwrap_or(xp3::DEFAULT_LEVEL)
        .min(9);

    let atomic = Confirm::new("Write through a temp file (atomic replace)?")
        .with_default(true)
        .prompt()
        .map_err(prompt_err)?;

    println!("\nPack summary:");
    println!("  input  : {}", input.display());
    println!("  output : {}", output.display());
    println!("  zlib   : level {level} (.mpg stored raw)");
    println!("  atomic : {atomic}");

    let proceed = Confirm::new("Proceed?")
        .with_default(true)
        .prompt()
        .map_err(prompt_err)?;
    if !proceed {
        return Ok(());
    }

    let opts = xp3::PackOptions {
        level,
        atomic,
        ..xp3::PackOptions::default()
    };
    let summary = xp3::pack(&input, &output, &opts)?;
    println!("ok: {} entries, {} bytes", summary.entries, summary.archive_len);
    Ok(())
}
