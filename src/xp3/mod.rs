#![forbid(unsafe_code)]

mod build;
mod error;
mod format;
mod index;
mod io;
mod ops;
mod path;
mod read;

pub use build::PackOptions;

pub use error::{Xp3Error, Xp3Result};
pub use format::{IndexEncoding, DEFAULT_LEVEL};

pub use ops::{extract, list, pack, pack_buffered, verify};
