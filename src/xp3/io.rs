#![forbid(unsafe_code)]

use std::io::{self, Read, Write};

use adler2::Adler32;

use crate::xp3::error::Xp3Result;

pub fn write_u64(w: &mut dyn Write, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn read_exact<const N: usize>(r: &mut dyn Read) -> Xp3Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u8(r: &mut dyn Read) -> Xp3Result<u8> {
    Ok(read_exact::<1>(r)?[0])
}

pub fn read_u16(r: &mut dyn Read) -> Xp3Result<u16> {
    Ok(u16::from_le_bytes(read_exact::<2>(r)?))
}

pub fn read_u32(r: &mut dyn Read) -> Xp3Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4>(r)?))
}

pub fn read_u64(r: &mut dyn Read) -> Xp3Result<u64> {
    Ok(u64::from_le_bytes(read_exact::<8>(r)?))
}

/// Counts bytes and accumulates Adler-32 while they pass through.
pub struct Adler32Reader<R> {
    inner: R,
    adler: Adler32,
    count: u64,
}

impl<R: Read> Adler32Reader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            adler: Adler32::new(),
            count: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.count
    }

    pub fn checksum(&self) -> u32 {
        self.adler.checksum()
    }
}

impl<R: Read> Read for Adler32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.adler.write_slice(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adler_reader_matches_one_shot_checksum() {
        let data = b"hello xp3 world".repeat(1000);
        let mut r = Adler32Reader::new(&data[..]);
        let mut sink = Vec::new();
        std::io::copy(&mut r, &mut sink).unwrap();

        assert_eq!(sink, data);
        assert_eq!(r.bytes_read(), data.len() as u64);
        assert_eq!(r.checksum(), adler2::adler32_slice(&data));
    }

    #[test]
    fn empty_input_has_adler_one() {
        let mut r = Adler32Reader::new(&b""[..]);
        std::io::copy(&mut r, &mut std::io::sink()).unwrap();
        assert_eq!(r.bytes_read(), 0);
        assert_eq!(r.checksum(), 1);
    }

    #[test]
    fn le_helpers_read_little_endian() {
        let mut buf = vec![7u8, 0xEF, 0xBE, 0xEF, 0xBE, 0xAD, 0xDE];
        write_u64(&mut buf, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(&buf[7..], &[8, 7, 6, 5, 4, 3, 2, 1]);

        let mut cur = std::io::Cursor::new(buf);
        assert_eq!(read_u8(&mut cur).unwrap(), 7);
        assert_eq!(read_u16(&mut cur).unwrap(), 0xBEEF);
        assert_eq!(read_u32(&mut cur).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_u64(&mut cur).unwrap(), 0x0102_0304_0506_0708);
    }
}
