//! Compression container format wrapping entry payloads.
//!
//! ```text
//! offset  size  field
//! 0       1     compression tag (0=None, 1=Bzip2, 2=Gzip)
//! 1       4     payload length (u32, on-disk/compressed length)
//! 5       4     uncompressed length (u32, only present for Bzip2/Gzip)
//! -       n     body
//! ```
//!
//! `None` containers carry a 5-byte header; `Bzip2`/`Gzip` carry a 9-byte
//! header with the extra uncompressed-length field so the decompressor can
//! size its output buffer up front.
//!
//! Bzip2 bodies are stored without their 4-byte `"BZh9"` magic — it is
//! stripped on [`pack`] and re-prepended on [`unpack`], since every body in
//! this format always uses the same stream parameters.

use std::io::{Read, Write};

use bzip2::read::{BzDecoder, BzEncoder};
use bzip2::Compression as Bzip2Level;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression as GzipLevel;

use crate::byteorder::{read_u32, write_u32};
use crate::error::StoreError;

const SHORT_HEADER_LENGTH: usize = 5;
const LONG_HEADER_LENGTH: usize = 9;
const BZ2_HEADER: &[u8] = b"BZh9";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Bzip2 = 1,
    Gzip = 2,
}

impl Compression {
    fn from_tag(tag: u8) -> Result<Compression, StoreError> {
        match tag {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Bzip2),
            2 => Ok(Compression::Gzip),
            other => Err(StoreError::UnsupportedCompression(other)),
        }
    }

    fn header_length(self) -> usize {
        match self {
            Compression::None => SHORT_HEADER_LENGTH,
            Compression::Bzip2 | Compression::Gzip => LONG_HEADER_LENGTH,
        }
    }
}

/// Unpacks a container, decompressing its body if necessary.
///
/// The header's declared lengths are trusted to size the output buffer, but
/// the decompressed read is bounded to exactly that many bytes — a body
/// that produces fewer, more, or garbage bytes surfaces as a
/// [`StoreError`] rather than corrupting the caller's buffer.
pub fn unpack(buffer: &[u8]) -> Result<Vec<u8>, StoreError> {
    if buffer.is_empty() {
        return Err(StoreError::Decode("empty container".into()));
    }

    let compression = Compression::from_tag(buffer[0])?;
    let header_length = compression.header_length();
    if buffer.len() < header_length {
        return Err(StoreError::Decode("container shorter than its header".into()));
    }

    let payload_length = read_u32(&buffer[1..5]) as usize;
    let body = &buffer[header_length..];
    if body.len() < payload_length {
        return Err(StoreError::Decode("container body shorter than declared payload length".into()));
    }
    let body = &body[..payload_length];

    match compression {
        Compression::None => Ok(body.to_vec()),
        Compression::Bzip2 | Compression::Gzip => {
            let uncompressed_length = read_u32(&buffer[5..9]) as usize;
            let mut out = vec![0u8; uncompressed_length];
            let mut reader = decompress_reader(compression, body);
            reader
                .read_exact(&mut out)
                .map_err(|e| StoreError::Decode(format!("failed to decompress container body: {e}")))?;
            Ok(out)
        }
    }
}

fn decompress_reader<'a>(compression: Compression, body: &'a [u8]) -> Box<dyn Read + 'a> {
    match compression {
        Compression::Bzip2 => {
            let prefixed = PrependedRead::new(BZ2_HEADER, body);
            Box::new(BzDecoder::new(prefixed))
        }
        Compression::Gzip => Box::new(GzDecoder::new(body)),
        Compression::None => unreachable!(),
    }
}

/// Packs `contents` into a container using `compression`.
pub fn pack(contents: &[u8], compression: Compression) -> Result<Vec<u8>, StoreError> {
    let body = match compression {
        Compression::None => contents.to_vec(),
        Compression::Bzip2 => {
            let mut encoder = BzEncoder::new(contents, Bzip2Level::best());
            let mut compressed = Vec::new();
            encoder
                .read_to_end(&mut compressed)
                .map_err(|e| StoreError::Decode(format!("failed to bzip2-compress container body: {e}")))?;
            if compressed.len() >= BZ2_HEADER.len() && &compressed[..BZ2_HEADER.len()] == BZ2_HEADER {
                compressed.drain(..BZ2_HEADER.len());
            }
            compressed
        }
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(contents, GzipLevel::default());
            let mut compressed = Vec::new();
            encoder
                .read_to_end(&mut compressed)
                .map_err(|e| StoreError::Decode(format!("failed to gzip-compress container body: {e}")))?;
            compressed
        }
    };

    let header_length = compression.header_length();
    let mut buffer = vec![0u8; header_length + body.len()];
    buffer[0] = compression as u8;
    write_u32(&mut buffer[1..5], body.len() as u32);
    if header_length == LONG_HEADER_LENGTH {
        write_u32(&mut buffer[5..9], contents.len() as u32);
    }
    buffer[header_length..].copy_from_slice(&body);
    Ok(buffer)
}

/// A `Read` adapter that yields `prefix` followed by `rest`, used to splice
/// the elided bzip2 magic back onto a stored body before decoding.
struct PrependedRead<'a> {
    prefix: &'a [u8],
    prefix_pos: usize,
    rest: &'a [u8],
}

impl<'a> PrependedRead<'a> {
    fn new(prefix: &'a [u8], rest: &'a [u8]) -> Self {
        PrependedRead {
            prefix,
            prefix_pos: 0,
            rest,
        }
    }
}

impl<'a> Read for PrependedRead<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.prefix_pos < self.prefix.len() {
            let remaining = &self.prefix[self.prefix_pos..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.prefix_pos += n;
            Ok(n)
        } else {
            self.rest.read(buf)
        }
    }
}
