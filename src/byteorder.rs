//! Big-endian primitives for the fixed-width integers used on disk.
//!
//! Thin wrappers around the `byteorder` crate's [`::byteorder::BigEndian`],
//! which panics on a buffer too short to hold the field rather than
//! silently truncating it — the same safety property the rest of this
//! crate's on-disk formats rely on.
//!
//! The 24-bit variants occupy exactly 3 bytes, MSB first, and are used by
//! [`crate::reference::Reference`] and [`crate::block::Block`] for fields
//! that never need the full 32 bits.

use ::byteorder::{BigEndian, ByteOrder};

#[inline]
pub fn read_u16(buf: &[u8]) -> u16 {
    BigEndian::read_u16(buf)
}

#[inline]
pub fn read_u24(buf: &[u8]) -> u32 {
    BigEndian::read_u24(buf)
}

#[inline]
pub fn read_u32(buf: &[u8]) -> u32 {
    BigEndian::read_u32(buf)
}

#[inline]
pub fn read_u64(buf: &[u8]) -> u64 {
    BigEndian::read_u64(buf)
}

#[inline]
pub fn write_u16(buf: &mut [u8], v: u16) {
    BigEndian::write_u16(buf, v)
}

#[inline]
pub fn write_u24(buf: &mut [u8], v: u32) {
    BigEndian::write_u24(buf, v)
}

#[inline]
pub fn write_u32(buf: &mut [u8], v: u32) {
    BigEndian::write_u32(buf, v)
}

#[inline]
pub fn write_u64(buf: &mut [u8], v: u64) {
    BigEndian::write_u64(buf, v)
}
